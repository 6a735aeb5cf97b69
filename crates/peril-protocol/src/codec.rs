//! Codec trait and implementations for serializing/deserializing payloads.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The pub/sub layer doesn't care HOW a payload is serialized. It just
//! needs something that implements the [`Codec`] trait, and every
//! subscription is parameterized over one.
//!
//! Two codecs are used side by side:
//!
//! - [`JsonCodec`]: self-describing text. Field order doesn't matter and
//!   you can read the messages in the broker's management UI.
//! - [`BincodeCodec`]: compact positional binary. The decoder must know
//!   the exact shape of the value: same fields, same order, same types.
//!   There is no forward or backward compatibility across type changes.
//!
//! Publisher and consumer of a routing-key family agree on the codec out
//! of band. The content type written on each message documents the choice
//! but the receiver never uses it to pick a decoder.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// ## Trait bounds
///
/// - `Send + Sync` → a codec is moved into a long-lived consumer task and
///   may be used from any worker thread of the Tokio runtime.
/// - `'static` → the codec owns everything it needs.
///
/// `decode` requires `DeserializeOwned` (vs plain `Deserialize`): the
/// result must not borrow from the delivery buffer, because the buffer is
/// dropped as soon as the message is acknowledged.
pub trait Codec: Send + Sync + 'static {
    /// The MIME-style tag written on every message this codec encodes.
    fn content_type(&self) -> &'static str;

    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns a `ProtocolError` encode variant if the value can't be
    /// represented in this format.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns a `ProtocolError` decode variant if the bytes are malformed,
    /// truncated, or don't match the shape of `T`.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// Content type written by [`JsonCodec`].
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Content type written by [`BincodeCodec`].
pub const BINCODE_CONTENT_TYPE: &str = "application/bincode";

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Used for pause, move, and war traffic.
///
/// ## Example
///
/// ```rust
/// use peril_protocol::{Codec, JsonCodec, PlayingState};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&PlayingState { is_paused: true }).unwrap();
/// let decoded: PlayingState = codec.decode(&bytes).unwrap();
/// assert!(decoded.is_paused);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn content_type(&self) -> &'static str {
        JSON_CONTENT_TYPE
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::JsonEncode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::JsonDecode)
    }
}

// ---------------------------------------------------------------------------
// BincodeCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses bincode's positional binary format.
///
/// Used for the game-log stream, where volume matters more than
/// readability. Decoding into a type whose shape differs from the encoded
/// one either fails or, worse, silently produces garbage. Keep both ends
/// on the same version of the type.
#[cfg(feature = "bincode")]
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

#[cfg(feature = "bincode")]
impl Codec for BincodeCodec {
    fn content_type(&self) -> &'static str {
        BINCODE_CONTENT_TYPE
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        bincode::serialize(value).map_err(ProtocolError::BincodeEncode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        bincode::deserialize(data).map_err(ProtocolError::BincodeDecode)
    }
}
