//! Error types for the protocol layer.
//!
//! Each crate in Peril defines its own error enum. When you see a
//! `ProtocolError`, you know the problem is in serialization or in a
//! malformed value, not in the broker or the game rules.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// JSON serialization failed.
    #[cfg(feature = "json")]
    #[error("json encode failed: {0}")]
    JsonEncode(serde_json::Error),

    /// JSON deserialization failed: malformed text, missing fields, or
    /// wrong data types.
    #[cfg(feature = "json")]
    #[error("json decode failed: {0}")]
    JsonDecode(serde_json::Error),

    /// Binary serialization failed.
    #[cfg(feature = "bincode")]
    #[error("bincode encode failed: {0}")]
    BincodeEncode(bincode::Error),

    /// Binary deserialization failed. Usually truncated bytes or a shape
    /// mismatch between encoder and decoder.
    #[cfg(feature = "bincode")]
    #[error("bincode decode failed: {0}")]
    BincodeDecode(bincode::Error),

    /// A value that parsed fine but isn't meaningful, such as an unknown
    /// unit rank typed at the prompt.
    #[error("invalid value: {0}")]
    InvalidValue(String),
}
