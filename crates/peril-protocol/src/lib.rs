//! Wire protocol for Peril.
//!
//! This crate defines what clients and the server say to each other
//! through the broker:
//!
//! - **Types** ([`PlayingState`], [`ArmyMove`], [`RecognitionOfWar`],
//!   [`GameLog`], ...): the payloads that travel on the wire.
//! - **Codecs** ([`Codec`] trait, [`JsonCodec`], [`BincodeCodec`]): how
//!   those payloads are converted to/from bytes.
//! - **Routing** ([`routing`]): exchange names and routing-key layout.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! The protocol layer sits between the broker (raw bytes) and the game
//! (typed events). It knows nothing about queues or acknowledgments.
//!
//! ```text
//! Broker (bytes) → Protocol (typed payload) → Game (session state)
//! ```

mod codec;
mod error;
pub mod routing;
mod types;

pub use codec::{Codec, BINCODE_CONTENT_TYPE, JSON_CONTENT_TYPE};
#[cfg(feature = "bincode")]
pub use codec::BincodeCodec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ArmyMove, GameLog, PlayerSnapshot, PlayingState, RecognitionOfWar, Unit, UnitRank,
};
