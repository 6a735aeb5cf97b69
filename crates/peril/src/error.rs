//! Unified error type for Peril.

use peril_broker::BrokerError;
use peril_game::GameError;
use peril_protocol::ProtocolError;
use peril_pubsub::PubSubError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum PerilError {
    /// A broker-level error (connection, declare, publish).
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// A protocol-level error (encode, decode, invalid value).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A binding, subscription or publish failed.
    #[error(transparent)]
    PubSub(#[from] PubSubError),

    /// A player command was rejected.
    #[error(transparent)]
    Game(#[from] GameError),

    /// Reading the prompt or writing the game-log file failed.
    #[error("i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// Settings that can't be used, such as an unparseable log filter.
    #[error("invalid configuration: {0}")]
    Config(String),
}
