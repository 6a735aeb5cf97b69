use peril_broker::BrokerError;
use peril_protocol::ProtocolError;

/// Errors returned by binding, subscribing and publishing.
#[derive(Debug, thiserror::Error)]
pub enum PubSubError {
    /// The broker refused an operation or the connection failed.
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// A value could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
