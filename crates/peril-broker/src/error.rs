/// Errors that can occur in the broker layer.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// The broker could not be reached or refused the connection.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// An exchange or queue referenced by an operation does not exist.
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    /// A redeclaration disagreed with the existing entity's properties.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// An exclusive queue is owned by another connection.
    #[error("resource locked: {0}")]
    ResourceLocked(String),

    /// The broker negatively confirmed a publish.
    #[error("publish to '{exchange}' with key '{routing_key}' was not confirmed")]
    PublishNacked {
        exchange: String,
        routing_key: String,
    },

    /// The channel or connection was closed.
    #[error("channel closed")]
    Closed,

    /// An error reported by the AMQP client.
    #[cfg(feature = "amqp")]
    #[error("amqp error: {0}")]
    Amqp(#[from] lapin::Error),
}
