//! The handler contract: what a subscription calls for every decoded
//! message, and what it expects back.

use std::fmt;
use std::future::Future;

/// A handler's verdict on one message.
///
/// The subscription engine turns it into a broker action after the
/// handler returns:
///
/// | `AckType` | Broker action |
/// |---|---|
/// | `Ack` | acknowledge, message removed |
/// | `NackRequeue` | reject with requeue, delivered again (maybe elsewhere) |
/// | `NackDiscard` | reject without requeue, routed to the dead-letter exchange |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AckType {
    Ack,
    NackRequeue,
    NackDiscard,
}

impl fmt::Display for AckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ack => write!(f, "ack"),
            Self::NackRequeue => write!(f, "nack-requeue"),
            Self::NackDiscard => write!(f, "nack-discard"),
        }
    }
}

/// Handles decoded messages of type `T`.
///
/// Implement it on a struct holding the handler's dependencies (a session
/// handle, a publisher), or pass an async closure: any
/// `Fn(T) -> impl Future<Output = AckType>` is a handler.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static` → the handler is moved into the subscription's
///   consumer task and lives as long as it does.
///
/// # Example
///
/// ```rust
/// use peril_protocol::PlayingState;
/// use peril_pubsub::{AckType, Handler};
///
/// struct LogPauses;
///
/// impl Handler<PlayingState> for LogPauses {
///     async fn handle(&self, state: PlayingState) -> AckType {
///         println!("paused: {}", state.is_paused);
///         AckType::Ack
///     }
/// }
/// ```
pub trait Handler<T>: Send + Sync + 'static {
    /// Processes one message. Runs inside the consumer task: the next
    /// message of this subscription waits until it returns.
    fn handle(&self, value: T) -> impl Future<Output = AckType> + Send;
}

impl<T, F, Fut> Handler<T> for F
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AckType> + Send,
{
    fn handle(&self, value: T) -> impl Future<Output = AckType> + Send {
        self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run<H: Handler<u32>>(handler: &H, value: u32) -> AckType {
        handler.handle(value).await
    }

    #[tokio::test]
    async fn test_closure_is_a_handler() {
        let handler = |n: u32| async move {
            if n % 2 == 0 {
                AckType::Ack
            } else {
                AckType::NackDiscard
            }
        };
        assert_eq!(run(&handler, 2).await, AckType::Ack);
        assert_eq!(run(&handler, 3).await, AckType::NackDiscard);
    }

    #[test]
    fn test_ack_type_display() {
        assert_eq!(AckType::NackRequeue.to_string(), "nack-requeue");
    }
}
