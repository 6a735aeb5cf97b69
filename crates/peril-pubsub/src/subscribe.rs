//! The subscription engine.
//!
//! A subscription is one Tokio task owning one channel and one consumer.
//! For every delivery it decodes the payload, calls the handler, and
//! settles the delivery according to the handler's [`AckType`].
//!
//! ```text
//! Broker → Consumer → Codec::decode → Handler::handle → ack / nack
//! ```

use peril_broker::{Broker, BrokerChannel, Consumer, Delivery, Durability};
use peril_protocol::Codec;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;

use crate::{declare_and_bind, AckType, Handler, PubSubError};

/// Default bound on unacknowledged deliveries per subscription.
pub const DEFAULT_PREFETCH: u16 = 10;

/// What to do with a delivery whose payload fails to decode.
///
/// The handler is never called for such a delivery, and exactly one
/// warning is logged for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeFailurePolicy {
    /// Reject without requeue so it lands in the dead-letter queue.
    #[default]
    DeadLetter,
    /// Neither ack nor nack. The delivery stays unacknowledged (and counts
    /// against the prefetch limit) until the subscription ends, at which
    /// point the broker requeues it.
    LeavePending,
}

/// Tuning for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Maximum unacknowledged deliveries in flight. `0` = unlimited.
    pub prefetch: u16,
    pub decode_failure: DecodeFailurePolicy,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self {
            prefetch: DEFAULT_PREFETCH,
            decode_failure: DecodeFailurePolicy::default(),
        }
    }
}

impl SubscribeOptions {
    pub fn with_prefetch(mut self, prefetch: u16) -> Self {
        self.prefetch = prefetch;
        self
    }

    pub fn with_decode_failure(mut self, policy: DecodeFailurePolicy) -> Self {
        self.decode_failure = policy;
        self
    }
}

/// Subscribes `handler` to `queue` with [`SubscribeOptions::default`].
///
/// See [`subscribe_with`].
pub async fn subscribe<B, T, H, C>(
    broker: &B,
    exchange: &str,
    queue: &str,
    binding_key: &str,
    durability: Durability,
    handler: H,
    codec: C,
) -> Result<JoinHandle<()>, PubSubError>
where
    B: Broker,
    T: DeserializeOwned + Send + 'static,
    H: Handler<T>,
    C: Codec,
{
    subscribe_with(
        broker,
        exchange,
        queue,
        binding_key,
        durability,
        handler,
        codec,
        SubscribeOptions::default(),
    )
    .await
}

/// Binds `queue`, starts a manual-ack consumer on it, and spawns the task
/// that feeds decoded messages to `handler`.
///
/// Setup (bind, prefetch, consume) happens before this returns, so any
/// failure there comes back as `Err` and no task is spawned. The returned
/// handle completes when the consumer ends: its queue was deleted, the
/// connection closed, or the handler panicked.
///
/// Deliveries are handled one at a time, in the order the broker hands
/// them out. The content type on a delivery is informational: the payload
/// is always decoded with `codec`.
#[allow(clippy::too_many_arguments)]
pub async fn subscribe_with<B, T, H, C>(
    broker: &B,
    exchange: &str,
    queue: &str,
    binding_key: &str,
    durability: Durability,
    handler: H,
    codec: C,
    options: SubscribeOptions,
) -> Result<JoinHandle<()>, PubSubError>
where
    B: Broker,
    T: DeserializeOwned + Send + 'static,
    H: Handler<T>,
    C: Codec,
{
    let channel = declare_and_bind(broker, exchange, queue, binding_key, durability).await?;
    channel.set_prefetch(options.prefetch).await?;
    let mut consumer = channel.consume(queue).await?;

    tracing::info!(queue, binding_key, prefetch = options.prefetch, "subscribed");

    let queue = queue.to_string();
    Ok(tokio::spawn(async move {
        // The channel must outlive its consumer.
        let _channel = channel;
        consume::<T, _, _, _>(&queue, &mut consumer, &handler, &codec, options).await;
    }))
}

async fn consume<T, Co, H, C>(
    queue: &str,
    consumer: &mut Co,
    handler: &H,
    codec: &C,
    options: SubscribeOptions,
) where
    T: DeserializeOwned + Send + 'static,
    Co: Consumer,
    H: Handler<T>,
    C: Codec,
{
    loop {
        let delivery = match consumer.recv().await {
            Ok(Some(delivery)) => delivery,
            Ok(None) => {
                tracing::info!(queue, "consumer closed");
                return;
            }
            Err(e) => {
                tracing::error!(queue, error = %e, "consumer failed");
                return;
            }
        };

        if let Some(content_type) = delivery.content_type() {
            if content_type != codec.content_type() {
                tracing::debug!(
                    queue,
                    content_type,
                    expected = codec.content_type(),
                    "content type differs from subscription codec"
                );
            }
        }

        let value: T = match codec.decode(delivery.payload()) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(
                    queue,
                    routing_key = delivery.routing_key(),
                    redelivered = delivery.redelivered(),
                    policy = ?options.decode_failure,
                    error = %e,
                    "failed to decode delivery"
                );
                match options.decode_failure {
                    DecodeFailurePolicy::DeadLetter => {
                        settle(queue, delivery, AckType::NackDiscard).await;
                    }
                    DecodeFailurePolicy::LeavePending => drop(delivery),
                }
                continue;
            }
        };

        let ack = handler.handle(value).await;
        settle(queue, delivery, ack).await;
    }
}

async fn settle<D: Delivery>(queue: &str, delivery: D, ack: AckType) {
    let routing_key = delivery.routing_key().to_string();
    let result = match ack {
        AckType::Ack => delivery.ack().await,
        AckType::NackRequeue => delivery.nack(true).await,
        AckType::NackDiscard => delivery.nack(false).await,
    };
    match result {
        Ok(()) => tracing::trace!(queue, %routing_key, %ack, "delivery settled"),
        Err(e) => tracing::warn!(queue, %routing_key, %ack, error = %e, "failed to settle delivery"),
    }
}
