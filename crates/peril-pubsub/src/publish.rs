//! Typed publishing.

use std::sync::Arc;

use peril_broker::{Broker, BrokerChannel};
use peril_protocol::{BincodeCodec, Codec, JsonCodec};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::PubSubError;

/// Encodes `value` with `codec` and publishes it on `channel`.
///
/// Returns once the broker has confirmed the message. There is no retry:
/// the caller decides what a failure means.
pub async fn publish<Ch, T, C>(
    channel: &Ch,
    exchange: &str,
    routing_key: &str,
    value: &T,
    codec: &C,
) -> Result<(), PubSubError>
where
    Ch: BrokerChannel,
    T: Serialize + Sync,
    C: Codec,
{
    let payload = codec.encode(value)?;
    channel
        .publish(exchange, routing_key, codec.content_type(), &payload)
        .await?;
    tracing::debug!(exchange, routing_key, bytes = payload.len(), "published");
    Ok(())
}

/// A publishing channel shared between tasks.
///
/// Cloning is cheap: every clone publishes through the same channel, one
/// message at a time. The lock is held only for the publish itself;
/// encoding happens before it is taken.
pub struct Publisher<Ch> {
    channel: Arc<Mutex<Ch>>,
}

impl<Ch> Clone for Publisher<Ch> {
    fn clone(&self) -> Self {
        Self {
            channel: Arc::clone(&self.channel),
        }
    }
}

impl<Ch: BrokerChannel> Publisher<Ch> {
    /// Wraps an already opened channel.
    pub fn new(channel: Ch) -> Self {
        Self {
            channel: Arc::new(Mutex::new(channel)),
        }
    }

    /// Opens a dedicated channel on `broker`.
    pub async fn open<B>(broker: &B) -> Result<Self, PubSubError>
    where
        B: Broker<Channel = Ch>,
    {
        Ok(Self::new(broker.open_channel().await?))
    }

    /// Encodes `value` with `codec` and publishes it.
    pub async fn publish<T, C>(
        &self,
        exchange: &str,
        routing_key: &str,
        value: &T,
        codec: &C,
    ) -> Result<(), PubSubError>
    where
        T: Serialize + Sync,
        C: Codec,
    {
        let payload = codec.encode(value)?;
        let channel = self.channel.lock().await;
        channel
            .publish(exchange, routing_key, codec.content_type(), &payload)
            .await?;
        tracing::debug!(exchange, routing_key, bytes = payload.len(), "published");
        Ok(())
    }

    /// Publishes `value` as JSON.
    pub async fn publish_json<T>(
        &self,
        exchange: &str,
        routing_key: &str,
        value: &T,
    ) -> Result<(), PubSubError>
    where
        T: Serialize + Sync,
    {
        self.publish(exchange, routing_key, value, &JsonCodec).await
    }

    /// Publishes `value` with the compact binary codec.
    pub async fn publish_binary<T>(
        &self,
        exchange: &str,
        routing_key: &str,
        value: &T,
    ) -> Result<(), PubSubError>
    where
        T: Serialize + Sync,
    {
        self.publish(exchange, routing_key, value, &BincodeCodec).await
    }
}
