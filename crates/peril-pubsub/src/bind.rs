use peril_broker::{Broker, BrokerChannel, Durability, QueueSpec};
use peril_protocol::routing::EXCHANGE_PERIL_DLX;

use crate::PubSubError;

/// Opens a channel, declares `queue` and binds it to `exchange` under
/// `binding_key`.
///
/// Every queue dead-letters to [`EXCHANGE_PERIL_DLX`]. Calling this again
/// with the same arguments is a no-op; redeclaring the queue with another
/// durability fails with a precondition error.
///
/// Returns the channel the queue was declared on, ready to consume from.
pub async fn declare_and_bind<B: Broker>(
    broker: &B,
    exchange: &str,
    queue: &str,
    binding_key: &str,
    durability: Durability,
) -> Result<B::Channel, PubSubError> {
    let channel = broker.open_channel().await?;
    let spec = QueueSpec::new(queue, durability).with_dead_letter_exchange(EXCHANGE_PERIL_DLX);
    channel.declare_queue(&spec).await?;
    channel.bind_queue(queue, exchange, binding_key).await?;

    tracing::debug!(exchange, queue, binding_key, ?durability, "queue bound");
    Ok(channel)
}
