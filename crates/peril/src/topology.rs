use peril_broker::{Broker, BrokerChannel, Durability, ExchangeKind, QueueSpec};
use peril_protocol::routing::{
    DEAD_LETTER_QUEUE, EXCHANGE_PERIL_DIRECT, EXCHANGE_PERIL_DLX, EXCHANGE_PERIL_TOPIC,
};

use crate::PerilError;

/// Declares the Peril exchanges and the dead-letter queue.
///
/// Idempotent: the server and every client call it at start-up.
pub async fn declare_exchanges<B: Broker>(broker: &B) -> Result<(), PerilError> {
    let channel = broker.open_channel().await?;
    channel
        .declare_exchange(EXCHANGE_PERIL_DIRECT, ExchangeKind::Direct)
        .await?;
    channel
        .declare_exchange(EXCHANGE_PERIL_TOPIC, ExchangeKind::Topic)
        .await?;
    channel
        .declare_exchange(EXCHANGE_PERIL_DLX, ExchangeKind::Fanout)
        .await?;
    channel
        .declare_queue(&QueueSpec::new(DEAD_LETTER_QUEUE, Durability::Durable))
        .await?;
    channel
        .bind_queue(DEAD_LETTER_QUEUE, EXCHANGE_PERIL_DLX, "")
        .await?;

    tracing::debug!("exchanges declared");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use peril_broker::MemoryBroker;

    #[tokio::test]
    async fn test_declare_exchanges_is_idempotent() {
        let broker = MemoryBroker::new();
        let conn = broker.connect();
        declare_exchanges(&conn).await.unwrap();
        declare_exchanges(&conn).await.unwrap();
        assert!(broker.has_queue(DEAD_LETTER_QUEUE));
        assert_eq!(broker.binding_count(DEAD_LETTER_QUEUE), 1);
    }

    #[tokio::test]
    async fn test_dead_letter_exchange_feeds_queue() {
        let broker = MemoryBroker::new();
        let conn = broker.connect();
        declare_exchanges(&conn).await.unwrap();

        let channel = conn.open_channel().await.unwrap();
        channel
            .publish(EXCHANGE_PERIL_DLX, "war.alice", "application/json", b"{}")
            .await
            .unwrap();
        assert_eq!(broker.ready_count(DEAD_LETTER_QUEUE), Some(1));
    }
}
