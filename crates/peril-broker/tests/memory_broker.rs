//! Integration tests for the in-process broker.
//!
//! These exercise the broker the way the game uses it: several
//! connections, per-user transient queues next to shared durable ones,
//! and rejected messages flowing to the dead-letter queue.

use std::time::Duration;

use peril_broker::{
    Broker, BrokerChannel, Consumer, Delivery, Durability, ExchangeKind, MemoryBroker, QueueSpec,
};

const DIRECT: &str = "peril_direct";
const TOPIC: &str = "peril_topic";
const DLX: &str = "peril_dlx";
const DLQ: &str = "peril_dlq";

/// Declares the exchanges and the dead-letter queue on a fresh broker.
async fn bootstrap(broker: &MemoryBroker) {
    let conn = broker.connect();
    let ch = conn.open_channel().await.expect("channel");
    ch.declare_exchange(DIRECT, ExchangeKind::Direct).await.unwrap();
    ch.declare_exchange(TOPIC, ExchangeKind::Topic).await.unwrap();
    ch.declare_exchange(DLX, ExchangeKind::Fanout).await.unwrap();
    ch.declare_queue(&QueueSpec::new(DLQ, Durability::Durable))
        .await
        .unwrap();
    ch.bind_queue(DLQ, DLX, "").await.unwrap();
}

fn queue(name: &str, durability: Durability) -> QueueSpec {
    QueueSpec::new(name, durability).with_dead_letter_exchange(DLX)
}

#[tokio::test]
async fn test_pause_broadcast_reaches_every_player_queue() {
    let broker = MemoryBroker::new();
    bootstrap(&broker).await;

    let alice = broker.connect();
    let bob = broker.connect();
    for (conn, name) in [(&alice, "pause.alice"), (&bob, "pause.bob")] {
        let ch = conn.open_channel().await.unwrap();
        ch.declare_queue(&queue(name, Durability::Transient))
            .await
            .unwrap();
        ch.bind_queue(name, DIRECT, "pause").await.unwrap();
    }

    let server = broker.connect();
    let ch = server.open_channel().await.unwrap();
    ch.publish(DIRECT, "pause", "application/json", br#"{"is_paused":true}"#)
        .await
        .unwrap();

    assert_eq!(broker.ready_count("pause.alice"), Some(1));
    assert_eq!(broker.ready_count("pause.bob"), Some(1));
}

#[tokio::test]
async fn test_moves_fan_out_to_all_move_queues_including_sender() {
    let broker = MemoryBroker::new();
    bootstrap(&broker).await;

    let conns: Vec<_> = (0..2).map(|_| broker.connect()).collect();
    for (conn, user) in conns.iter().zip(["alice", "bob"]) {
        let ch = conn.open_channel().await.unwrap();
        let name = format!("army_moves.{user}");
        ch.declare_queue(&queue(&name, Durability::Transient))
            .await
            .unwrap();
        ch.bind_queue(&name, TOPIC, "army_moves.*").await.unwrap();
    }

    let ch = conns[0].open_channel().await.unwrap();
    ch.publish(TOPIC, "army_moves.alice", "application/json", b"{}")
        .await
        .unwrap();
    // Wrong family: must not be routed to move queues.
    ch.publish(TOPIC, "war.alice", "application/json", b"{}")
        .await
        .unwrap();

    assert_eq!(broker.ready_count("army_moves.alice"), Some(1));
    assert_eq!(broker.ready_count("army_moves.bob"), Some(1));
}

#[tokio::test]
async fn test_shared_durable_queue_delivers_each_message_once() {
    let broker = MemoryBroker::new();
    bootstrap(&broker).await;

    let first = broker.connect();
    let second = broker.connect();
    let ch1 = first.open_channel().await.unwrap();
    let ch2 = second.open_channel().await.unwrap();
    for ch in [&ch1, &ch2] {
        ch.declare_queue(&queue("war", Durability::Durable))
            .await
            .unwrap();
        ch.bind_queue("war", TOPIC, "war.*").await.unwrap();
    }
    assert_eq!(broker.binding_count("war"), 1);

    ch1.publish(TOPIC, "war.bob", "application/json", b"1")
        .await
        .unwrap();

    let mut c1 = ch1.consume("war").await.unwrap();
    let mut c2 = ch2.consume("war").await.unwrap();

    let got = c1.recv().await.unwrap().expect("delivery");
    assert_eq!(got.payload(), b"1");
    let nothing = tokio::time::timeout(Duration::from_millis(50), c2.recv()).await;
    assert!(nothing.is_err(), "second consumer must not see the same message");

    // A requeue hands the message to whichever consumer is waiting.
    got.nack(true).await.unwrap();
    let again = c2.recv().await.unwrap().expect("redelivery");
    assert!(again.redelivered());
    again.ack().await.unwrap();
    assert_eq!(broker.ready_count("war"), Some(0));
}

#[tokio::test]
async fn test_durable_queue_outlives_its_consumers() {
    let broker = MemoryBroker::new();
    bootstrap(&broker).await;

    let conn = broker.connect();
    let ch = conn.open_channel().await.unwrap();
    ch.declare_queue(&queue("game_logs", Durability::Durable))
        .await
        .unwrap();
    ch.bind_queue("game_logs", TOPIC, "game_logs.*").await.unwrap();
    drop(ch.consume("game_logs").await.unwrap());
    drop(ch);
    drop(conn);

    assert!(broker.has_queue("game_logs"));
    let other = broker.connect();
    let ch = other.open_channel().await.unwrap();
    ch.publish(TOPIC, "game_logs.alice", "application/bincode", b"log")
        .await
        .unwrap();
    assert_eq!(broker.ready_count("game_logs"), Some(1));
}

#[tokio::test]
async fn test_discarded_message_lands_in_dead_letter_queue() {
    let broker = MemoryBroker::new();
    bootstrap(&broker).await;

    let conn = broker.connect();
    let ch = conn.open_channel().await.unwrap();
    ch.declare_queue(&queue("war", Durability::Durable))
        .await
        .unwrap();
    ch.bind_queue("war", TOPIC, "war.*").await.unwrap();
    ch.publish(TOPIC, "war.alice", "application/json", b"no units")
        .await
        .unwrap();

    let mut consumer = ch.consume("war").await.unwrap();
    consumer
        .recv()
        .await
        .unwrap()
        .expect("delivery")
        .nack(false)
        .await
        .unwrap();

    assert_eq!(broker.ready_count("war"), Some(0));
    assert_eq!(broker.unacked_count("war"), Some(0));
    assert_eq!(
        broker.ready_messages(DLQ),
        vec![("war.alice".to_string(), b"no units".to_vec())]
    );
}

#[tokio::test]
async fn test_consumer_wakes_on_publish() {
    let broker = MemoryBroker::new();
    bootstrap(&broker).await;

    let conn = broker.connect();
    let ch = conn.open_channel().await.unwrap();
    ch.declare_queue(&queue("pause.alice", Durability::Transient))
        .await
        .unwrap();
    ch.bind_queue("pause.alice", DIRECT, "pause").await.unwrap();
    let mut consumer = ch.consume("pause.alice").await.unwrap();

    let waiter = tokio::spawn(async move {
        let delivery = consumer.recv().await.unwrap().expect("delivery");
        let payload = delivery.payload().to_vec();
        delivery.ack().await.unwrap();
        payload
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    ch.publish(DIRECT, "pause", "application/json", b"wake")
        .await
        .unwrap();

    let payload = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("consumer should wake")
        .unwrap();
    assert_eq!(payload, b"wake");
}
