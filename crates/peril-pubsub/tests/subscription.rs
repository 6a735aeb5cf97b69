//! Integration tests for binding, subscribing and publishing, run against
//! the in-process broker.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use peril_broker::{
    Broker, BrokerChannel, BrokerError, Durability, ExchangeKind, MemoryBroker, MemoryConnection,
    QueueSpec,
};
use peril_protocol::routing::{DEAD_LETTER_QUEUE, EXCHANGE_PERIL_DLX};
use peril_protocol::{BincodeCodec, GameLog, JsonCodec, PlayingState};
use peril_pubsub::{
    declare_and_bind, subscribe, subscribe_with, AckType, DecodeFailurePolicy, PubSubError,
    Publisher, SubscribeOptions,
};
use tokio::sync::mpsc;

const DIRECT: &str = "peril_direct";
const TOPIC: &str = "peril_topic";

/// A broker with the exchanges and the dead-letter queue in place.
async fn setup() -> (MemoryBroker, MemoryConnection) {
    let broker = MemoryBroker::new();
    let conn = broker.connect();
    let ch = conn.open_channel().await.unwrap();
    ch.declare_exchange(DIRECT, ExchangeKind::Direct).await.unwrap();
    ch.declare_exchange(TOPIC, ExchangeKind::Topic).await.unwrap();
    ch.declare_exchange(EXCHANGE_PERIL_DLX, ExchangeKind::Fanout)
        .await
        .unwrap();
    ch.declare_queue(&QueueSpec::new(DEAD_LETTER_QUEUE, Durability::Durable))
        .await
        .unwrap();
    ch.bind_queue(DEAD_LETTER_QUEUE, EXCHANGE_PERIL_DLX, "")
        .await
        .unwrap();
    (broker, conn)
}

/// Formatted log output, shared between a test and its subscriber.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn count(&self, needle: &str) -> usize {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .matches(needle)
            .count()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Polls `check` until it holds or a second has passed.
async fn eventually(check: impl Fn() -> bool) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_declare_and_bind_twice_is_idempotent() {
    let (broker, conn) = setup().await;
    declare_and_bind(&conn, TOPIC, "war", "war.*", Durability::Durable)
        .await
        .unwrap();
    declare_and_bind(&conn, TOPIC, "war", "war.*", Durability::Durable)
        .await
        .unwrap();
    assert!(broker.has_queue("war"));
    assert_eq!(broker.binding_count("war"), 1);
}

#[tokio::test]
async fn test_declare_and_bind_rejects_changed_durability() {
    let (_broker, conn) = setup().await;
    declare_and_bind(&conn, TOPIC, "war", "war.*", Durability::Durable)
        .await
        .unwrap();
    let err = declare_and_bind(&conn, TOPIC, "war", "war.*", Durability::Transient)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PubSubError::Broker(BrokerError::PreconditionFailed(_))
    ));
}

#[tokio::test]
async fn test_subscribe_setup_failure_is_returned() {
    let broker = MemoryBroker::new();
    let conn = broker.connect();
    let result = subscribe(
        &conn,
        "missing_exchange",
        "q",
        "k",
        Durability::Durable,
        |_: PlayingState| async { AckType::Ack },
        JsonCodec,
    )
    .await;
    assert!(matches!(
        result,
        Err(PubSubError::Broker(BrokerError::NotFound { .. }))
    ));
}

#[tokio::test]
async fn test_handler_receives_decoded_value_and_message_is_acked() {
    let (broker, conn) = setup().await;
    let (tx, mut rx) = mpsc::channel(8);

    subscribe(
        &conn,
        DIRECT,
        "pause.alice",
        "pause",
        Durability::Transient,
        move |state: PlayingState| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(state).await;
                AckType::Ack
            }
        },
        JsonCodec,
    )
    .await
    .unwrap();

    let publisher = Publisher::open(&conn).await.unwrap();
    publisher
        .publish_json(DIRECT, "pause", &PlayingState { is_paused: true })
        .await
        .unwrap();

    let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(received.is_paused);
    eventually(|| broker.unacked_count("pause.alice") == Some(0)).await;
    assert_eq!(broker.ready_count("pause.alice"), Some(0));
}

#[tokio::test]
async fn test_nack_requeue_redelivers_until_accepted() {
    let (broker, conn) = setup().await;
    let calls = Arc::new(AtomicUsize::new(0));

    let seen = Arc::clone(&calls);
    subscribe(
        &conn,
        TOPIC,
        "war",
        "war.*",
        Durability::Durable,
        move |_: PlayingState| {
            let seen = Arc::clone(&seen);
            async move {
                if seen.fetch_add(1, Ordering::SeqCst) < 2 {
                    AckType::NackRequeue
                } else {
                    AckType::Ack
                }
            }
        },
        JsonCodec,
    )
    .await
    .unwrap();

    let publisher = Publisher::open(&conn).await.unwrap();
    publisher
        .publish_json(TOPIC, "war.bob", &PlayingState { is_paused: false })
        .await
        .unwrap();

    eventually(|| calls.load(Ordering::SeqCst) == 3).await;
    eventually(|| broker.unacked_count("war") == Some(0)).await;
    assert_eq!(broker.ready_count("war"), Some(0));
    assert!(broker.ready_messages(DEAD_LETTER_QUEUE).is_empty());
}

#[tokio::test]
async fn test_nack_discard_dead_letters() {
    let (broker, conn) = setup().await;
    subscribe(
        &conn,
        TOPIC,
        "war",
        "war.*",
        Durability::Durable,
        |_: PlayingState| async { AckType::NackDiscard },
        JsonCodec,
    )
    .await
    .unwrap();

    let publisher = Publisher::open(&conn).await.unwrap();
    publisher
        .publish_json(TOPIC, "war.carol", &PlayingState { is_paused: false })
        .await
        .unwrap();

    eventually(|| broker.ready_count(DEAD_LETTER_QUEUE) == Some(1)).await;
    assert_eq!(broker.ready_messages(DEAD_LETTER_QUEUE)[0].0, "war.carol");
    assert_eq!(broker.unacked_count("war"), Some(0));
}

#[tokio::test]
async fn test_decode_failure_dead_letters_without_calling_handler() {
    let (broker, conn) = setup().await;
    let calls = Arc::new(AtomicUsize::new(0));

    let seen = Arc::clone(&calls);
    subscribe(
        &conn,
        TOPIC,
        "game_logs",
        "game_logs.*",
        Durability::Durable,
        move |_: GameLog| {
            seen.fetch_add(1, Ordering::SeqCst);
            async { AckType::Ack }
        },
        BincodeCodec,
    )
    .await
    .unwrap();

    let ch = conn.open_channel().await.unwrap();
    ch.publish(TOPIC, "game_logs.mallory", "application/bincode", &[0xff, 0x01])
        .await
        .unwrap();

    eventually(|| broker.ready_count(DEAD_LETTER_QUEUE) == Some(1)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(broker.unacked_count("game_logs"), Some(0));
}

#[tokio::test]
async fn test_decode_failure_left_pending_is_never_settled() {
    let (broker, conn) = setup().await;
    let (tx, mut rx) = mpsc::channel(8);

    subscribe_with(
        &conn,
        TOPIC,
        "game_logs",
        "game_logs.*",
        Durability::Durable,
        move |log: GameLog| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(log).await;
                AckType::Ack
            }
        },
        BincodeCodec,
        SubscribeOptions::default().with_decode_failure(DecodeFailurePolicy::LeavePending),
    )
    .await
    .unwrap();

    let ch = conn.open_channel().await.unwrap();
    ch.publish(TOPIC, "game_logs.mallory", "application/bincode", b"garbage")
        .await
        .unwrap();
    let publisher = Publisher::new(ch);
    let good = GameLog::now("alice", "hello");
    publisher
        .publish_binary(TOPIC, "game_logs.alice", &good)
        .await
        .unwrap();

    // The next message still flows; the bad one stays unacknowledged.
    let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received, good);
    eventually(|| broker.ready_count("game_logs") == Some(0)).await;
    eventually(|| broker.unacked_count("game_logs") == Some(1)).await;
    assert!(broker.ready_messages(DEAD_LETTER_QUEUE).is_empty());
}

#[tokio::test]
async fn test_content_type_does_not_select_codec() {
    let (_broker, conn) = setup().await;
    let (tx, mut rx) = mpsc::channel(8);

    subscribe(
        &conn,
        DIRECT,
        "pause.bob",
        "pause",
        Durability::Transient,
        move |state: PlayingState| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(state).await;
                AckType::Ack
            }
        },
        JsonCodec,
    )
    .await
    .unwrap();

    let ch = conn.open_channel().await.unwrap();
    ch.publish(DIRECT, "pause", "text/plain", br#"{"is_paused":false}"#)
        .await
        .unwrap();

    let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(!received.is_paused);
}

#[tokio::test]
async fn test_publisher_clones_share_one_channel() {
    let (broker, conn) = setup().await;
    declare_and_bind(&conn, TOPIC, "game_logs", "game_logs.*", Durability::Durable)
        .await
        .unwrap();

    let publisher = Publisher::open(&conn).await.unwrap();
    let tasks: Vec<_> = (0..4)
        .map(|i| {
            let publisher = publisher.clone();
            tokio::spawn(async move {
                let log = GameLog::now(format!("user{i}"), "spam");
                publisher
                    .publish_binary(TOPIC, &format!("game_logs.user{i}"), &log)
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(broker.ready_count("game_logs"), Some(4));
}

#[tokio::test]
async fn test_decode_failure_logged_once_per_delivery() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    // Current-thread runtime: the subscription task runs on this thread.
    let _guard = tracing::subscriber::set_default(subscriber);

    let (broker, conn) = setup().await;
    let (tx, mut rx) = mpsc::channel(8);
    subscribe(
        &conn,
        TOPIC,
        "game_logs",
        "game_logs.*",
        Durability::Durable,
        move |log: GameLog| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(log).await;
                AckType::Ack
            }
        },
        BincodeCodec,
    )
    .await
    .unwrap();

    let ch = conn.open_channel().await.unwrap();
    for key in ["game_logs.mallory", "game_logs.eve"] {
        ch.publish(TOPIC, key, "application/bincode", b"garbage")
            .await
            .unwrap();
    }
    let good = GameLog::now("alice", "hello");
    Publisher::new(ch)
        .publish_binary(TOPIC, "game_logs.alice", &good)
        .await
        .unwrap();

    let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received, good);
    eventually(|| broker.ready_count(DEAD_LETTER_QUEUE) == Some(2)).await;
    assert_eq!(logs.count("failed to decode delivery"), 2);
    assert_eq!(logs.count("game_logs.mallory"), 1);
    assert_eq!(logs.count("game_logs.eve"), 1);
}

#[tokio::test]
async fn test_panicking_handler_ends_only_its_own_subscription() {
    let (broker, conn) = setup().await;

    let doomed = subscribe(
        &conn,
        TOPIC,
        "war",
        "war.*",
        Durability::Durable,
        |state: PlayingState| async move {
            assert!(!state.is_paused, "handler gave up");
            AckType::Ack
        },
        JsonCodec,
    )
    .await
    .unwrap();

    let (tx, mut rx) = mpsc::channel(8);
    subscribe(
        &conn,
        DIRECT,
        "pause.bob",
        "pause",
        Durability::Transient,
        move |state: PlayingState| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(state).await;
                AckType::Ack
            }
        },
        JsonCodec,
    )
    .await
    .unwrap();

    let publisher = Publisher::open(&conn).await.unwrap();
    publisher
        .publish_json(TOPIC, "war.bob", &PlayingState { is_paused: true })
        .await
        .unwrap();

    let joined = tokio::time::timeout(Duration::from_secs(1), doomed)
        .await
        .unwrap();
    assert!(joined.unwrap_err().is_panic());

    // The message the handler never settled is back in the queue.
    eventually(|| broker.ready_count("war") == Some(1)).await;
    assert_eq!(broker.unacked_count("war"), Some(0));

    // The other subscription on the same connection keeps delivering.
    publisher
        .publish_json(DIRECT, "pause", &PlayingState { is_paused: false })
        .await
        .unwrap();
    let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(!received.is_paused);

    // A healthy subscriber picks up the requeued message.
    let (tx, mut rx) = mpsc::channel(8);
    subscribe(
        &conn,
        TOPIC,
        "war",
        "war.*",
        Durability::Durable,
        move |state: PlayingState| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(state).await;
                AckType::Ack
            }
        },
        JsonCodec,
    )
    .await
    .unwrap();
    let redelivered = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(redelivered.is_paused);
    eventually(|| broker.unacked_count("war") == Some(0)).await;
    assert_eq!(broker.ready_count("war"), Some(0));
}
