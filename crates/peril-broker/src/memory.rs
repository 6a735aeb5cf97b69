//! In-process broker with AMQP routing and acknowledgment semantics.
//!
//! `MemoryBroker` plays the role of the broker server; each
//! [`MemoryConnection`] is one client connection to it. Everything lives
//! behind a single mutex, and one [`Notify`] wakes waiting consumers
//! whenever a queue changes.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU16, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

use crate::{
    Broker, BrokerChannel, BrokerError, Consumer, Delivery, ExchangeKind, QueueSpec,
};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// An in-process broker. Clones share the same exchanges and queues.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    notify: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Default)]
struct State {
    exchanges: HashMap<String, ExchangeKind>,
    queues: HashMap<String, Queue>,
    bindings: Vec<Binding>,
    next_queue_id: u64,
    next_consumer_id: u64,
    next_delivery_tag: u64,
}

#[derive(Debug, PartialEq, Eq)]
struct Binding {
    queue: String,
    exchange: String,
    key: String,
}

struct Queue {
    /// Distinguishes a queue from a later one declared under the same name.
    id: u64,
    spec: QueueSpec,
    /// Connection owning an exclusive queue.
    owner: Option<u64>,
    ready: VecDeque<Message>,
    /// Delivered but unsettled, keyed by delivery tag.
    unacked: BTreeMap<u64, Unsettled>,
    consumers: usize,
}

struct Unsettled {
    consumer: u64,
    message: Message,
}

#[derive(Debug, Clone)]
struct Message {
    routing_key: String,
    content_type: String,
    payload: Vec<u8>,
    redelivered: bool,
}

impl State {
    /// Copies `message` into every queue bound to `exchange` with a
    /// matching key. Returns the number of queues reached.
    fn route(
        &mut self,
        exchange: &str,
        routing_key: &str,
        message: Message,
    ) -> Result<usize, BrokerError> {
        let kind = *self.exchanges.get(exchange).ok_or_else(|| BrokerError::NotFound {
            kind: "exchange",
            name: exchange.to_string(),
        })?;

        let targets: BTreeSet<String> = self
            .bindings
            .iter()
            .filter(|b| b.exchange == exchange && kind.matches(&b.key, routing_key))
            .map(|b| b.queue.clone())
            .collect();

        for name in &targets {
            if let Some(queue) = self.queues.get_mut(name) {
                queue.ready.push_back(message.clone());
            }
        }
        Ok(targets.len())
    }

    /// The queue called `name`, if it is still the one with `id`.
    fn queue_mut(&mut self, name: &str, id: u64) -> Option<&mut Queue> {
        self.queues.get_mut(name).filter(|q| q.id == id)
    }

    fn delete_queue(&mut self, name: &str) {
        self.queues.remove(name);
        self.bindings.retain(|b| b.queue != name);
        tracing::debug!(queue = name, "queue deleted");
    }
}

impl MemoryBroker {
    /// Creates an empty broker with no exchanges or queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new connection to this broker.
    pub fn connect(&self) -> MemoryConnection {
        MemoryConnection {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            shared: Arc::clone(&self.shared),
        }
    }

    /// Returns `true` if a queue with this name exists.
    pub fn has_queue(&self, queue: &str) -> bool {
        self.shared.lock().queues.contains_key(queue)
    }

    /// Number of messages waiting to be delivered, or `None` if the queue
    /// doesn't exist.
    pub fn ready_count(&self, queue: &str) -> Option<usize> {
        self.shared.lock().queues.get(queue).map(|q| q.ready.len())
    }

    /// Number of delivered-but-unsettled messages, or `None` if the queue
    /// doesn't exist.
    pub fn unacked_count(&self, queue: &str) -> Option<usize> {
        self.shared.lock().queues.get(queue).map(|q| q.unacked.len())
    }

    /// Number of bindings targeting `queue`.
    pub fn binding_count(&self, queue: &str) -> usize {
        self.shared
            .lock()
            .bindings
            .iter()
            .filter(|b| b.queue == queue)
            .count()
    }

    /// Routing keys and payloads of the messages waiting in `queue`, in
    /// delivery order.
    pub fn ready_messages(&self, queue: &str) -> Vec<(String, Vec<u8>)> {
        self.shared
            .lock()
            .queues
            .get(queue)
            .map(|q| {
                q.ready
                    .iter()
                    .map(|m| (m.routing_key.clone(), m.payload.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// A connection to a [`MemoryBroker`].
///
/// Dropping the connection deletes the exclusive queues it declared.
pub struct MemoryConnection {
    id: u64,
    shared: Arc<Shared>,
}

impl fmt::Debug for MemoryConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryConnection").field("id", &self.id).finish()
    }
}

impl Broker for MemoryConnection {
    type Channel = MemoryChannel;

    async fn open_channel(&self) -> Result<MemoryChannel, BrokerError> {
        Ok(MemoryChannel {
            connection_id: self.id,
            shared: Arc::clone(&self.shared),
            prefetch: AtomicU16::new(0),
        })
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        {
            let mut state = self.shared.lock();
            let owned: Vec<String> = state
                .queues
                .iter()
                .filter(|(_, q)| q.owner == Some(self.id))
                .map(|(name, _)| name.clone())
                .collect();
            for name in owned {
                state.delete_queue(&name);
            }
        }
        self.shared.notify.notify_waiters();
    }
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// A channel on a [`MemoryConnection`].
pub struct MemoryChannel {
    connection_id: u64,
    shared: Arc<Shared>,
    prefetch: AtomicU16,
}

impl fmt::Debug for MemoryChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryChannel")
            .field("connection_id", &self.connection_id)
            .field("prefetch", &self.prefetch.load(Ordering::Relaxed))
            .finish()
    }
}

impl BrokerChannel for MemoryChannel {
    type Consumer = MemoryConsumer;

    async fn declare_exchange(&self, name: &str, kind: ExchangeKind) -> Result<(), BrokerError> {
        let mut state = self.shared.lock();
        match state.exchanges.get(name) {
            Some(existing) if *existing != kind => Err(BrokerError::PreconditionFailed(format!(
                "exchange '{name}' already declared as {existing}"
            ))),
            Some(_) => Ok(()),
            None => {
                state.exchanges.insert(name.to_string(), kind);
                tracing::debug!(exchange = name, %kind, "exchange declared");
                Ok(())
            }
        }
    }

    async fn declare_queue(&self, spec: &QueueSpec) -> Result<(), BrokerError> {
        let mut state = self.shared.lock();
        if let Some(existing) = state.queues.get(&spec.name) {
            if existing.owner.is_some_and(|owner| owner != self.connection_id) {
                return Err(BrokerError::ResourceLocked(format!(
                    "queue '{}' is exclusive to another connection",
                    spec.name
                )));
            }
            if existing.spec != *spec {
                return Err(BrokerError::PreconditionFailed(format!(
                    "queue '{}' redeclared with different properties",
                    spec.name
                )));
            }
            return Ok(());
        }

        state.next_queue_id += 1;
        let id = state.next_queue_id;
        state.queues.insert(
            spec.name.clone(),
            Queue {
                id,
                spec: spec.clone(),
                owner: spec.exclusive().then_some(self.connection_id),
                ready: VecDeque::new(),
                unacked: BTreeMap::new(),
                consumers: 0,
            },
        );
        tracing::debug!(queue = %spec.name, durable = spec.durable(), "queue declared");
        Ok(())
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        binding_key: &str,
    ) -> Result<(), BrokerError> {
        let mut state = self.shared.lock();
        if !state.exchanges.contains_key(exchange) {
            return Err(BrokerError::NotFound {
                kind: "exchange",
                name: exchange.to_string(),
            });
        }
        if !state.queues.contains_key(queue) {
            return Err(BrokerError::NotFound {
                kind: "queue",
                name: queue.to_string(),
            });
        }

        let binding = Binding {
            queue: queue.to_string(),
            exchange: exchange.to_string(),
            key: binding_key.to_string(),
        };
        if !state.bindings.contains(&binding) {
            state.bindings.push(binding);
        }
        Ok(())
    }

    async fn set_prefetch(&self, count: u16) -> Result<(), BrokerError> {
        self.prefetch.store(count, Ordering::Relaxed);
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<MemoryConsumer, BrokerError> {
        let mut state = self.shared.lock();
        let target = state.queues.get_mut(queue).ok_or_else(|| BrokerError::NotFound {
            kind: "queue",
            name: queue.to_string(),
        })?;
        if target.owner.is_some_and(|owner| owner != self.connection_id) {
            return Err(BrokerError::ResourceLocked(format!(
                "queue '{queue}' is exclusive to another connection"
            )));
        }
        target.consumers += 1;
        let queue_id = target.id;
        state.next_consumer_id += 1;

        Ok(MemoryConsumer {
            id: state.next_consumer_id,
            queue: queue.to_string(),
            queue_id,
            prefetch: usize::from(self.prefetch.load(Ordering::Relaxed)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            shared: Arc::clone(&self.shared),
        })
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        content_type: &str,
        payload: &[u8],
    ) -> Result<(), BrokerError> {
        let routed = self.shared.lock().route(
            exchange,
            routing_key,
            Message {
                routing_key: routing_key.to_string(),
                content_type: content_type.to_string(),
                payload: payload.to_vec(),
                redelivered: false,
            },
        )?;
        tracing::trace!(exchange, routing_key, routed, "message published");
        self.shared.notify.notify_waiters();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Consumer
// ---------------------------------------------------------------------------

/// A manual-ack consumer on one queue of a [`MemoryBroker`].
///
/// Dropping the consumer stands in for closing its channel: every
/// delivery it handed out and nobody settled goes back to the front of
/// the queue, flagged as redelivered.
pub struct MemoryConsumer {
    id: u64,
    queue: String,
    queue_id: u64,
    /// 0 = unlimited.
    prefetch: usize,
    in_flight: Arc<AtomicUsize>,
    shared: Arc<Shared>,
}

/// Result of one attempt to take a message.
enum Take {
    Delivered(MemoryDelivery),
    QueueGone,
    Wait,
}

impl MemoryConsumer {
    fn try_take(&self) -> Take {
        let mut state = self.shared.lock();
        let tag = state.next_delivery_tag + 1;
        let Some(queue) = state.queue_mut(&self.queue, self.queue_id) else {
            return Take::QueueGone;
        };
        if self.prefetch != 0 && self.in_flight.load(Ordering::Acquire) >= self.prefetch {
            return Take::Wait;
        }
        let Some(message) = queue.ready.pop_front() else {
            return Take::Wait;
        };
        queue.unacked.insert(
            tag,
            Unsettled {
                consumer: self.id,
                message: message.clone(),
            },
        );
        state.next_delivery_tag = tag;
        self.in_flight.fetch_add(1, Ordering::AcqRel);

        Take::Delivered(MemoryDelivery {
            tag,
            queue: self.queue.clone(),
            queue_id: self.queue_id,
            message,
            in_flight: Arc::clone(&self.in_flight),
            shared: Arc::clone(&self.shared),
        })
    }
}

impl Consumer for MemoryConsumer {
    type Delivery = MemoryDelivery;

    async fn recv(&mut self) -> Result<Option<MemoryDelivery>, BrokerError> {
        // Competing consumers on a shared queue would otherwise let a task
        // that just requeued a message take it straight back.
        tokio::task::yield_now().await;
        loop {
            // Created before checking so a notify between the check and the
            // await isn't lost.
            let notified = self.shared.notify.notified();
            match self.try_take() {
                Take::Delivered(delivery) => return Ok(Some(delivery)),
                Take::QueueGone => return Ok(None),
                Take::Wait => notified.await,
            }
        }
    }
}

impl Drop for MemoryConsumer {
    fn drop(&mut self) {
        {
            let mut state = self.shared.lock();
            let delete = match state.queue_mut(&self.queue, self.queue_id) {
                Some(queue) => {
                    let abandoned: Vec<u64> = queue
                        .unacked
                        .iter()
                        .filter(|(_, u)| u.consumer == self.id)
                        .map(|(tag, _)| *tag)
                        .collect();
                    // Newest first so the oldest ends up at the head.
                    for tag in abandoned.iter().rev() {
                        if let Some(Unsettled { mut message, .. }) = queue.unacked.remove(tag) {
                            message.redelivered = true;
                            queue.ready.push_front(message);
                        }
                    }
                    if !abandoned.is_empty() {
                        tracing::debug!(
                            queue = %self.queue,
                            requeued = abandoned.len(),
                            "unsettled deliveries requeued"
                        );
                    }
                    queue.consumers = queue.consumers.saturating_sub(1);
                    queue.consumers == 0 && queue.spec.auto_delete()
                }
                None => false,
            };
            if delete {
                state.delete_queue(&self.queue);
            }
        }
        self.shared.notify.notify_waiters();
    }
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

/// A message delivered by a [`MemoryConsumer`].
pub struct MemoryDelivery {
    tag: u64,
    queue: String,
    queue_id: u64,
    message: Message,
    in_flight: Arc<AtomicUsize>,
    shared: Arc<Shared>,
}

impl MemoryDelivery {
    fn release(&self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        self.shared.notify.notify_waiters();
    }
}

impl Delivery for MemoryDelivery {
    fn payload(&self) -> &[u8] {
        &self.message.payload
    }

    fn content_type(&self) -> Option<&str> {
        Some(self.message.content_type.as_str()).filter(|ct| !ct.is_empty())
    }

    fn routing_key(&self) -> &str {
        &self.message.routing_key
    }

    fn redelivered(&self) -> bool {
        self.message.redelivered
    }

    async fn ack(self) -> Result<(), BrokerError> {
        if let Some(queue) = self.shared.lock().queue_mut(&self.queue, self.queue_id) {
            queue.unacked.remove(&self.tag);
        }
        self.release();
        Ok(())
    }

    async fn nack(self, requeue: bool) -> Result<(), BrokerError> {
        {
            let mut state = self.shared.lock();
            let dead_letter_exchange = match state.queue_mut(&self.queue, self.queue_id) {
                // Already requeued if the consumer went away first.
                Some(queue) => match queue.unacked.remove(&self.tag) {
                    Some(_) if requeue => {
                        let mut message = self.message.clone();
                        message.redelivered = true;
                        queue.ready.push_front(message);
                        None
                    }
                    Some(_) => queue.spec.dead_letter_exchange.clone(),
                    None => None,
                },
                None => None,
            };

            if let Some(exchange) = dead_letter_exchange {
                let routing_key = self.message.routing_key.clone();
                if let Err(e) = state.route(&exchange, &routing_key, self.message.clone()) {
                    tracing::warn!(queue = %self.queue, error = %e, "dead-lettering failed, message dropped");
                }
            }
        }
        self.release();
        Ok(())
    }
}
