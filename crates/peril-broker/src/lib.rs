//! Broker abstraction layer for Peril.
//!
//! Provides the [`Broker`], [`BrokerChannel`], [`Consumer`] and
//! [`Delivery`] traits that abstract over an AMQP-style message broker:
//! exchanges, queues, routing-key bindings, manual acknowledgment and
//! dead-lettering.
//!
//! Two implementations:
//!
//! - [`AmqpBroker`]: RabbitMQ (or any AMQP 0-9-1 broker) via `lapin`.
//! - [`MemoryBroker`]: an in-process broker with the same routing and
//!   acknowledgment semantics, used by the test suites.
//!
//! # Feature Flags
//!
//! - `amqp` (default): AMQP implementation via `lapin`

#[cfg(feature = "amqp")]
mod amqp;
mod error;
mod memory;
mod topology;

#[cfg(feature = "amqp")]
pub use amqp::{AmqpBroker, AmqpChannel, AmqpConsumer, AmqpDelivery};
pub use error::BrokerError;
pub use memory::{MemoryBroker, MemoryChannel, MemoryConnection, MemoryConsumer, MemoryDelivery};
pub use topology::{topic_matches, Durability, ExchangeKind, QueueSpec};

use std::future::Future;

/// One logical connection to a broker.
///
/// Channels are cheap and independent: each subscription and each
/// publisher gets its own.
pub trait Broker: Send + Sync + 'static {
    /// The channel type produced by this broker.
    type Channel: BrokerChannel;

    /// Opens a new channel on this connection.
    fn open_channel(&self) -> impl Future<Output = Result<Self::Channel, BrokerError>> + Send;
}

/// A channel: the unit on which topology is declared, messages are
/// published, and consumers are started.
pub trait BrokerChannel: Send + Sync + 'static {
    /// The consumer type produced by [`consume`](Self::consume).
    type Consumer: Consumer;

    /// Declares an exchange. Redeclaring with the same kind is a no-op.
    fn declare_exchange(
        &self,
        name: &str,
        kind: ExchangeKind,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Declares a queue. Redeclaring with identical properties is a no-op;
    /// different properties fail with [`BrokerError::PreconditionFailed`].
    fn declare_queue(&self, spec: &QueueSpec) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Binds `queue` to `exchange` under `binding_key`. Binding twice with
    /// the same arguments leaves a single binding.
    fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        binding_key: &str,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Limits the number of unacknowledged deliveries per consumer started
    /// on this channel afterwards. `0` means unlimited.
    fn set_prefetch(&self, count: u16) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Starts a manual-acknowledgment consumer on `queue`.
    fn consume(&self, queue: &str) -> impl Future<Output = Result<Self::Consumer, BrokerError>> + Send;

    /// Publishes `payload` and waits until the broker has taken
    /// responsibility for it. Says nothing about consumers.
    fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        content_type: &str,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), BrokerError>> + Send;
}

/// A stream of deliveries from one queue.
pub trait Consumer: Send + 'static {
    /// The delivery type yielded by this consumer.
    type Delivery: Delivery;

    /// Waits for the next delivery. There is no timeout.
    ///
    /// Returns `Ok(None)` when the consumer is cancelled or its queue is
    /// deleted.
    fn recv(&mut self) -> impl Future<Output = Result<Option<Self::Delivery>, BrokerError>> + Send;
}

/// A single message handed to a consumer, awaiting acknowledgment.
///
/// `ack` and `nack` consume the delivery: a message is settled at most
/// once. Dropping a delivery without settling it leaves the message
/// unacknowledged until its channel closes (for [`MemoryBroker`], until its
/// consumer is dropped); the broker then requeues it as redelivered.
pub trait Delivery: Send + 'static {
    fn payload(&self) -> &[u8];

    /// The content type set by the publisher, if any.
    fn content_type(&self) -> Option<&str>;

    fn routing_key(&self) -> &str;

    /// `true` if this message was delivered before and requeued.
    fn redelivered(&self) -> bool;

    /// Acknowledges the message, removing it from the queue.
    fn ack(self) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Rejects the message. With `requeue` it goes back to the queue;
    /// without, it is dead-lettered (or dropped if the queue has no
    /// dead-letter exchange).
    fn nack(self, requeue: bool) -> impl Future<Output = Result<(), BrokerError>> + Send;
}
