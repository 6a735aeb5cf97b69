//! Typed publish/subscribe for Peril.
//!
//! Builds on the raw [`peril_broker`] traits and the [`peril_protocol`]
//! codecs:
//!
//! - [`declare_and_bind`]: idempotent queue declaration and binding.
//! - [`subscribe`] / [`subscribe_with`]: the subscription engine: one
//!   consumer task per subscription, calling a [`Handler`] and settling
//!   each delivery by its [`AckType`].
//! - [`publish`] and [`Publisher`]: encode and publish with broker
//!   confirmation.
//!
//! # Example
//!
//! ```rust,no_run
//! use peril_broker::{Durability, MemoryBroker};
//! use peril_protocol::{JsonCodec, PlayingState};
//! use peril_pubsub::{subscribe, AckType};
//!
//! # async fn run() -> Result<(), peril_pubsub::PubSubError> {
//! let broker = MemoryBroker::new();
//! let connection = broker.connect();
//! let task = subscribe(
//!     &connection,
//!     "peril_direct",
//!     "pause.alice",
//!     "pause",
//!     Durability::Transient,
//!     |state: PlayingState| async move {
//!         println!("paused: {}", state.is_paused);
//!         AckType::Ack
//!     },
//!     JsonCodec,
//! )
//! .await?;
//! # drop(task);
//! # Ok(())
//! # }
//! ```

mod bind;
mod error;
mod handler;
mod publish;
mod subscribe;

pub use bind::declare_and_bind;
pub use error::PubSubError;
pub use handler::{AckType, Handler};
pub use publish::{publish, Publisher};
pub use subscribe::{
    subscribe, subscribe_with, DecodeFailurePolicy, SubscribeOptions, DEFAULT_PREFETCH,
};
