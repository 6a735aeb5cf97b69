//! # Peril
//!
//! A multiplayer strategy game played entirely over an AMQP broker. Every
//! player runs a [`Client`]; one process runs the [`Server`]. They never
//! talk directly: pause control, army moves, war recognitions and game
//! logs all travel through the `peril_direct` and `peril_topic` exchanges.
//!
//! ```text
//!             pause ──────────────► pause.<user>       ─► PauseHandler
//! Server ◄── game_logs.* ◄────┐
//!                             │    army_moves.<user>  ─► MoveHandler ──► war.<user>
//! Client ── army_moves.<user> ┘    war (shared)       ─► WarHandler  ──► game_logs.<user>
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use peril::prelude::*;
//!
//! # async fn run() -> Result<(), PerilError> {
//! let config = PerilConfig::default();
//! let broker = AmqpBroker::connect(&config.amqp_url).await?;
//! let (client, mut notices) = Client::start(&broker, "alice", &config).await?;
//! client.spawn("europe", UnitRank::Infantry).await?;
//! while let Some(notice) = notices.recv().await {
//!     println!("{notice}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
mod error;
pub mod gamelog;
pub mod handlers;
pub mod server;
pub mod telemetry;
pub mod topology;

pub use client::Client;
pub use config::PerilConfig;
pub use error::PerilError;
pub use server::Server;

/// Convenience re-exports for the binaries and for embedding.
pub mod prelude {
    pub use crate::client::Client;
    pub use crate::config::{BrokerArgs, GameLogArgs, PerilConfig};
    pub use crate::error::PerilError;
    pub use crate::handlers::Notice;
    pub use crate::server::Server;
    pub use crate::telemetry::init_tracing;

    pub use peril_broker::{AmqpBroker, Broker, MemoryBroker};
    pub use peril_game::{
        ClientCommand, GameError, ServerCommand, StatusReport, CLIENT_HELP, SERVER_HELP,
    };
    pub use peril_protocol::{ArmyMove, GameLog, PlayingState, RecognitionOfWar, Unit, UnitRank};
}
