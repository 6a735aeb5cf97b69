//! The server runtime: pause/resume control and the game-log writer.

use std::sync::Arc;

use peril_broker::{Broker, Durability};
use peril_protocol::routing::{family_wildcard, EXCHANGE_PERIL_DIRECT, EXCHANGE_PERIL_TOPIC, GAME_LOG_SLUG, PAUSE_KEY};
use peril_protocol::{BincodeCodec, PlayingState};
use peril_pubsub::{subscribe_with, Publisher};
use tokio::task::JoinHandle;

use crate::gamelog::GameLogWriter;
use crate::handlers::LogHandler;
use crate::{PerilConfig, PerilError};

/// A running Peril server.
///
/// Consumes the shared `game_logs` queue into the game-log file and
/// broadcasts pause/resume to every client.
pub struct Server<B: Broker> {
    publisher: Publisher<B::Channel>,
    logs: JoinHandle<()>,
}

impl<B: Broker> Server<B> {
    pub async fn start(broker: &B, config: &PerilConfig) -> Result<Self, PerilError> {
        crate::topology::declare_exchanges(broker).await?;
        let publisher = Publisher::open(broker).await?;

        let writer = Arc::new(GameLogWriter::new(
            config.game_log_path.clone(),
            config.log_write_delay,
        ));
        let logs = subscribe_with(
            broker,
            EXCHANGE_PERIL_TOPIC,
            GAME_LOG_SLUG,
            &family_wildcard(GAME_LOG_SLUG),
            Durability::Durable,
            LogHandler { writer },
            BincodeCodec,
            config.subscribe_options(),
        )
        .await?;

        tracing::info!(path = %config.game_log_path.display(), "server started");
        Ok(Self { publisher, logs })
    }

    /// Broadcasts the playing state to every connected client.
    pub async fn set_paused(&self, paused: bool) -> Result<(), PerilError> {
        self.publisher
            .publish_json(
                EXCHANGE_PERIL_DIRECT,
                PAUSE_KEY,
                &PlayingState { is_paused: paused },
            )
            .await?;
        tracing::info!(paused, "playing state published");
        Ok(())
    }

    pub fn shutdown(self) {
        self.logs.abort();
        tracing::info!("server stopped");
    }
}
