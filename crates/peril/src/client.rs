//! The player runtime.
//!
//! A [`Client`] owns the player's session actor, one publisher, and three
//! subscriptions:
//!
//! | Queue | Binding | Durability | Handler |
//! |---|---|---|---|
//! | `pause.<user>` | `pause` on `peril_direct` | transient | [`PauseHandler`] |
//! | `army_moves.<user>` | `army_moves.*` | transient | [`MoveHandler`] |
//! | `war` | `war.*` | durable, shared by all clients | [`WarHandler`] |

use peril_broker::{Broker, Durability};
use peril_game::{spawn_session, GameError, GameState, SessionHandle, StatusReport};
use peril_protocol::routing::{
    family_wildcard, user_key, ARMY_MOVES_PREFIX, EXCHANGE_PERIL_DIRECT, EXCHANGE_PERIL_TOPIC,
    PAUSE_KEY, WAR_RECOGNITIONS_PREFIX,
};
use peril_protocol::{ArmyMove, JsonCodec, Unit, UnitRank};
use peril_pubsub::{subscribe_with, Publisher};
use rand::Rng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::handlers::{publish_game_log, MoveHandler, Notice, PauseHandler, WarHandler};
use crate::{PerilConfig, PerilError};

/// Lines published by `spam`.
const MALICIOUS_LOGS: &[&str] = &[
    "Never interrupt your enemy when he is making a mistake.",
    "The hardest thing of all for a soldier is to retreat.",
    "A soldier will fight long and hard for a bit of colored ribbon.",
    "It should not be thought that Peril is won by strength alone.",
    "If the enemy is in range, so are you.",
    "Nobody ever defended anything successfully, there is only attack and attack and attack some more.",
    "Whoever said the pen is mightier than the sword obviously never encountered automatic weapons.",
    "In war there is no substitute for victory.",
    "All warfare is based on deception.",
    "Opportunities multiply as they are seized.",
];

fn random_malicious_log() -> &'static str {
    MALICIOUS_LOGS[rand::rng().random_range(0..MALICIOUS_LOGS.len())]
}

/// Checks that `username` can be used as a routing-key word.
pub fn validate_username(username: &str) -> Result<(), PerilError> {
    if username.is_empty() {
        return Err(PerilError::Config("username must not be empty".into()));
    }
    if username
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '.' | '*' | '#'))
    {
        return Err(PerilError::Config(format!(
            "username '{username}' must not contain whitespace, '.', '*' or '#'"
        )));
    }
    Ok(())
}

/// A connected player.
pub struct Client<B: Broker> {
    session: SessionHandle,
    publisher: Publisher<B::Channel>,
    tasks: Vec<JoinHandle<()>>,
}

impl<B: Broker> Client<B> {
    /// Declares the topology, starts the session actor and subscribes the
    /// player's handlers.
    ///
    /// Returns the client and the stream of [`Notice`]s its handlers
    /// produce. The broker connection must stay open for as long as the
    /// client runs: the player's transient queues are deleted with it.
    pub async fn start(
        broker: &B,
        username: &str,
        config: &PerilConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Notice>), PerilError> {
        validate_username(username)?;
        crate::topology::declare_exchanges(broker).await?;

        let session = spawn_session(GameState::new(username), config.session_channel_size);
        let publisher = Publisher::open(broker).await?;
        let (notices, notice_rx) = mpsc::unbounded_channel();
        let options = config.subscribe_options();

        let pause = subscribe_with(
            broker,
            EXCHANGE_PERIL_DIRECT,
            &user_key(PAUSE_KEY, username),
            PAUSE_KEY,
            Durability::Transient,
            PauseHandler {
                session: session.clone(),
                notices: notices.clone(),
            },
            JsonCodec,
            options,
        )
        .await?;

        let moves = subscribe_with(
            broker,
            EXCHANGE_PERIL_TOPIC,
            &user_key(ARMY_MOVES_PREFIX, username),
            &family_wildcard(ARMY_MOVES_PREFIX),
            Durability::Transient,
            MoveHandler {
                session: session.clone(),
                publisher: publisher.clone(),
                notices: notices.clone(),
            },
            JsonCodec,
            options,
        )
        .await?;

        let wars = subscribe_with(
            broker,
            EXCHANGE_PERIL_TOPIC,
            WAR_RECOGNITIONS_PREFIX,
            &family_wildcard(WAR_RECOGNITIONS_PREFIX),
            Durability::Durable,
            WarHandler {
                session: session.clone(),
                publisher: publisher.clone(),
                notices,
            },
            JsonCodec,
            options,
        )
        .await?;

        tracing::info!(username, "client started");
        let client = Self {
            session,
            publisher,
            tasks: vec![pause, moves, wars],
        };
        Ok((client, notice_rx))
    }

    pub fn username(&self) -> &str {
        self.session.username()
    }

    pub async fn spawn(&self, location: &str, rank: UnitRank) -> Result<Unit, PerilError> {
        Ok(self.session.spawn(location, rank).await?)
    }

    /// Moves own units and announces the move to every player.
    ///
    /// The local state is updated before the publish, so a failed publish
    /// leaves the units moved locally but unseen by others.
    pub async fn move_units(
        &self,
        location: &str,
        unit_ids: Vec<u32>,
    ) -> Result<ArmyMove, PerilError> {
        let mv = self.session.move_units(location, unit_ids).await?;
        self.publisher
            .publish_json(
                EXCHANGE_PERIL_TOPIC,
                &user_key(ARMY_MOVES_PREFIX, self.username()),
                &mv,
            )
            .await?;
        tracing::info!(username = %self.username(), location, units = mv.units.len(), "move published");
        Ok(mv)
    }

    pub async fn status(&self) -> Result<StatusReport, PerilError> {
        Ok(self.session.status().await?)
    }

    /// Publishes `count` random game logs.
    pub async fn spam(&self, count: usize) -> Result<(), PerilError> {
        if count == 0 {
            return Err(GameError::Usage("spam needs a positive number".into()).into());
        }
        for _ in 0..count {
            publish_game_log(&self.publisher, self.username(), random_malicious_log()).await?;
        }
        tracing::info!(username = %self.username(), count, "spam published");
        Ok(())
    }

    /// Stops the subscriptions. The session actor stops once the last
    /// handle to it is gone.
    pub fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
        tracing::info!(username = %self.username(), "client stopped");
    }
}
