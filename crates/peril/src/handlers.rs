//! Subscription handlers.
//!
//! Each handler turns one decoded event into a call on the session actor
//! (or the game-log file), publishes whatever follows from it, and answers
//! with an [`AckType`]. Anything the player should see is sent as a
//! [`Notice`] to the interactive loop, which does the printing.

use std::fmt;
use std::sync::Arc;

use peril_broker::BrokerChannel;
use peril_game::{MoveOutcome, SessionHandle, WarOutcome};
use peril_protocol::routing::{user_key, EXCHANGE_PERIL_TOPIC, GAME_LOG_SLUG, WAR_RECOGNITIONS_PREFIX};
use peril_protocol::{ArmyMove, GameLog, PlayingState, RecognitionOfWar};
use peril_pubsub::{AckType, Handler, PubSubError, Publisher};
use tokio::sync::mpsc;

use crate::gamelog::GameLogWriter;

/// Something a handler wants the player to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The server paused or resumed the game.
    Playing { paused: bool },
    /// Another player's (or our own echoed) move was applied.
    Move { mover: String, outcome: MoveOutcome },
    /// A war this player was part of was resolved.
    War(WarOutcome),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Playing { paused: true } => write!(f, "The game has been paused."),
            Self::Playing { paused: false } => write!(f, "The game has been resumed."),
            Self::Move {
                mover,
                outcome: MoveOutcome::SamePlayer,
            } => write!(f, "{mover}'s move was applied."),
            Self::Move {
                mover,
                outcome: MoveOutcome::Safe,
            } => write!(f, "{mover} moved. No conflict."),
            Self::Move {
                mover,
                outcome: MoveOutcome::MakeWar,
            } => write!(f, "{mover} moved into your territory. War declared!"),
            Self::War(outcome) => match outcome.log_message() {
                Some(message) => write!(f, "{message}"),
                None => write!(f, "{outcome:?}"),
            },
        }
    }
}

/// Sender side of the notice stream. Sending never blocks and a closed
/// receiver is ignored.
pub type NoticeSender = mpsc::UnboundedSender<Notice>;

fn notify(notices: &NoticeSender, notice: Notice) {
    let _ = notices.send(notice);
}

/// Publishes a [`GameLog`] for `username` with the binary codec.
pub async fn publish_game_log<Ch: BrokerChannel>(
    publisher: &Publisher<Ch>,
    username: &str,
    message: &str,
) -> Result<(), PubSubError> {
    let log = GameLog::now(username, message);
    publisher
        .publish_binary(EXCHANGE_PERIL_TOPIC, &user_key(GAME_LOG_SLUG, username), &log)
        .await
}

// ---------------------------------------------------------------------------
// Pause
// ---------------------------------------------------------------------------

/// Applies pause/resume broadcasts to the session.
pub struct PauseHandler {
    pub session: SessionHandle,
    pub notices: NoticeSender,
}

impl Handler<PlayingState> for PauseHandler {
    async fn handle(&self, state: PlayingState) -> AckType {
        match self.session.handle_pause(state).await {
            Ok(()) => {
                notify(&self.notices, Notice::Playing {
                    paused: state.is_paused,
                });
                AckType::Ack
            }
            Err(e) => {
                tracing::warn!(username = %self.session.username(), error = %e, "pause not applied");
                AckType::NackRequeue
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Moves
// ---------------------------------------------------------------------------

/// Applies army moves and declares war when one lands on our units.
pub struct MoveHandler<Ch> {
    pub session: SessionHandle,
    pub publisher: Publisher<Ch>,
    pub notices: NoticeSender,
}

impl<Ch: BrokerChannel> Handler<ArmyMove> for MoveHandler<Ch> {
    async fn handle(&self, mv: ArmyMove) -> AckType {
        let username = self.session.username();
        if mv.units.is_empty() {
            tracing::warn!(username, mover = %mv.player.username, "move without units rejected");
            return AckType::NackDiscard;
        }

        let mover = mv.player.username.clone();
        let report = match self.session.handle_move(mv).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(username, %mover, error = %e, "move not applied");
                return AckType::NackRequeue;
            }
        };
        notify(&self.notices, Notice::Move {
            mover: mover.clone(),
            outcome: report.outcome,
        });

        let Some(declaration) = report.declaration else {
            return AckType::Ack;
        };

        let key = user_key(WAR_RECOGNITIONS_PREFIX, username);
        match self
            .publisher
            .publish_json(EXCHANGE_PERIL_TOPIC, &key, &declaration)
            .await
        {
            Ok(()) => {
                tracing::info!(username, attacker = %mover, "war declared");
                AckType::Ack
            }
            Err(e) => {
                tracing::error!(username, attacker = %mover, error = %e, "failed to publish war recognition");
                AckType::NackRequeue
            }
        }
    }
}

// ---------------------------------------------------------------------------
// War
// ---------------------------------------------------------------------------

/// Resolves war recognitions from the shared `war` queue.
///
/// A recognition the local player isn't part of goes back to the queue for
/// the players it concerns. One with nothing left to fight over is
/// discarded. A resolved war is logged to the server before it is acked.
pub struct WarHandler<Ch> {
    pub session: SessionHandle,
    pub publisher: Publisher<Ch>,
    pub notices: NoticeSender,
}

impl<Ch: BrokerChannel> Handler<RecognitionOfWar> for WarHandler<Ch> {
    async fn handle(&self, war: RecognitionOfWar) -> AckType {
        let username = self.session.username();
        let attacker = war.attacker.username.clone();
        let defender = war.defender.username.clone();

        let outcome = match self.session.handle_war(war).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(username, %attacker, %defender, error = %e, "war not applied");
                return AckType::NackRequeue;
            }
        };

        let Some(message) = outcome.log_message() else {
            return match outcome {
                WarOutcome::NotInvolved => {
                    tracing::debug!(username, %attacker, %defender, "war for other players, requeueing");
                    AckType::NackRequeue
                }
                _ => {
                    tracing::info!(username, %attacker, %defender, "war has no units to fight, discarding");
                    AckType::NackDiscard
                }
            };
        };

        tracing::info!(username, %attacker, %defender, outcome = %message, "war resolved");
        notify(&self.notices, Notice::War(outcome));

        match publish_game_log(&self.publisher, username, &message).await {
            Ok(()) => AckType::Ack,
            Err(e) => {
                tracing::error!(username, error = %e, "failed to publish game log");
                AckType::NackRequeue
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Game logs (server)
// ---------------------------------------------------------------------------

/// Appends game logs to the server's log file.
pub struct LogHandler {
    pub writer: Arc<GameLogWriter>,
}

impl Handler<GameLog> for LogHandler {
    async fn handle(&self, log: GameLog) -> AckType {
        match self.writer.write(&log).await {
            Ok(()) => AckType::Ack,
            Err(e) => {
                tracing::error!(
                    path = %self.writer.path().display(),
                    username = %log.username,
                    error = %e,
                    "failed to write game log"
                );
                AckType::NackRequeue
            }
        }
    }
}
