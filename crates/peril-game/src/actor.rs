//! Session actor: a Tokio task that owns the player's [`GameState`].
//!
//! The command loop and every subscription handler run concurrently, yet
//! all of them read and mutate the same state. Instead of sharing it
//! behind a lock, one task owns it and everyone else sends requests over
//! an mpsc channel. Requests are applied one at a time in arrival order,
//! so commands and events are strictly ordered within the process.

use peril_protocol::{ArmyMove, PlayingState, RecognitionOfWar, Unit, UnitRank};
use tokio::sync::{mpsc, oneshot};

use crate::war::{MoveOutcome, WarOutcome};
use crate::{GameError, GameState, StatusReport};

/// Requests sent to the session actor.
///
/// Every variant carries a `oneshot` reply channel, so the caller knows
/// the request has been applied when the reply arrives.
enum SessionCommand {
    Spawn {
        location: String,
        rank: UnitRank,
        reply: oneshot::Sender<Result<Unit, GameError>>,
    },
    Move {
        location: String,
        unit_ids: Vec<u32>,
        reply: oneshot::Sender<Result<ArmyMove, GameError>>,
    },
    Status {
        reply: oneshot::Sender<StatusReport>,
    },
    Pause {
        state: PlayingState,
        reply: oneshot::Sender<()>,
    },
    IncomingMove {
        mv: ArmyMove,
        reply: oneshot::Sender<MoveReport>,
    },
    IncomingWar {
        war: RecognitionOfWar,
        reply: oneshot::Sender<WarOutcome>,
    },
}

/// Result of applying an incoming move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveReport {
    pub outcome: MoveOutcome,
    /// For [`MoveOutcome::MakeWar`]: the recognition to publish, naming the
    /// mover as attacker and the local player (as of this move) as
    /// defender.
    pub declaration: Option<RecognitionOfWar>,
}

/// Handle to a running session actor.
///
/// Cheap to clone: an `mpsc::Sender` and the username. Every method fails
/// with [`GameError::SessionUnavailable`] once the actor has stopped.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    username: String,
    sender: mpsc::Sender<SessionCommand>,
}

impl std::fmt::Debug for SessionCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Spawn { .. } => "Spawn",
            Self::Move { .. } => "Move",
            Self::Status { .. } => "Status",
            Self::Pause { .. } => "Pause",
            Self::IncomingMove { .. } => "IncomingMove",
            Self::IncomingWar { .. } => "IncomingWar",
        };
        f.write_str(name)
    }
}

impl SessionHandle {
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Sends a request built around a fresh reply channel and waits for
    /// the reply.
    async fn request<R>(
        &self,
        build: impl FnOnce(oneshot::Sender<R>) -> SessionCommand,
    ) -> Result<R, GameError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(build(reply_tx))
            .await
            .map_err(|_| GameError::SessionUnavailable)?;
        reply_rx.await.map_err(|_| GameError::SessionUnavailable)
    }

    pub async fn spawn(&self, location: &str, rank: UnitRank) -> Result<Unit, GameError> {
        let location = location.to_string();
        self.request(|reply| SessionCommand::Spawn {
            location,
            rank,
            reply,
        })
        .await?
    }

    /// Moves own units. The returned move is what to publish.
    pub async fn move_units(
        &self,
        location: &str,
        unit_ids: Vec<u32>,
    ) -> Result<ArmyMove, GameError> {
        let location = location.to_string();
        self.request(|reply| SessionCommand::Move {
            location,
            unit_ids,
            reply,
        })
        .await?
    }

    pub async fn status(&self) -> Result<StatusReport, GameError> {
        self.request(|reply| SessionCommand::Status { reply }).await
    }

    pub async fn handle_pause(&self, state: PlayingState) -> Result<(), GameError> {
        self.request(|reply| SessionCommand::Pause { state, reply })
            .await
    }

    pub async fn handle_move(&self, mv: ArmyMove) -> Result<MoveReport, GameError> {
        self.request(|reply| SessionCommand::IncomingMove { mv, reply })
            .await
    }

    pub async fn handle_war(&self, war: RecognitionOfWar) -> Result<WarOutcome, GameError> {
        self.request(|reply| SessionCommand::IncomingWar { war, reply })
            .await
    }
}

struct SessionActor {
    state: GameState,
    receiver: mpsc::Receiver<SessionCommand>,
}

impl SessionActor {
    /// Processes requests until every handle is dropped.
    async fn run(mut self) {
        tracing::info!(username = %self.state.username(), "session actor started");

        while let Some(cmd) = self.receiver.recv().await {
            tracing::trace!(?cmd, "session request");
            match cmd {
                SessionCommand::Spawn {
                    location,
                    rank,
                    reply,
                } => {
                    let _ = reply.send(self.state.spawn(&location, rank));
                }
                SessionCommand::Move {
                    location,
                    unit_ids,
                    reply,
                } => {
                    let _ = reply.send(self.state.move_units(&location, &unit_ids));
                }
                SessionCommand::Status { reply } => {
                    let _ = reply.send(self.state.status());
                }
                SessionCommand::Pause { state, reply } => {
                    self.state.handle_pause(state);
                    let _ = reply.send(());
                }
                SessionCommand::IncomingMove { mv, reply } => {
                    let _ = reply.send(self.apply_move(mv));
                }
                SessionCommand::IncomingWar { war, reply } => {
                    let _ = reply.send(self.state.handle_war(&war));
                }
            }
        }

        tracing::info!(username = %self.state.username(), "session actor stopped");
    }

    fn apply_move(&mut self, mv: ArmyMove) -> MoveReport {
        let outcome = self.state.handle_move(&mv);
        let declaration = (outcome == MoveOutcome::MakeWar).then(|| RecognitionOfWar {
            attacker: mv.player,
            defender: self.state.snapshot(),
        });
        MoveReport {
            outcome,
            declaration,
        }
    }
}

/// Spawns the actor owning `state` and returns a handle to it.
///
/// `channel_size` bounds the request queue: when it is full, callers wait.
pub fn spawn_session(state: GameState, channel_size: usize) -> SessionHandle {
    let (tx, rx) = mpsc::channel(channel_size.max(1));
    let username = state.username().to_string();

    let actor = SessionActor {
        state,
        receiver: rx,
    };
    tokio::spawn(actor.run());

    SessionHandle {
        username,
        sender: tx,
    }
}
