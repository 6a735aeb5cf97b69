//! Payload types for Peril's wire format.
//!
//! Every type here travels through the broker: it is encoded by a
//! [`Codec`](crate::Codec) on one process and decoded on another. Values
//! are always copies: a [`PlayerSnapshot`] inside an [`ArmyMove`] is the
//! sender's state at the moment of the move, and later local changes on
//! the sender are never visible through it.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// PlayingState
// ---------------------------------------------------------------------------

/// Pause/resume control, broadcast by the server.
///
/// Every subscriber applies it unconditionally. Receiving the same value
/// twice is harmless: the last one received wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayingState {
    pub is_paused: bool,
}

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

/// The kind of a unit. Serialized in lowercase (`"infantry"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitRank {
    Infantry,
    Cavalry,
    Artillery,
}

impl UnitRank {
    /// All ranks, weakest first.
    pub const ALL: [UnitRank; 3] = [Self::Infantry, Self::Cavalry, Self::Artillery];
}

impl fmt::Display for UnitRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infantry => write!(f, "infantry"),
            Self::Cavalry => write!(f, "cavalry"),
            Self::Artillery => write!(f, "artillery"),
        }
    }
}

impl FromStr for UnitRank {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "infantry" => Ok(Self::Infantry),
            "cavalry" => Ok(Self::Cavalry),
            "artillery" => Ok(Self::Artillery),
            other => {
                let known: Vec<String> = Self::ALL.iter().map(ToString::to_string).collect();
                Err(ProtocolError::InvalidValue(format!(
                    "unknown unit rank '{other}' (expected one of: {})",
                    known.join(", ")
                )))
            }
        }
    }
}

/// A single unit owned by a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Unique per owning player, assigned at spawn.
    pub id: u32,
    pub rank: UnitRank,
    pub location: String,
}

/// A point-in-time copy of a player's identity and units.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub username: String,
    /// Units keyed by unit id. A `BTreeMap` keeps iteration (and thus
    /// every decision derived from it) deterministic.
    pub units: BTreeMap<u32, Unit>,
}

impl PlayerSnapshot {
    /// Returns the units of this snapshot standing at `location`.
    pub fn units_at(&self, location: &str) -> Vec<Unit> {
        self.units
            .values()
            .filter(|u| u.location == location)
            .cloned()
            .collect()
    }

    /// Returns `true` if any unit of this snapshot stands at `location`.
    pub fn occupies(&self, location: &str) -> bool {
        self.units.values().any(|u| u.location == location)
    }
}

// ---------------------------------------------------------------------------
// Game events
// ---------------------------------------------------------------------------

/// A player moved some of their units to a new location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmyMove {
    /// The mover's state *after* the move.
    pub player: PlayerSnapshot,
    /// The units that moved. Non-empty for any move produced by a client.
    pub units: Vec<Unit>,
    pub to_location: String,
}

/// Published by a defender whose location was entered by another player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionOfWar {
    pub attacker: PlayerSnapshot,
    pub defender: PlayerSnapshot,
}

/// A line for the server's game log.
///
/// Arrival order is best-effort chronology only; `current_time` is the
/// publisher's clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameLog {
    pub username: String,
    pub current_time: DateTime<Utc>,
    pub message: String,
}

impl GameLog {
    /// Creates a log entry stamped with the current time.
    pub fn now(username: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            current_time: Utc::now(),
            message: message.into(),
        }
    }
}

/// Formats as `<rfc3339 time> <username>: <message>`, the line format of
/// the game-log file.
impl fmt::Display for GameLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {}",
            self.current_time.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.username,
            self.message
        )
    }
}
