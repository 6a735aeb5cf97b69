//! War resolution: outcomes and the pure combat rules.
//!
//! Every decision here is a function of its inputs only. Two processes
//! looking at the same snapshots reach the same verdict.

use std::collections::BTreeSet;

use peril_protocol::{PlayerSnapshot, Unit, UnitRank};

/// What an incoming [`ArmyMove`](peril_protocol::ArmyMove) means for the
/// local player. Evaluated in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveOutcome {
    /// The local player's own move, echoed back by the broker.
    SamePlayer,
    /// Another player moved somewhere the local player has no units.
    Safe,
    /// Another player moved onto the local player's units. The local
    /// player must publish a [`RecognitionOfWar`](peril_protocol::RecognitionOfWar).
    MakeWar,
}

/// What an incoming [`RecognitionOfWar`](peril_protocol::RecognitionOfWar)
/// means for the local player. Evaluated in declaration order; the last
/// three are the resolved outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WarOutcome {
    /// The local player is neither side. Someone else must resolve it.
    NotInvolved,
    /// No battle is possible: the sides share no location, or the local
    /// player has nothing left there.
    NoUnits,
    /// The local player won.
    YouWon { winner: String, loser: String },
    /// The opponent won.
    OpponentWon { winner: String, loser: String },
    /// Equal power on both sides.
    Draw { attacker: String, defender: String },
}

impl WarOutcome {
    /// The game-log line for a resolved outcome, `None` otherwise.
    pub fn log_message(&self) -> Option<String> {
        match self {
            Self::NotInvolved | Self::NoUnits => None,
            Self::YouWon { winner, loser } | Self::OpponentWon { winner, loser } => {
                Some(format!("{winner} won a war against {loser}"))
            }
            Self::Draw { attacker, defender } => Some(format!(
                "A war between {attacker} and {defender} resulted in a draw"
            )),
        }
    }
}

/// Result of comparing the two armies at the contested location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Battle {
    AttackerWins,
    DefenderWins,
    Draw,
}

/// Combat weight of a single unit.
pub fn power_level(rank: UnitRank) -> u32 {
    match rank {
        UnitRank::Infantry => 1,
        UnitRank::Cavalry => 5,
        UnitRank::Artillery => 10,
    }
}

/// Sum of the power levels of `units`.
pub fn army_power<'a>(units: impl IntoIterator<Item = &'a Unit>) -> u32 {
    units.into_iter().map(|u| power_level(u.rank)).sum()
}

/// The location where both players have units, if any.
///
/// When several locations overlap, the alphabetically first one is
/// contested, so every process picks the same.
pub fn contested_location(a: &PlayerSnapshot, b: &PlayerSnapshot) -> Option<String> {
    let a_locations: BTreeSet<&str> = a.units.values().map(|u| u.location.as_str()).collect();
    let b_locations: BTreeSet<&str> = b.units.values().map(|u| u.location.as_str()).collect();
    a_locations
        .intersection(&b_locations)
        .next()
        .map(|location| location.to_string())
}

/// Compares attacker and defender power. Higher wins, equal draws.
pub fn fight(attacker_power: u32, defender_power: u32) -> Battle {
    match attacker_power.cmp(&defender_power) {
        std::cmp::Ordering::Greater => Battle::AttackerWins,
        std::cmp::Ordering::Less => Battle::DefenderWins,
        std::cmp::Ordering::Equal => Battle::Draw,
    }
}
