//! A single player's view of the game.
//!
//! `GameState` is plain data with synchronous methods. It has no
//! internal locking: the session actor (see [`spawn_session`](crate::spawn_session))
//! owns it and serializes every command and event.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use peril_protocol::{
    ArmyMove, PlayerSnapshot, PlayingState, RecognitionOfWar, Unit, UnitRank,
};

use crate::war::{army_power, contested_location, fight, Battle, MoveOutcome, WarOutcome};
use crate::GameError;

/// Every location on the map.
pub const LOCATIONS: [&str; 6] = [
    "americas",
    "europe",
    "africa",
    "asia",
    "australia",
    "antarctica",
];

/// Returns `true` if `location` is on the map.
pub fn is_valid_location(location: &str) -> bool {
    LOCATIONS.contains(&location)
}

/// The local player's session state.
#[derive(Debug, Clone)]
pub struct GameState {
    username: String,
    units: BTreeMap<u32, Unit>,
    next_unit_id: u32,
    paused: bool,
    /// Other players known to have units at a location, as of their last move.
    sightings: BTreeMap<String, BTreeSet<String>>,
    /// Players the local player has recognized a war with and not yet fought.
    war_partners: BTreeSet<String>,
}

impl GameState {
    /// Creates an empty, unpaused state for `username`.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            units: BTreeMap::new(),
            next_unit_id: 1,
            paused: false,
            sightings: BTreeMap::new(),
            war_partners: BTreeSet::new(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// A by-value copy of the player's identity and units.
    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            username: self.username.clone(),
            units: self.units.clone(),
        }
    }

    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    /// Own units standing at `location`.
    pub fn units_at<'a>(&'a self, location: &'a str) -> impl Iterator<Item = &'a Unit> {
        self.units.values().filter(move |u| u.location == location)
    }

    /// Locations holding at least one own unit.
    pub fn owned_locations(&self) -> BTreeSet<&str> {
        self.units.values().map(|u| u.location.as_str()).collect()
    }

    /// Other players last seen at `location`.
    pub fn sightings_at(&self, location: &str) -> impl Iterator<Item = &str> {
        self.sightings
            .get(location)
            .into_iter()
            .flat_map(|players| players.iter().map(String::as_str))
    }

    pub fn war_partners(&self) -> impl Iterator<Item = &str> {
        self.war_partners.iter().map(String::as_str)
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Creates a unit of `rank` at `location` with the next free id.
    pub fn spawn(&mut self, location: &str, rank: UnitRank) -> Result<Unit, GameError> {
        if !is_valid_location(location) {
            return Err(GameError::UnknownLocation(location.to_string()));
        }

        let unit = Unit {
            id: self.next_unit_id,
            rank,
            location: location.to_string(),
        };
        self.next_unit_id += 1;
        self.units.insert(unit.id, unit.clone());

        tracing::debug!(username = %self.username, id = unit.id, %rank, location, "unit spawned");
        Ok(unit)
    }

    /// Moves the units with `unit_ids` to `to_location` and returns the
    /// move to publish.
    ///
    /// Refused while paused. Nothing moves unless every id is owned.
    /// Repeated ids count once.
    pub fn move_units(&mut self, to_location: &str, unit_ids: &[u32]) -> Result<ArmyMove, GameError> {
        if self.paused {
            return Err(GameError::Paused);
        }
        if !is_valid_location(to_location) {
            return Err(GameError::UnknownLocation(to_location.to_string()));
        }
        if unit_ids.is_empty() {
            return Err(GameError::NoUnitsSelected);
        }
        if let Some(&missing) = unit_ids.iter().find(|&&id| !self.units.contains_key(&id)) {
            return Err(GameError::UnknownUnit(missing));
        }

        let ids: BTreeSet<u32> = unit_ids.iter().copied().collect();
        let mut moved = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(unit) = self.units.get_mut(&id) {
                unit.location = to_location.to_string();
                moved.push(unit.clone());
            }
        }

        tracing::debug!(username = %self.username, to_location, units = moved.len(), "units moved");
        Ok(ArmyMove {
            player: self.snapshot(),
            units: moved,
            to_location: to_location.to_string(),
        })
    }

    /// A printable summary of the state.
    pub fn status(&self) -> StatusReport {
        StatusReport {
            username: self.username.clone(),
            paused: self.paused,
            units: self.units.values().cloned().collect(),
            sightings: self
                .sightings
                .iter()
                .map(|(location, players)| (location.clone(), players.iter().cloned().collect()))
                .collect(),
            war_partners: self.war_partners.iter().cloned().collect(),
        }
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Applies a pause/resume broadcast.
    pub fn handle_pause(&mut self, state: PlayingState) {
        self.paused = state.is_paused;
        tracing::info!(username = %self.username, paused = self.paused, "playing state changed");
    }

    /// Classifies an incoming move and updates what the local player knows.
    ///
    /// - [`MoveOutcome::SamePlayer`]: the mover is the local player. The
    ///   echoed units' locations are merged into the own units.
    /// - [`MoveOutcome::Safe`]: the mover's sightings are replaced by
    ///   its snapshot.
    /// - [`MoveOutcome::MakeWar`]: as `Safe`, and the mover becomes a war
    ///   partner.
    pub fn handle_move(&mut self, mv: &ArmyMove) -> MoveOutcome {
        if mv.player.username == self.username {
            for echoed in &mv.units {
                if let Some(unit) = self.units.get_mut(&echoed.id) {
                    unit.location = echoed.location.clone();
                }
            }
            return MoveOutcome::SamePlayer;
        }

        let mover = &mv.player.username;
        self.forget_sightings_of(mover);
        let seen_at = mv
            .player
            .units
            .values()
            .map(|u| u.location.as_str())
            .chain(std::iter::once(mv.to_location.as_str()));
        for location in seen_at {
            self.sightings
                .entry(location.to_string())
                .or_default()
                .insert(mover.clone());
        }

        if self.units_at(&mv.to_location).next().is_some() {
            self.war_partners.insert(mover.clone());
            tracing::info!(username = %self.username, %mover, location = %mv.to_location, "war declared");
            MoveOutcome::MakeWar
        } else {
            MoveOutcome::Safe
        }
    }

    /// Resolves a war recognition from the local player's side.
    ///
    /// The own army is taken from local state; the opponent's from its
    /// snapshot in the recognition. Losing units at the contested location
    /// are removed: own units on `OpponentWon` or `Draw`, the opponent's
    /// sighting on `YouWon` or `Draw`.
    pub fn handle_war(&mut self, war: &RecognitionOfWar) -> WarOutcome {
        let attacker = &war.attacker.username;
        let defender = &war.defender.username;
        let local_is_attacker = *attacker == self.username;
        if !local_is_attacker && *defender != self.username {
            return WarOutcome::NotInvolved;
        }
        if attacker == defender {
            return WarOutcome::NoUnits;
        }

        let Some(location) = contested_location(&war.attacker, &war.defender) else {
            return WarOutcome::NoUnits;
        };
        let own_power = army_power(self.units_at(&location));
        if own_power == 0 {
            return WarOutcome::NoUnits;
        }

        let opponent = if local_is_attacker { &war.defender } else { &war.attacker };
        let opponent_power = army_power(&opponent.units_at(&location));

        let (attacker_power, defender_power) = if local_is_attacker {
            (own_power, opponent_power)
        } else {
            (opponent_power, own_power)
        };

        let outcome = match (fight(attacker_power, defender_power), local_is_attacker) {
            (Battle::Draw, _) => WarOutcome::Draw {
                attacker: attacker.clone(),
                defender: defender.clone(),
            },
            (Battle::AttackerWins, true) | (Battle::DefenderWins, false) => WarOutcome::YouWon {
                winner: self.username.clone(),
                loser: opponent.username.clone(),
            },
            (Battle::AttackerWins, false) | (Battle::DefenderWins, true) => {
                WarOutcome::OpponentWon {
                    winner: opponent.username.clone(),
                    loser: self.username.clone(),
                }
            }
        };

        if matches!(outcome, WarOutcome::OpponentWon { .. } | WarOutcome::Draw { .. }) {
            self.units.retain(|_, u| u.location != location);
        }
        if matches!(outcome, WarOutcome::YouWon { .. } | WarOutcome::Draw { .. }) {
            if let Some(players) = self.sightings.get_mut(&location) {
                players.remove(&opponent.username);
                if players.is_empty() {
                    self.sightings.remove(&location);
                }
            }
        }
        self.war_partners.remove(&opponent.username);

        tracing::info!(
            username = %self.username,
            %attacker,
            %defender,
            %location,
            attacker_power,
            defender_power,
            ?outcome,
            "war resolved"
        );
        outcome
    }

    fn forget_sightings_of(&mut self, player: &str) {
        self.sightings.retain(|_, players| {
            players.remove(player);
            !players.is_empty()
        });
    }
}

/// Output of the `status` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub username: String,
    pub paused: bool,
    pub units: Vec<Unit>,
    pub sightings: BTreeMap<String, Vec<String>>,
    pub war_partners: Vec<String>,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Player: {}", self.username)?;
        if self.paused {
            writeln!(f, "The game is paused.")?;
        }
        if self.units.is_empty() {
            writeln!(f, "You have no units.")?;
        } else {
            writeln!(f, "Units:")?;
            for unit in &self.units {
                writeln!(f, "  * {}: {} in {}", unit.id, unit.rank, unit.location)?;
            }
        }
        for (location, players) in &self.sightings {
            writeln!(f, "Seen in {location}: {}", players.join(", "))?;
        }
        if !self.war_partners.is_empty() {
            writeln!(f, "At war with: {}", self.war_partners.join(", "))?;
        }
        Ok(())
    }
}
