//! Game rules for Peril.
//!
//! # Key types
//!
//! - [`GameState`]: one player's units, pause flag, sightings and war
//!   partners, with the spawn/move/status commands and the pause/move/war
//!   event handlers
//! - [`war`]: move and war outcomes and the combat rules
//! - [`SessionHandle`]: talks to the actor that owns the `GameState`
//! - [`ClientCommand`] / [`ServerCommand`]: parsed prompt input
//!
//! Nothing in this crate touches the broker. Callers feed it decoded
//! events and publish whatever it tells them to.

mod actor;
mod command;
mod error;
mod state;
pub mod war;

pub use actor::{spawn_session, MoveReport, SessionHandle};
pub use command::{ClientCommand, ServerCommand, CLIENT_HELP, SERVER_HELP};
pub use error::GameError;
pub use state::{is_valid_location, GameState, StatusReport, LOCATIONS};
pub use war::{MoveOutcome, WarOutcome};
