//! Error types for the game layer.

/// Errors returned by player commands and the session handle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    /// Units can't move while the server has the game paused.
    #[error("the game is paused, units cannot move")]
    Paused,

    /// The location is not on the map.
    #[error("unknown location '{0}'")]
    UnknownLocation(String),

    /// The player owns no unit with this id.
    #[error("you don't own a unit with id {0}")]
    UnknownUnit(u32),

    /// A move named no units.
    #[error("a move needs at least one unit")]
    NoUnitsSelected,

    /// The command line could not be parsed.
    #[error("{0}")]
    Usage(String),

    /// The session actor has stopped.
    #[error("session is unavailable")]
    SessionUnavailable,
}
