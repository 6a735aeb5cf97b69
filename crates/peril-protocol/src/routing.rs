//! Exchange names and routing-key conventions.
//!
//! Keys are dot-separated and hierarchical: `<family>.<username>`. Topic
//! bindings use `<family>.*` to receive the whole family.

/// Direct exchange carrying pause/resume control.
pub const EXCHANGE_PERIL_DIRECT: &str = "peril_direct";

/// Topic exchange carrying moves, war recognitions, and game logs.
pub const EXCHANGE_PERIL_TOPIC: &str = "peril_topic";

/// Fanout exchange receiving every message rejected without requeue.
pub const EXCHANGE_PERIL_DLX: &str = "peril_dlx";

/// Durable queue bound to [`EXCHANGE_PERIL_DLX`].
pub const DEAD_LETTER_QUEUE: &str = "peril_dlq";

/// Routing key for [`PlayingState`](crate::PlayingState) broadcasts.
pub const PAUSE_KEY: &str = "pause";

/// Key family for [`ArmyMove`](crate::ArmyMove).
pub const ARMY_MOVES_PREFIX: &str = "army_moves";

/// Key family and shared queue name for
/// [`RecognitionOfWar`](crate::RecognitionOfWar).
pub const WAR_RECOGNITIONS_PREFIX: &str = "war";

/// Key family and shared queue name for [`GameLog`](crate::GameLog).
pub const GAME_LOG_SLUG: &str = "game_logs";

/// Returns `<prefix>.<username>`.
pub fn user_key(prefix: &str, username: &str) -> String {
    format!("{prefix}.{username}")
}

/// Returns `<prefix>.*`, matching every single-word suffix of a family.
pub fn family_wildcard(prefix: &str) -> String {
    format!("{prefix}.*")
}
