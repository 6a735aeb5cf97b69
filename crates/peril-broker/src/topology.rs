//! Exchange and queue descriptions shared by every broker implementation.

use std::fmt;

/// How an exchange matches routing keys against binding keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeKind {
    /// Routing key must equal the binding key.
    Direct,
    /// Dot-separated words; `*` matches one word, `#` zero or more.
    Topic,
    /// Every bound queue receives every message.
    Fanout,
}

impl ExchangeKind {
    /// Returns `true` if a message published with `routing_key` should be
    /// delivered to a queue bound with `binding_key`.
    pub fn matches(self, binding_key: &str, routing_key: &str) -> bool {
        match self {
            Self::Direct => binding_key == routing_key,
            Self::Topic => topic_matches(binding_key, routing_key),
            Self::Fanout => true,
        }
    }
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Topic => write!(f, "topic"),
            Self::Fanout => write!(f, "fanout"),
        }
    }
}

/// AMQP topic matching of a binding pattern against a routing key.
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    match_words(&pattern, &key)
}

fn match_words(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|skip| match_words(rest, &key[skip..])),
        Some((&"*", rest)) => !key.is_empty() && match_words(rest, &key[1..]),
        Some((word, rest)) => key.first() == Some(word) && match_words(rest, &key[1..]),
    }
}

/// Lifetime policy of a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Durability {
    /// Survives broker restarts, may be shared by many consumers, never
    /// deleted automatically.
    Durable,
    /// Lives only as long as the declaring connection: exclusive to it and
    /// deleted when its last consumer goes away.
    Transient,
}

/// Everything needed to declare a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    pub name: String,
    pub durability: Durability,
    /// Exchange receiving messages rejected without requeue.
    pub dead_letter_exchange: Option<String>,
}

impl QueueSpec {
    /// Creates a spec without a dead-letter exchange.
    pub fn new(name: impl Into<String>, durability: Durability) -> Self {
        Self {
            name: name.into(),
            durability,
            dead_letter_exchange: None,
        }
    }

    /// Sets the dead-letter exchange.
    pub fn with_dead_letter_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.dead_letter_exchange = Some(exchange.into());
        self
    }

    pub fn durable(&self) -> bool {
        matches!(self.durability, Durability::Durable)
    }

    pub fn exclusive(&self) -> bool {
        matches!(self.durability, Durability::Transient)
    }

    pub fn auto_delete(&self) -> bool {
        matches!(self.durability, Durability::Transient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_star_matches_exactly_one_word() {
        assert!(topic_matches("army_moves.*", "army_moves.alice"));
        assert!(!topic_matches("army_moves.*", "army_moves"));
        assert!(!topic_matches("army_moves.*", "army_moves.alice.extra"));
        assert!(!topic_matches("army_moves.*", "war.alice"));
    }

    #[test]
    fn test_topic_hash_matches_zero_or_more_words() {
        assert!(topic_matches("#", "anything.at.all"));
        assert!(topic_matches("game_logs.#", "game_logs"));
        assert!(topic_matches("game_logs.#", "game_logs.alice.debug"));
        assert!(topic_matches("a.#.z", "a.b.c.z"));
        assert!(!topic_matches("a.#.z", "a.b.c"));
    }

    #[test]
    fn test_topic_literal_words() {
        assert!(topic_matches("war.alice", "war.alice"));
        assert!(!topic_matches("war.alice", "war.bob"));
    }

    #[test]
    fn test_direct_requires_equality() {
        assert!(ExchangeKind::Direct.matches("pause", "pause"));
        assert!(!ExchangeKind::Direct.matches("pause", "pause.alice"));
        assert!(!ExchangeKind::Direct.matches("*", "pause"));
    }

    #[test]
    fn test_fanout_matches_everything() {
        assert!(ExchangeKind::Fanout.matches("", "war.alice"));
    }

    #[test]
    fn test_queue_spec_policies() {
        let durable = QueueSpec::new("war", Durability::Durable);
        assert!(durable.durable());
        assert!(!durable.exclusive());
        assert!(!durable.auto_delete());

        let transient =
            QueueSpec::new("pause.alice", Durability::Transient).with_dead_letter_exchange("dlx");
        assert!(!transient.durable());
        assert!(transient.exclusive());
        assert!(transient.auto_delete());
        assert_eq!(transient.dead_letter_exchange.as_deref(), Some("dlx"));
    }
}
