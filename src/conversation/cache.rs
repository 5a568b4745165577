//! Session cache of question/answer exchanges.
//!
//! Entries are never evicted; the cache lives as long as the store.

use std::sync::{Mutex, PoisonError};

use dashmap::DashMap;

use super::types::{CachedAnswer, Suggestion};

/// Thread-safe map from message id to the answer it produced.
#[derive(Debug, Default)]
pub struct QuestionCache {
    entries: DashMap<String, CachedAnswer>,
}

impl QuestionCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached answer. Empty ids never hit.
    #[must_use]
    pub fn get(&self, message_id: &str) -> Option<CachedAnswer> {
        if message_id.is_empty() {
            return None;
        }
        self.entries
            .get(message_id)
            .map(|entry| entry.value().clone())
    }

    /// Whether an answer is cached for `message_id`.
    #[must_use]
    pub fn contains(&self, message_id: &str) -> bool {
        !message_id.is_empty() && self.entries.contains_key(message_id)
    }

    /// Cache an answer, replacing any previous entry for the same id.
    /// Answers without an id are not cached.
    pub fn insert(&self, message_id: &str, message: &str, responses: &[Suggestion]) {
        if message_id.is_empty() {
            return;
        }
        self.entries.insert(
            message_id.to_string(),
            CachedAnswer::new(message, responses.to_vec()),
        );
    }

    /// Number of cached answers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Append-only list of answered message ids, oldest first.
#[derive(Debug, Default)]
pub struct QuestionHistory {
    ids: Mutex<Vec<String>>,
}

impl QuestionHistory {
    /// Create an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an answered message.
    pub fn push(&self, message_id: &str) {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message_id.to_string());
    }

    /// Copy of the history in chronological order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_round_trip() {
        let cache = QuestionCache::new();
        let responses = vec![Suggestion::new("m2", "Reset password")];
        cache.insert("m1", "hi", &responses);

        let cached = cache.get("m1");
        assert!(cached.is_some());
        let cached = cached.unwrap_or_else(|| CachedAnswer::new("", Vec::new()));
        assert_eq!(cached.message, "hi");
        assert_eq!(cached.responses, responses);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_empty_id_never_hits() {
        let cache = QuestionCache::new();
        cache.insert("", "ghost", &[]);
        assert!(cache.get("").is_none());
        assert!(!cache.contains(""));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_history_keeps_order() {
        let history = QuestionHistory::new();
        history.push("m1");
        history.push("m2");
        history.push("m1");
        assert_eq!(history.snapshot(), vec!["m1", "m2", "m1"]);
    }
}
