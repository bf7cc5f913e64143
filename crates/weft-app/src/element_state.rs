//! Ephemeral per-element client state.
//!
//! A secondary key-value scratch space keyed by `(element id, key)`, used to
//! make re-renders of the same element instance idempotent ("has this media
//! element already autoplayed", "upload progress for this uploader"). It is
//! **never** serialized to the backend.

use std::collections::HashMap;

/// UI-only per-element flags that survive re-renders of the same element.
#[derive(Debug, Default)]
pub struct ElementStateStore {
    entries: HashMap<String, HashMap<String, serde_json::Value>>,
}

impl ElementStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` under `(element_id, key)`, replacing any prior value.
    pub fn set(&mut self, element_id: &str, key: &str, value: serde_json::Value) {
        self.entries
            .entry(element_id.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    /// The value at `(element_id, key)`, or `None` if never recorded.
    pub fn get(&self, element_id: &str, key: &str) -> Option<&serde_json::Value> {
        self.entries.get(element_id)?.get(key)
    }

    /// True when a value has been recorded under `(element_id, key)`.
    pub fn contains(&self, element_id: &str, key: &str) -> bool {
        self.get(element_id, key).is_some()
    }

    /// Drop one key of one element.
    pub fn remove(&mut self, element_id: &str, key: &str) {
        if let Some(keys) = self.entries.get_mut(element_id) {
            keys.remove(key);
            if keys.is_empty() {
                self.entries.remove(element_id);
            }
        }
    }

    /// Drop everything recorded for an element (it left the tree).
    pub fn clear_element(&mut self, element_id: &str) {
        self.entries.remove(element_id);
    }

    /// Drop everything (new session).
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_and_get() {
        let mut store = ElementStateStore::new();
        store.set("audio-3", "autoplayed", json!(true));
        assert_eq!(store.get("audio-3", "autoplayed"), Some(&json!(true)));
        assert!(store.contains("audio-3", "autoplayed"));
    }

    #[test]
    fn test_get_missing_returns_none() {
        let store = ElementStateStore::new();
        assert_eq!(store.get("nope", "key"), None);
        assert!(!store.contains("nope", "key"));
    }

    #[test]
    fn test_set_replaces() {
        let mut store = ElementStateStore::new();
        store.set("el", "k", json!(1));
        store.set("el", "k", json!(2));
        assert_eq!(store.get("el", "k"), Some(&json!(2)));
    }

    #[test]
    fn test_remove_and_clear_element() {
        let mut store = ElementStateStore::new();
        store.set("el", "a", json!(1));
        store.set("el", "b", json!(2));
        store.remove("el", "a");
        assert!(!store.contains("el", "a"));
        assert!(store.contains("el", "b"));

        store.clear_element("el");
        assert!(!store.contains("el", "b"));
    }

    #[test]
    fn test_clear_all() {
        let mut store = ElementStateStore::new();
        store.set("a", "k", json!(1));
        store.set("b", "k", json!(2));
        store.clear();
        assert!(!store.contains("a", "k"));
        assert!(!store.contains("b", "k"));
    }
}
