// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Directive store
//!
//! Ordered accumulator of directive name -> source expressions. Insertion
//! order is kept because it decides the byte layout of the emitted policy.
//!
//! Merge rules:
//! - adding `'none'` replaces the whole list with `['none']`
//! - the first touch of a key seeds it with `'self'`
//! - adding `'self'` to an existing key is a no-op
//! - values added after a `'none'` reset are appended (`['none', x]`)
//! - repeated values are kept, nothing is deduplicated

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::source::{directives, SourceExpression, NONE, SELF};

/// Ordered directive -> source list map
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectiveStore {
    directives: Vec<(String, Vec<String>)>,
}

impl DirectiveStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the per-request store, seeded with `default-src 'self'`
    pub fn for_page() -> Self {
        let mut store = Self::new();
        store.add_directive(directives::DEFAULT_SRC, SELF);
        store
    }

    /// Merge one source expression into `key`
    pub fn add_directive(&mut self, key: &str, value: &str) {
        self.add_expression(key, &SourceExpression::classify(value));
    }

    /// Merge a typed source expression into `key`
    pub fn add_expression(&mut self, key: &str, expr: &SourceExpression) {
        if expr.is_none() {
            match self.position(key) {
                Some(idx) => self.directives[idx].1 = vec![NONE.to_string()],
                None => self.directives.push((key.to_string(), vec![NONE.to_string()])),
            }
            return;
        }

        let idx = match self.position(key) {
            Some(idx) => idx,
            None => {
                self.directives.push((key.to_string(), vec![SELF.to_string()]));
                self.directives.len() - 1
            }
        };

        if expr.is_self() {
            return;
        }

        self.directives[idx].1.push(expr.to_string());
    }

    /// Merge a serialized policy such as an existing meta tag's content
    ///
    /// Returns the number of clauses merged. Empty or value-less clauses
    /// are skipped.
    pub fn parse_policy(&mut self, text: &str) -> usize {
        let mut merged = 0;

        for clause in text.split(';') {
            let clause = clause.trim();
            if clause.is_empty() {
                continue;
            }

            let mut parts = clause.split_whitespace();
            let Some(key) = parts.next() else {
                continue;
            };
            let values: Vec<&str> = parts.collect();
            if values.is_empty() {
                tracing::debug!(clause, "Skipping policy clause without values");
                continue;
            }

            for value in values {
                self.add_directive(key, value);
            }
            merged += 1;
        }

        merged
    }

    /// Serialize as `"<key> <v1> <v2>; "` per directive
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (key, values) in &self.directives {
            out.push_str(key);
            out.push(' ');
            out.push_str(&values.join(" "));
            out.push_str("; ");
        }
        out
    }

    /// Get the sources of a directive
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.position(key).map(|idx| self.directives[idx].1.as_slice())
    }

    /// Check if a directive is present
    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Check if a directive lists a given source
    pub fn allows(&self, key: &str, value: &str) -> bool {
        self.get(key)
            .map(|values| values.iter().any(|v| v == value))
            .unwrap_or(false)
    }

    /// Directive names in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.directives.iter().map(|(k, _)| k.as_str())
    }

    /// Iterate directives in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.directives
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of directives
    pub fn len(&self) -> usize {
        self.directives.len()
    }

    /// Check if no directive has been added
    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.directives.iter().position(|(k, _)| k == key)
    }
}

impl fmt::Display for DirectiveStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

/// Store shared between the markup pass and its spawned scan tasks
///
/// The lock is only held for a single merge and never across an await.
#[derive(Debug, Clone, Default)]
pub struct SharedStore {
    inner: Arc<Mutex<DirectiveStore>>,
}

impl SharedStore {
    /// Wrap a store
    pub fn new(store: DirectiveStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Merge one source expression
    pub fn add(&self, key: &str, value: &str) {
        self.inner.lock().add_directive(key, value);
    }

    /// Merge a serialized policy
    pub fn parse_policy(&self, text: &str) -> usize {
        self.inner.lock().parse_policy(text)
    }

    /// Current serialized policy
    pub fn serialize(&self) -> String {
        self.inner.lock().serialize()
    }

    /// Take a read-only snapshot; called once all tasks have been drained
    pub fn seal(&self) -> Policy {
        Policy {
            store: self.inner.lock().clone(),
        }
    }
}

/// Finalized, read-only policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    store: DirectiveStore,
}

impl Policy {
    /// Minimal policy served when the engine fails
    pub fn fallback() -> Self {
        Self {
            store: DirectiveStore::for_page(),
        }
    }

    /// Header / meta content value
    pub fn header_value(&self) -> String {
        self.store.serialize()
    }

    /// Underlying directives
    pub fn directives(&self) -> &DirectiveStore {
        &self.store
    }
}

impl From<DirectiveStore> for Policy {
    fn from(store: DirectiveStore) -> Self {
        Self { store }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.header_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_on_unseeded_key() {
        let mut store = DirectiveStore::new();
        store.add_directive("script-src", SELF);
        assert_eq!(store.serialize(), "script-src 'self'; ");
    }

    #[test]
    fn test_first_touch_seeds_self() {
        let mut store = DirectiveStore::new();
        store.add_directive("img-src", "https://cdn.example.com");
        assert_eq!(
            store.get("img-src").unwrap(),
            ["'self'", "https://cdn.example.com"]
        );
    }

    #[test]
    fn test_self_is_noop_on_existing_key() {
        let mut store = DirectiveStore::new();
        store.add_directive("img-src", "data:");
        store.add_directive("img-src", SELF);
        store.add_directive("img-src", SELF);
        assert_eq!(store.get("img-src").unwrap(), ["'self'", "data:"]);
    }

    #[test]
    fn test_none_replaces_everything() {
        let mut store = DirectiveStore::new();
        store.add_directive("object-src", "https://a.example");
        store.add_directive("object-src", "https://b.example");
        store.add_directive("object-src", NONE);
        assert_eq!(store.get("object-src").unwrap(), [NONE]);

        let mut fresh = DirectiveStore::new();
        fresh.add_directive("frame-src", NONE);
        assert_eq!(fresh.get("frame-src").unwrap(), [NONE]);
    }

    #[test]
    fn test_values_after_none_are_appended() {
        let mut store = DirectiveStore::new();
        store.add_directive("object-src", NONE);
        store.add_directive("object-src", "https://plugins.example");
        store.add_directive("object-src", SELF);
        assert_eq!(
            store.get("object-src").unwrap(),
            [NONE, "https://plugins.example"]
        );
    }

    #[test]
    fn test_duplicates_are_kept() {
        let mut store = DirectiveStore::new();
        store.add_directive("img-src", "data:");
        store.add_directive("img-src", "data:");
        assert_eq!(store.serialize(), "img-src 'self' data: data:; ");
    }

    #[test]
    fn test_insertion_order() {
        let mut store = DirectiveStore::for_page();
        store.add_directive("style-src", "'sha256-abc'");
        store.add_directive("img-src", "data:");
        store.add_directive("script-src", "blob:");

        let keys: Vec<&str> = store.keys().collect();
        assert_eq!(keys, ["default-src", "style-src", "img-src", "script-src"]);
        assert_eq!(
            store.serialize(),
            "default-src 'self'; style-src 'self' 'sha256-abc'; img-src 'self' data:; script-src 'self' blob:; "
        );
    }

    #[test]
    fn test_parse_policy_round_trip() {
        let mut original = DirectiveStore::new();
        original.add_directive("img-src", "https://cdn.example.com");
        let text = original.serialize();

        // Parsing seeds 'self' again; the repeated 'self' is then a no-op,
        // so the merged store equals the original.
        let mut parsed = DirectiveStore::new();
        assert_eq!(parsed.parse_policy(&text), 1);
        assert_eq!(parsed, original);
        assert_eq!(parsed.serialize(), "img-src 'self' https://cdn.example.com; ");
    }

    #[test]
    fn test_parse_policy_seeds_self_for_foreign_values() {
        let mut store = DirectiveStore::new();
        store.parse_policy("script-src https://js.example");
        assert_eq!(
            store.get("script-src").unwrap(),
            ["'self'", "https://js.example"]
        );
    }

    #[test]
    fn test_parse_policy_skips_malformed_clauses() {
        let mut store = DirectiveStore::new();
        let merged = store.parse_policy(";; upgrade-insecure-requests ;  ; img-src  data:   blob: ;");
        assert_eq!(merged, 1);
        assert!(!store.contains("upgrade-insecure-requests"));
        assert_eq!(store.get("img-src").unwrap(), ["'self'", "data:", "blob:"]);
    }

    #[test]
    fn test_parse_policy_none() {
        let mut store = DirectiveStore::for_page();
        store.parse_policy("object-src 'none'; default-src https://x.example");
        assert_eq!(store.get("object-src").unwrap(), [NONE]);
        assert_eq!(
            store.get("default-src").unwrap(),
            ["'self'", "https://x.example"]
        );
    }

    #[test]
    fn test_shared_store_concurrent_adds() {
        let shared = SharedStore::new(DirectiveStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    shared.add("connect-src", &format!("https://api{}.example", i));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let policy = shared.seal();
        let values = policy.directives().get("connect-src").unwrap();
        assert_eq!(values.len(), 9);
        assert_eq!(values[0], SELF);
    }

    #[test]
    fn test_fallback_policy() {
        assert_eq!(Policy::fallback().header_value(), "default-src 'self'; ");
    }

    #[test]
    fn test_merged_keywords_ignore_case() {
        let mut store = DirectiveStore::new();
        store.parse_policy("object-src 'NONE'; img-src 'SELF' data:");
        assert_eq!(store.get("object-src").unwrap(), ["'none'"]);
        assert_eq!(store.get("img-src").unwrap(), ["'self'", "data:"]);

        store.add_expression("script-src", &SourceExpression::hash("sha256", "abc="));
        assert_eq!(store.get("script-src").unwrap(), ["'self'", "'sha256-abc='"]);
    }
}
