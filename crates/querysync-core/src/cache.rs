//! In-memory cache of named query results.
//!
//! `QueryCache` is the holder a mutation collaborator applies update sets
//! to: each entry is the last result of one named query. Nothing here is
//! written to disk.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::dispatch::UpdateQueries;
use crate::keyed::KeyedStructure;

#[derive(Debug, Clone, Default)]
pub struct QueryCache {
    entries: HashMap<String, KeyedStructure>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot shaped `{ queryName: result, ... }`.
    ///
    /// Entries whose result is not an object are skipped.
    pub fn with_snapshot(mut self, snapshot: KeyedStructure) -> Self {
        for (name, result) in snapshot {
            match result {
                Value::Object(data) => self.insert(name, data),
                other => {
                    debug!(query = %name, value = %other, "Skipping non-object query result");
                }
            }
        }
        self
    }

    /// All entries as `{ queryName: result }`, sorted by query name.
    pub fn snapshot(&self) -> KeyedStructure {
        self.names()
            .into_iter()
            .filter_map(|name| {
                self.entries
                    .get(name)
                    .map(|data| (name.to_string(), Value::Object(data.clone())))
            })
            .collect()
    }

    pub fn insert(&mut self, query: impl Into<String>, data: KeyedStructure) {
        self.entries.insert(query.into(), data);
    }

    pub fn get(&self, query: &str) -> Option<&KeyedStructure> {
        self.entries.get(query)
    }

    pub fn remove(&mut self, query: &str) -> Option<KeyedStructure> {
        self.entries.remove(query)
    }

    /// Cached query names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace each cached entry with its transformed value.
    ///
    /// Returns the names of entries whose data changed.
    pub fn apply(&mut self, updates: &UpdateQueries) -> Vec<String> {
        let mut changed = Vec::new();
        for (name, data) in self.entries.iter_mut() {
            let Some(transform) = updates.get(name) else {
                continue;
            };
            let next = transform(data.clone());
            if next != *data {
                *data = next;
                changed.push(name.clone());
            }
        }
        changed.sort_unstable();
        debug!(
            changed = ?changed,
            passthrough = updates.is_passthrough(),
            "Applied cache updates"
        );
        changed
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::dispatch::UpdateRegistry;

    fn structure(value: Value) -> KeyedStructure {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_snapshot_roundtrip_skips_non_objects() {
        let cache = QueryCache::default().with_snapshot(structure(json!({
            "TalkAdmin_Configure": {"settings": {"a": 1}},
            "TalkAdmin_Community": {"users": {"nodes": []}},
            "broken": [1, 2]
        })));
        assert_eq!(cache.names(), ["TalkAdmin_Community", "TalkAdmin_Configure"]);
        assert_eq!(
            Value::Object(cache.snapshot()),
            json!({
                "TalkAdmin_Community": {"users": {"nodes": []}},
                "TalkAdmin_Configure": {"settings": {"a": 1}}
            })
        );
    }

    #[test]
    fn test_apply_updates_only_named_entries() {
        let mut cache = QueryCache::default().with_snapshot(structure(json!({
            "TalkAdmin_Community": {"users": {"nodes": [{"id": "u1"}, {"id": "u2"}]}},
            "TalkAdmin_Configure": {"settings": {"a": 1}}
        })));
        let updates = UpdateRegistry::builtin()
            .dispatch("RejectUsername", &structure(json!({"input": {"id": "u1"}})))
            .unwrap();
        let changed = cache.apply(&updates);

        assert_eq!(changed, vec!["TalkAdmin_Community".to_string()]);
        assert_eq!(
            Value::Object(cache.get("TalkAdmin_Community").unwrap().clone()),
            json!({"users": {"nodes": [{"id": "u2"}]}})
        );
        assert_eq!(
            Value::Object(cache.get("TalkAdmin_Configure").unwrap().clone()),
            json!({"settings": {"a": 1}})
        );
    }

    #[test]
    fn test_apply_passthrough_changes_nothing() {
        let snapshot = structure(json!({"TalkAdmin_Configure": {"settings": {"a": 1}}}));
        let mut cache = QueryCache::default().with_snapshot(snapshot.clone());
        let changed = cache.apply(&UpdateQueries::passthrough());
        assert!(changed.is_empty());
        assert_eq!(cache.snapshot(), snapshot);
    }

    #[test]
    fn test_apply_without_listing_changes_nothing() {
        let snapshot = structure(json!({
            "TalkAdmin_Community": {"totalCount": 0},
            "TalkAdmin_Configure": {"settings": {"a": 1}}
        }));
        let mut cache = QueryCache::new().with_snapshot(snapshot.clone());
        let registry = UpdateRegistry::builtin();

        for (mutation, vars) in [
            ("RejectUsername", json!({"input": {"id": "u1"}})),
            ("SetUserStatus", json!({"status": "APPROVED", "userId": "u1"})),
        ] {
            let updates = registry.dispatch(mutation, &structure(vars)).unwrap();
            assert!(cache.apply(&updates).is_empty());
        }
        assert_eq!(cache.snapshot(), snapshot);
    }

    #[test]
    fn test_insert_get_remove() {
        let mut cache = QueryCache::new();
        assert!(cache.get("TalkAdmin_Configure").is_none());

        cache.insert("TalkAdmin_Configure", KeyedStructure::new());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("TalkAdmin_Configure"), Some(&KeyedStructure::new()));

        assert!(cache.remove("TalkAdmin_Configure").is_some());
        assert!(cache.is_empty());
    }
}
