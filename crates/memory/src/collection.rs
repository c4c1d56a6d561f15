//! Free-form bookkeeping the model keeps between turns.
//!
//! A single JSON object. Each key holds one of:
//! - a counter (`increment_item`)
//! - a list of unique strings (`add_value_to_key`)
//! - a map of item → count (`add_item_to`)
//!
//! The whole object is rewritten after every mutation. A mutation whose
//! write fails leaves the store as it was.

use issola_core::error::StoreError;
use serde_json::{Map, Value};
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::debug;

use crate::json_file;

pub struct CollectionStore {
    path: Option<PathBuf>,
    entries: Mutex<Map<String, Value>>,
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_u64() => "counter",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

fn wrong_type(key: &str, expected: &'static str, found: &Value) -> StoreError {
    StoreError::WrongType {
        key: key.to_string(),
        expected,
        found: kind(found),
    }
}

impl CollectionStore {
    /// Load from `path`; missing or corrupt files start empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries: Map<String, Value> = json_file::load_or_default(&path, "collection");
        debug!(path = %path.display(), keys = entries.len(), "Collection loaded");
        Self {
            path: Some(path),
            entries: Mutex::new(entries),
        }
    }

    pub fn ephemeral() -> Self {
        Self {
            path: None,
            entries: Mutex::new(Map::new()),
        }
    }

    fn flush(&self, entries: &Map<String, Value>) -> Result<(), StoreError> {
        match &self.path {
            Some(path) => json_file::write_pretty(path, entries),
            None => Ok(()),
        }
    }

    /// Apply `edit` to a copy of the entries. The copy replaces the live
    /// map only once it is on disk. `edit` returns its output and whether
    /// anything changed.
    async fn commit<T>(
        &self,
        edit: impl FnOnce(&mut Map<String, Value>) -> Result<(T, bool), StoreError>,
    ) -> Result<T, StoreError> {
        let mut entries = self.entries.lock().await;
        let mut candidate = entries.clone();
        let (output, changed) = edit(&mut candidate)?;
        if changed {
            self.flush(&candidate)?;
            *entries = candidate;
        }
        Ok(output)
    }

    /// Add `value` to the list under `key`, creating the list if needed.
    /// Returns `false` when the value was already present.
    pub async fn add_value_to_key(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        self.commit(|entries| {
            let list = entries
                .entry(key.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            match list {
                Value::Array(items) if items.iter().any(|v| v.as_str() == Some(value)) => {
                    Ok((false, false))
                }
                Value::Array(items) => {
                    items.push(Value::String(value.to_string()));
                    Ok((true, true))
                }
                other => Err(wrong_type(key, "list", other)),
            }
        })
        .await
    }

    /// Remove `value` from the list under `key`; an emptied list drops the key.
    /// Returns `false` when there was nothing to remove.
    pub async fn remove_value_from_key(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        self.commit(|entries| {
            let Some(Value::Array(items)) = entries.get_mut(key) else {
                return Ok((false, false));
            };
            let before = items.len();
            items.retain(|v| v.as_str() != Some(value));
            if items.len() == before {
                return Ok((false, false));
            }
            if items.is_empty() {
                entries.remove(key);
            }
            Ok((true, true))
        })
        .await
    }

    pub async fn get_key_value(&self, key: &str) -> Option<Value> {
        self.entries.lock().await.get(key).cloned()
    }

    /// Set `item` to 1 inside the map under `target`, creating the map.
    pub async fn add_item_to(&self, item: &str, target: &str) -> Result<(), StoreError> {
        self.commit(|entries| {
            let map = entries
                .entry(target.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            match map {
                Value::Object(items) => {
                    items.insert(item.to_string(), Value::from(1));
                    Ok(((), true))
                }
                other => Err(wrong_type(target, "map", other)),
            }
        })
        .await
    }

    /// Remove `item` from the map under `target`.
    pub async fn remove_item_from(&self, item: &str, target: &str) -> Result<bool, StoreError> {
        self.commit(|entries| match entries.get_mut(target) {
            Some(Value::Object(items)) => {
                let removed = items.remove(item).is_some();
                Ok((removed, removed))
            }
            Some(other) => Err(wrong_type(target, "map", other)),
            None => Ok((false, false)),
        })
        .await
    }

    /// Rename `key` to `new_key`, keeping its value.
    pub async fn change_item(&self, key: &str, new_key: &str) -> Result<bool, StoreError> {
        self.commit(|entries| {
            let Some(value) = entries.remove(key) else {
                return Ok((false, false));
            };
            entries.insert(new_key.to_string(), value);
            Ok((true, true))
        })
        .await
    }

    pub async fn remove_item(&self, key: &str) -> Result<bool, StoreError> {
        self.commit(|entries| {
            let removed = entries.remove(key).is_some();
            Ok((removed, removed))
        })
        .await
    }

    pub async fn find_item(&self, key: &str) -> bool {
        self.entries.lock().await.contains_key(key)
    }

    /// Bump the counter under `key`, starting at 1. Returns the new count.
    pub async fn increment_item(&self, key: &str) -> Result<u64, StoreError> {
        self.commit(|entries| {
            let count = match entries.get(key) {
                None => 1,
                Some(Value::Number(n)) if n.is_u64() => n.as_u64().unwrap_or_default() + 1,
                Some(other) => return Err(wrong_type(key, "counter", other)),
            };
            entries.insert(key.to_string(), Value::from(count));
            Ok((count, true))
        })
        .await
    }

    /// Number of top-level keys.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
