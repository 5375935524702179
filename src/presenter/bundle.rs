//! # Opaque state container for save/restore round-trips.
//!
//! [`StateBundle`] is a string-keyed bag of JSON values the host carries
//! verbatim across process recreation. Presenters write whatever they need
//! into it from their save hook and read it back on create; the provider
//! nests the presenter bundle and the cache id inside one outer bundle.
//!
//! The wire format of the container is the host's business; this type only
//! guarantees that what was put in comes back out.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// String-keyed state container, round-tripped verbatim by the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateBundle {
    entries: HashMap<String, serde_json::Value>,
}

impl StateBundle {
    /// Creates an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a serializable value under `key`, replacing any previous one.
    ///
    /// A value that fails to serialize is skipped (and logged); state
    /// saving must never take the host down.
    pub fn put<T: Serialize>(&mut self, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(encoded) => {
                self.entries.insert(key.to_string(), encoded);
            }
            Err(e) => warn!("state entry {key} not serializable, skipped: {e}"),
        }
    }

    /// Reads the value under `key`, if present and of the requested shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self.entries.get(key)?;
        serde_json::from_value(entry.clone()).ok()
    }

    /// Stores a nested bundle under `key`.
    pub fn put_bundle(&mut self, key: &str, bundle: StateBundle) {
        self.put(key, &bundle);
    }

    /// Reads a nested bundle under `key`.
    pub fn bundle(&self, key: &str) -> Option<StateBundle> {
        self.get(key)
    }

    /// True if no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if `key` has an entry.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}
