//! # Telemetry Store
//!
//! Last-write-wins key/value snapshot shared between the acquisition task and
//! any number of consumers.
//!
//! Every merge bumps a global version and stamps the written keys with it, so a
//! consumer can ask for only what changed since its previous read.
//!
//! ## Usage
//!
//! ```
//! use fcb_groundlink::telemetry::TelemetryStore;
//! use fcb_groundlink::fcb::protocol::{FieldMap, Value};
//!
//! let store = TelemetryStore::new();
//! let mut fields = FieldMap::new();
//! fields.insert("altitude".to_string(), Value::Float(120.0));
//! store.merge(&fields);
//!
//! assert_eq!(store.get_f64_or("altitude", 0.0), 120.0);
//! assert_eq!(store.get_f64_or("vertical_speed", 0.0), 0.0); // absent -> default
//! ```

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::fcb::protocol::{FieldMap, Value};

#[derive(Debug, Default)]
struct Inner {
    version: u64,
    entries: BTreeMap<String, (Value, u64)>,
}

/// Shared telemetry snapshot
///
/// Cloning the surrounding `Arc` is how consumers share it; the store itself
/// holds a single lock around merges and copies.
#[derive(Debug, Default)]
pub struct TelemetryStore {
    inner: Mutex<Inner>,
}

/// Keys written after a given version
#[derive(Debug, Clone, PartialEq)]
pub struct Changes {
    /// Version to pass to the next `changed_since` call
    pub version: u64,
    pub values: FieldMap,
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // A consumer panicking while holding the lock must not stop acquisition
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Merge fields, overwriting existing keys; returns the new version
    pub fn merge(&self, fields: &FieldMap) -> u64 {
        let mut inner = self.lock();
        inner.version += 1;
        let version = inner.version;
        for (key, value) in fields {
            inner.entries.insert(key.clone(), (value.clone(), version));
        }
        version
    }

    /// Merge only the fields whose value differs from the stored one
    ///
    /// Unchanged keys keep their version, so `changed_since` does not report
    /// them again. The version is not bumped when nothing differs.
    pub fn merge_changed(&self, fields: &FieldMap) -> u64 {
        let mut inner = self.lock();
        let changed: Vec<_> = fields
            .iter()
            .filter(|(key, value)| inner.entries.get(*key).map(|(v, _)| v) != Some(*value))
            .collect();
        if changed.is_empty() {
            return inner.version;
        }

        inner.version += 1;
        let version = inner.version;
        for (key, value) in changed {
            inner.entries.insert(key.clone(), (value.clone(), version));
        }
        version
    }

    /// Set a single key
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> u64 {
        let mut inner = self.lock();
        inner.version += 1;
        let version = inner.version;
        inner.entries.insert(key.into(), (value.into(), version));
        version
    }

    /// Full copy of every key
    pub fn snapshot(&self) -> FieldMap {
        self.lock()
            .entries
            .iter()
            .map(|(k, (v, _))| (k.clone(), v.clone()))
            .collect()
    }

    /// Keys written after `version`, plus the current version
    pub fn changed_since(&self, version: u64) -> Changes {
        let inner = self.lock();
        let values = inner
            .entries
            .iter()
            .filter(|(_, (_, written))| *written > version)
            .map(|(k, (v, _))| (k.clone(), v.clone()))
            .collect();
        Changes {
            version: inner.version,
            values,
        }
    }

    /// Current version (0 before the first write)
    pub fn version(&self) -> u64 {
        self.lock().version
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().entries.get(key).map(|(v, _)| v.clone())
    }

    pub fn get_f64_or(&self, key: &str, default: f64) -> f64 {
        self.get(key).and_then(|v| v.as_f64()).unwrap_or(default)
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
    }

    pub fn get_str_or(&self, key: &str, default: &str) -> String {
        self.get(key)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| default.to_string())
    }
}
