//! Repository — the name → value store behind the controller.
//!
//! Values enter by move through [`Repository::set`] or
//! [`Repository::insert_if_absent`] and leave through [`Repository::get`]
//! as a fresh clone, so no caller ever holds a reference into the store.

use std::collections::HashMap;

use serde_json::Value;

use crate::config::EqualityMode;

/// Mapping from shared object name to its current value.
#[derive(Debug, Default)]
pub(crate) struct Repository {
    objects: HashMap<String, Value>,
}

impl Repository {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    // --- Write operations ---

    /// Store `value` only if `name` has no entry. Returns `true` if stored.
    pub(crate) fn insert_if_absent(&mut self, name: &str, value: Value) -> bool {
        if self.objects.contains_key(name) {
            return false;
        }
        self.objects.insert(name.to_string(), value);
        true
    }

    /// Replace the entry for `name`.
    pub(crate) fn set(&mut self, name: &str, value: Value) {
        self.objects.insert(name.to_string(), value);
    }

    /// Remove the entry for `name`. Returns `true` if one existed.
    pub(crate) fn remove(&mut self, name: &str) -> bool {
        self.objects.remove(name).is_some()
    }

    // --- Read operations ---

    /// Copy out the current value for `name`.
    pub(crate) fn get(&self, name: &str) -> Option<Value> {
        self.objects.get(name).cloned()
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }

    /// Names with an entry, sorted.
    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.objects.keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether `candidate` equals the stored value under `mode`.
    ///
    /// Returns `false` when `name` has no entry.
    pub(crate) fn is_unchanged(&self, name: &str, candidate: &Value, mode: EqualityMode) -> bool {
        match self.objects.get(name) {
            Some(current) => documents_equal(current, candidate, mode),
            None => false,
        }
    }
}

/// Compare two documents under the given equality policy.
pub(crate) fn documents_equal(a: &Value, b: &Value, mode: EqualityMode) -> bool {
    match mode {
        EqualityMode::Structural => a == b,
        EqualityMode::Serialized => match (serde_json::to_string(a), serde_json::to_string(b)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        },
    }
}
