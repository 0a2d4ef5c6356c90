//! Shared references — direct, uncopied handle sharing.
//!
//! Some collaborators need to share things that are not documents at all:
//! database pools, clients, channels. [`SharedRefs`] holds such handles as
//! type-erased `Arc<T>` values keyed by string. Unlike shared objects, these
//! are handed out by reference, fire no watchers, and are never copied.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

struct RefSlot {
    value: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
}

impl RefSlot {
    fn new<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            value,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }
}

/// A bag of directly-shared handles.
///
/// # Example
///
/// ```
/// use shared_state::StateController;
///
/// struct Pool { size: usize }
///
/// let controller = StateController::new();
/// controller.refs().insert("db", Pool { size: 4 });
///
/// let pool = controller.refs().get::<Pool>("db").unwrap();
/// assert_eq!(pool.size, 4);
/// ```
#[derive(Default)]
pub struct SharedRefs {
    slots: RwLock<HashMap<String, RefSlot>>,
}

impl SharedRefs {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing any previous handle.
    ///
    /// Returns `true` if a previous handle was replaced.
    pub fn insert<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) -> bool {
        self.insert_arc(key, Arc::new(value))
    }

    /// Store an already shared handle under `key`.
    pub fn insert_arc<T: Any + Send + Sync>(&self, key: impl Into<String>, value: Arc<T>) -> bool {
        self.slots
            .write()
            .insert(key.into(), RefSlot::new(value))
            .is_some()
    }

    /// Get the handle under `key` if it holds a `T`.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let slots = self.slots.read();
        let slot = slots.get(key)?;
        slot.value.clone().downcast::<T>().ok()
    }

    /// Whether the handle under `key` holds a `T`.
    pub fn is<T: Any>(&self, key: &str) -> bool {
        self.slots
            .read()
            .get(key)
            .is_some_and(|slot| slot.type_id == TypeId::of::<T>())
    }

    /// Type name of the handle under `key`, for diagnostics.
    pub fn type_name(&self, key: &str) -> Option<&'static str> {
        self.slots.read().get(key).map(|slot| slot.type_name)
    }

    /// Whether a handle is stored under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.slots.read().contains_key(key)
    }

    /// Remove the handle under `key`. Returns `true` if one existed.
    ///
    /// Other holders of the `Arc` keep their handle alive.
    pub fn remove(&self, key: &str) -> bool {
        self.slots.write().remove(key).is_some()
    }

    /// Keys currently held, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.slots.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of stored handles.
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Whether no handles are stored.
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }
}

impl fmt::Debug for SharedRefs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.read();
        let mut map = f.debug_map();
        for (key, slot) in slots.iter() {
            map.entry(key, &slot.type_name);
        }
        map.finish()
    }
}
