//! Trigger registry — per-name ordered lists of watcher callbacks.
//!
//! Callbacks are compared by `Arc` identity. Registering the same
//! [`Watcher`] twice yields two entries; unregistering it removes both.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

/// A callback invoked with a copy of a shared object's value.
pub type Watcher = Arc<dyn Fn(Value) + Send + Sync>;

/// Wrap a closure as a [`Watcher`].
///
/// Keep the returned `Arc` around if you intend to
/// [`unwatch`](crate::StateController::unwatch) it later: each call to this
/// function produces a distinct identity.
pub fn watcher(callback: impl Fn(Value) + Send + Sync + 'static) -> Watcher {
    Arc::new(callback)
}

/// Identifier of one incarnation of a name's trigger list.
///
/// A list is created on first registration and destroyed by `delete`; the
/// next registration creates a new list with a new generation.
pub(crate) type Generation = u64;

enum Registration {
    /// Persistent watcher, called on every dispatch until unwatched.
    Watch(Watcher),
    /// Pending `load`, dropped from the live list the first time it is
    /// dispatched or once its receiver is gone.
    Once(oneshot::Sender<Value>),
}

impl Registration {
    fn is_closed(&self) -> bool {
        matches!(self, Registration::Once(tx) if tx.is_closed())
    }
}

/// Turn a pending `load` sender into a callable watcher.
fn once_callback(tx: oneshot::Sender<Value>) -> Watcher {
    let tx = Mutex::new(Some(tx));
    watcher(move |value| {
        if let Some(tx) = tx.lock().take() {
            // The receiver may have been dropped since the snapshot.
            let _ = tx.send(value);
        }
    })
}

struct TriggerList {
    generation: Generation,
    entries: Vec<Registration>,
}

/// Mapping from shared object name to its ordered registrations.
#[derive(Default)]
pub(crate) struct TriggerRegistry {
    lists: HashMap<String, TriggerList>,
    next_generation: Generation,
}

impl fmt::Debug for TriggerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, list) in &self.lists {
            map.entry(name, &list.entries.len());
        }
        map.finish()
    }
}

impl TriggerRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append a persistent registration. Returns the list's generation.
    pub(crate) fn register(&mut self, name: &str, callback: Watcher) -> Generation {
        self.push(name, Registration::Watch(callback))
    }

    /// Append a registration that resolves `tx` on its first dispatch.
    pub(crate) fn register_once(&mut self, name: &str, tx: oneshot::Sender<Value>) -> Generation {
        self.push(name, Registration::Once(tx))
    }

    fn push(&mut self, name: &str, registration: Registration) -> Generation {
        let next_generation = &mut self.next_generation;
        let list = self.lists.entry(name.to_string()).or_insert_with(|| {
            *next_generation += 1;
            TriggerList {
                generation: *next_generation,
                entries: Vec::new(),
            }
        });
        // Abandoned loads would otherwise pile up on names that never get created.
        list.entries.retain(|r| !r.is_closed());
        list.entries.push(registration);
        list.generation
    }

    /// Remove every registration of `callback` for `name`.
    ///
    /// When `generation` is given, nothing is removed unless the current list
    /// is that generation. Returns the number of registrations removed.
    pub(crate) fn unregister(
        &mut self,
        name: &str,
        callback: &Watcher,
        generation: Option<Generation>,
    ) -> usize {
        let Some(list) = self.lists.get_mut(name) else {
            return 0;
        };
        if generation.is_some_and(|g| g != list.generation) {
            return 0;
        }
        let before = list.entries.len();
        list.entries
            .retain(|r| !matches!(r, Registration::Watch(cb) if Arc::ptr_eq(cb, callback)));
        before - list.entries.len()
    }

    /// Stable snapshot of the callbacks for `name`, in registration order.
    ///
    /// One-shot registrations are removed from the live list as part of
    /// taking the snapshot; closed ones are dropped without a callback.
    pub(crate) fn snapshot(&mut self, name: &str) -> Vec<Watcher> {
        let Some(list) = self.lists.get_mut(name) else {
            return Vec::new();
        };
        let entries = std::mem::take(&mut list.entries);
        let mut callbacks = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry {
                Registration::Watch(cb) => {
                    callbacks.push(cb.clone());
                    list.entries.push(Registration::Watch(cb));
                }
                Registration::Once(tx) if !tx.is_closed() => callbacks.push(once_callback(tx)),
                Registration::Once(_) => {}
            }
        }
        callbacks
    }

    /// Drop the whole list for `name`. Returns `true` if one existed.
    pub(crate) fn remove(&mut self, name: &str) -> bool {
        self.lists.remove(name).is_some()
    }

    /// Number of live registrations for `name`, not counting abandoned loads.
    pub(crate) fn count(&self, name: &str) -> usize {
        self.lists
            .get(name)
            .map_or(0, |l| l.entries.iter().filter(|r| !r.is_closed()).count())
    }
}
