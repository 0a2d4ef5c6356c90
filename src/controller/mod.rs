//! State controller — named shared objects with load/watch/publish.
//!
//! The controller owns a repository of current values and a trigger
//! registry of watchers, both behind a single lock.
//! Producers `create` and `publish`; consumers `load` (wait for the first
//! value) or `watch` (every value from now on).
//!
//! # Copy isolation
//!
//! Values are copied on the way in and on the way out. Mutating a value you
//! passed to `publish`, or one you received from `load` or a watcher, never
//! affects the controller or any other consumer.
//!
//! # Dispatch
//!
//! `create` and `publish` invoke watchers synchronously on the calling
//! thread, in registration order, after the state lock is released. Each
//! watcher gets a fresh copy of the value current at its own invocation, and
//! a dispatch stops as soon as the name is deleted. Watchers may call back
//! into the controller on the same thread. Dispatches (and the initial call
//! made by `watch`) are serialized across threads, so a slow watcher stalls
//! every producer, and a watcher must not block on another thread that uses
//! the same controller.
//!
//! # Pending loads
//!
//! A `load` on a name that is never created, or that is deleted before it
//! is created, never resolves. No timeout is applied; wrap the future in
//! `tokio::time::timeout` if you need a deadline.

mod repository;
mod triggers;

use std::future::Future;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::config::ControllerConfig;
use crate::error::{Result, StateError};
use crate::refs::SharedRefs;

use repository::Repository;
use triggers::{Generation, TriggerRegistry};

pub use triggers::{watcher, Watcher};

/// Repository and trigger registry, guarded together by one lock.
#[derive(Debug, Default)]
struct State {
    repo: Repository,
    triggers: TriggerRegistry,
}

/// Outcome of the existence check made when `load` is called.
enum Pending {
    Ready(Value),
    Waiting(oneshot::Receiver<Value>),
}

struct Inner {
    state: Mutex<State>,
    /// Held while watchers run. Always taken before `state`, never while
    /// holding it.
    dispatch: ReentrantMutex<()>,
    config: ControllerConfig,
    refs: SharedRefs,
}

/// Registry of named shared objects.
///
/// Cloning is cheap; clones share the same objects, watchers and refs.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use shared_state::{watcher, StateController};
///
/// let controller = StateController::new();
/// controller.create("session", json!({"count": 0}));
///
/// let cb = watcher(|value| println!("session is now {value}"));
/// let handle = controller.watch("session", cb);
///
/// controller.publish("session", json!({"count": 1})).unwrap();
/// handle.unwatch();
///
/// let value = futures::executor::block_on(controller.load("session"));
/// assert_eq!(value, json!({"count": 1}));
/// ```
#[derive(Clone)]
pub struct StateController {
    inner: Arc<Inner>,
}

impl Default for StateController {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StateController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateController")
            .field("config", &self.inner.config)
            .field("state", &*self.inner.state.lock())
            .field("refs", &self.inner.refs)
            .finish()
    }
}

impl StateController {
    /// Create a controller with default configuration.
    pub fn new() -> Self {
        Self::with_config(ControllerConfig::default())
    }

    /// Create a controller with the given configuration.
    pub fn with_config(config: ControllerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                dispatch: ReentrantMutex::new(()),
                config,
                refs: SharedRefs::new(),
            }),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    /// Directly-shared handles. Not copy-isolated and never triggers watchers.
    pub fn refs(&self) -> &SharedRefs {
        &self.inner.refs
    }

    // -----------------------------------------------------------------------
    // Producers
    // -----------------------------------------------------------------------

    /// Create the shared object `name` with `default` as its initial value.
    ///
    /// If `name` already exists its value is left untouched and `default` is
    /// discarded. Watchers of `name` are triggered in both cases.
    pub fn create(&self, name: &str, default: Value) {
        let callbacks = {
            let mut state = self.inner.state.lock();
            if state.repo.insert_if_absent(name, default) {
                log::debug!("[StateController] Created shared object '{name}'");
            } else {
                log::debug!("[StateController] Shared object '{name}' already exists, keeping value");
            }
            state.triggers.snapshot(name)
        };
        self.fire(name, callbacks);
    }

    /// [`create`](Self::create) with an empty object as the default.
    pub fn create_empty(&self, name: &str) {
        self.create(name, Value::Object(serde_json::Map::new()));
    }

    /// [`create`](Self::create) from any serializable value.
    pub fn create_as<T: Serialize>(&self, name: &str, default: &T) -> Result<()> {
        let default = serde_json::to_value(default)?;
        self.create(name, default);
        Ok(())
    }

    /// Publish a new value for an existing shared object.
    ///
    /// Returns [`StateError::ObjectNotFound`] if `name` was never created or
    /// has been deleted. Publishing a value equal to the stored one (per the
    /// configured [`EqualityMode`](crate::EqualityMode)) does nothing.
    pub fn publish(&self, name: &str, value: Value) -> Result<()> {
        let callbacks = {
            let mut state = self.inner.state.lock();
            if !state.repo.contains(name) {
                log::warn!("[StateController] Publish to unknown shared object '{name}'");
                return Err(StateError::not_found(name));
            }
            if state.repo.is_unchanged(name, &value, self.inner.config.equality) {
                log::debug!("[StateController] Publish to '{name}' unchanged, not triggering");
                return Ok(());
            }
            state.repo.set(name, value);
            log::debug!("[StateController] Published shared object '{name}'");
            state.triggers.snapshot(name)
        };
        self.fire(name, callbacks);
        Ok(())
    }

    /// [`publish`](Self::publish) from any serializable value.
    pub fn publish_as<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.publish(name, value)
    }

    /// Remove the shared object and all of its watchers.
    ///
    /// No watcher is triggered. Pending loads on `name` stay pending, and
    /// [`Unwatch`] handles issued for `name` become no-ops.
    pub fn delete(&self, name: &str) {
        let mut state = self.inner.state.lock();
        let had_value = state.repo.remove(name);
        let had_triggers = state.triggers.remove(name);
        log::debug!(
            "[StateController] Deleted '{name}' (value: {had_value}, triggers: {had_triggers})"
        );
    }

    // -----------------------------------------------------------------------
    // Consumers
    // -----------------------------------------------------------------------

    /// Wait for the value of `name`.
    ///
    /// Resolves immediately if `name` exists when `load` is called. Otherwise
    /// resolves with the value of the first `create` or `publish` of `name`.
    /// The registration happens when `load` is called, not when the future
    /// is first polled.
    ///
    /// The future never resolves if `name` is never created, or if it is
    /// deleted before being created.
    pub fn load(&self, name: &str) -> impl Future<Output = Value> + Send + 'static {
        let pending = {
            let mut state = self.inner.state.lock();
            match state.repo.get(name) {
                Some(value) => Pending::Ready(value),
                None => {
                    let (tx, rx) = oneshot::channel();
                    state.triggers.register_once(name, tx);
                    log::debug!("[StateController] Load of '{name}' waiting for creation");
                    Pending::Waiting(rx)
                }
            }
        };

        async move {
            match pending {
                Pending::Ready(value) => value,
                Pending::Waiting(rx) => match rx.await {
                    Ok(value) => value,
                    // Registration dropped by `delete`.
                    Err(_) => std::future::pending().await,
                },
            }
        }
    }

    /// [`load`](Self::load) and deserialize into `T`.
    pub fn load_as<T: DeserializeOwned>(&self, name: &str) -> impl Future<Output = Result<T>> {
        let load = self.load(name);
        async move { Ok(serde_json::from_value(load.await)?) }
    }

    /// Watch `name`, invoking `callback` on every create and publish.
    ///
    /// If `name` already exists, `callback` is invoked once with the current
    /// value before this returns. History before the call is not replayed.
    /// A dispatch running on another thread finishes before that first call,
    /// so it can never overwrite a newer value with an older one.
    pub fn watch(&self, name: &str, callback: Watcher) -> Unwatch {
        let _dispatch = self.inner.dispatch.lock();
        let (generation, current) = {
            let mut state = self.inner.state.lock();
            let generation = state.triggers.register(name, callback.clone());
            (generation, state.repo.get(name))
        };
        if let Some(value) = current {
            callback(value);
        }
        Unwatch {
            controller: Arc::downgrade(&self.inner),
            name: name.to_string(),
            callback,
            generation,
        }
    }

    /// Remove every registration of `callback` for `name`.
    ///
    /// Callbacks are matched by `Arc` identity.
    pub fn unwatch(&self, name: &str, callback: &Watcher) {
        let removed = self.inner.state.lock().triggers.unregister(name, callback, None);
        log::debug!("[StateController] Unwatched '{name}' ({removed} registrations removed)");
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// Copy of the current value of `name`, without waiting.
    pub fn snapshot(&self, name: &str) -> Option<Value> {
        self.inner.state.lock().repo.get(name)
    }

    /// [`snapshot`](Self::snapshot) deserialized into `T`.
    pub fn snapshot_as<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.snapshot(name) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.state.lock().repo.contains(name)
    }

    /// Names of all existing shared objects, sorted.
    pub fn names(&self) -> Vec<String> {
        self.inner.state.lock().repo.names()
    }

    /// Live registrations for `name`, including pending loads.
    pub fn watcher_count(&self, name: &str) -> usize {
        self.inner.state.lock().triggers.count(name)
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Invoke the snapshotted watchers. Must be called without the state
    /// lock held.
    ///
    /// The value is re-read before every callback so that a watcher which
    /// publishes cannot leave later watchers with a stale value. Stops when
    /// the name has been deleted.
    fn fire(&self, name: &str, callbacks: Vec<Watcher>) {
        let _dispatch = self.inner.dispatch.lock();
        log::debug!(
            "[StateController] Triggering {} watcher(s) for '{name}'",
            callbacks.len()
        );
        for (index, callback) in callbacks.iter().enumerate() {
            let Some(value) = self.snapshot(name) else {
                log::debug!("[StateController] '{name}' deleted during dispatch, stopping");
                return;
            };
            if self.inner.config.trace_dispatch {
                log::trace!("[StateController] '{name}' -> watcher #{index}");
            }
            callback(value);
        }
    }
}

/// Handle returned by [`StateController::watch`].
///
/// Dropping the handle does not unwatch; call [`Unwatch::unwatch`].
pub struct Unwatch {
    controller: Weak<Inner>,
    name: String,
    callback: Watcher,
    generation: Generation,
}

impl Unwatch {
    /// Remove the watch this handle was issued for.
    ///
    /// Removes every registration of the same callback on the same trigger
    /// list. A no-op if the name was deleted since, or the controller is gone.
    pub fn unwatch(self) {
        let Some(inner) = self.controller.upgrade() else {
            return;
        };
        let removed = inner
            .state
            .lock()
            .triggers
            .unregister(&self.name, &self.callback, Some(self.generation));
        log::debug!(
            "[StateController] Unwatched '{}' via handle ({removed} registrations removed)",
            self.name
        );
    }

    /// Name this handle watches.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for Unwatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unwatch")
            .field("name", &self.name)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
