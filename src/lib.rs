//! # shared-state
//!
//! An in-process registry of named shared objects.
//!
//! Producers [`create`](StateController::create) and
//! [`publish`](StateController::publish) JSON-like documents under a name.
//! Consumers either [`load`](StateController::load) a name (waiting until it
//! first exists) or [`watch`](StateController::watch) it (a callback for the
//! current value and every later change). Producers and consumers only share
//! the controller, never references to each other.
//!
//! Every value is copied in and copied out: nothing handed to or received
//! from the controller is aliased with its stored state. Handles that cannot
//! be copied (connection pools, clients) go through
//! [`StateController::refs`] instead.

pub mod config;
pub mod controller;
pub mod error;
pub mod refs;

pub use config::{ControllerConfig, EqualityMode};
pub use controller::{watcher, StateController, Unwatch, Watcher};
pub use error::{Result, StateError};
pub use refs::SharedRefs;

/// Documents stored in the controller.
pub use serde_json::Value;
