//! Error types for the state controller.

use thiserror::Error;

/// Errors raised by [`StateController`](crate::StateController) operations.
#[derive(Debug, Error)]
pub enum StateError {
    /// The shared object has not been created (or was deleted).
    #[error("SharedObject {name} must exist prior to publishing update")]
    ObjectNotFound { name: String },

    /// A typed value could not be converted to or from a document.
    #[error("Shared object serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StateError {
    /// Build an `ObjectNotFound` error for `name`.
    pub(crate) fn not_found(name: impl Into<String>) -> Self {
        Self::ObjectNotFound { name: name.into() }
    }

    /// Whether this is an `ObjectNotFound` error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ObjectNotFound { .. })
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StateError>;
