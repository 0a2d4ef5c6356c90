//! Controller configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How `publish` decides that a new value is unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EqualityMode {
    /// Compare the compact JSON text of both documents. Object key order
    /// is significant: `{"a":1,"b":2}` differs from `{"b":2,"a":1}`.
    #[default]
    Serialized,
    /// Compare documents structurally. Object key order is ignored.
    Structural,
}

/// Configuration for a [`StateController`](crate::StateController).
///
/// # Attributes
///
/// * `equality` - Policy used to detect no-op publishes.
/// * `trace_dispatch` - Log every individual watcher invocation at trace level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// No-op detection policy for `publish`.
    pub equality: EqualityMode,
    /// Emit one trace line per watcher invocation.
    pub trace_dispatch: bool,
}

impl ControllerConfig {
    /// Create a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from a JSON document. Missing fields take defaults.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Set the equality policy (builder pattern).
    pub fn with_equality(mut self, equality: EqualityMode) -> Self {
        self.equality = equality;
        self
    }

    /// Enable or disable per-watcher trace logging (builder pattern).
    pub fn with_trace_dispatch(mut self, trace_dispatch: bool) -> Self {
        self.trace_dispatch = trace_dispatch;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ControllerConfig::new();
        assert_eq!(config.equality, EqualityMode::Serialized);
        assert!(!config.trace_dispatch);
    }

    #[test]
    fn test_config_from_json_partial() {
        let config = ControllerConfig::from_json(r#"{"equality": "structural"}"#).unwrap();
        assert_eq!(config.equality, EqualityMode::Structural);
        assert!(!config.trace_dispatch);
    }

    #[test]
    fn test_config_from_json_rejects_unknown_mode() {
        let err = ControllerConfig::from_json(r#"{"equality": "fuzzy"}"#).unwrap_err();
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_config_builders() {
        let config = ControllerConfig::new()
            .with_equality(EqualityMode::Structural)
            .with_trace_dispatch(true);
        assert_eq!(config.equality, EqualityMode::Structural);
        assert!(config.trace_dispatch);
    }
}
