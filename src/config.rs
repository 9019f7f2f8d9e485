//! Engine configuration
//!
//! Everything here has a default; a caller only sets the knobs it cares about.
//! Configurations round-trip through JSON so a study protocol can pin them.

use crate::error::TrialError;
use serde::{Deserialize, Serialize};

/// Default token count above which an alignment logs a warning
pub const DEFAULT_MAX_TOKENS_WARNING: usize = 2000;

/// Tunables for capture, editing and session orchestration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Drop key-downs for a key that is already held (OS auto-repeat)
    pub suppress_auto_repeat: bool,
    /// Treat `Enter` as inserting a newline into the typed buffer
    pub enter_inserts_newline: bool,
    /// Treat `Tab` as inserting a tab into the typed buffer
    pub tab_inserts_tab: bool,
    /// Start a fresh trial right after every terminal transition
    pub auto_rearm: bool,
    /// Passages longer than this (in tokens) log a warning before alignment
    pub max_tokens_warning: usize,
    /// Key symbols counted as corrective keystrokes.
    ///
    /// Metrics only: buffer edits always come from `Backspace`/`Delete`.
    pub corrective_keys: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            suppress_auto_repeat: true,
            enter_inserts_newline: false,
            tab_inserts_tab: false,
            auto_rearm: false,
            max_tokens_warning: DEFAULT_MAX_TOKENS_WARNING,
            corrective_keys: vec!["Backspace".to_string(), "Delete".to_string()],
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auto_repeat_suppression(mut self, suppress: bool) -> Self {
        self.suppress_auto_repeat = suppress;
        self
    }

    pub fn with_auto_rearm(mut self, auto_rearm: bool) -> Self {
        self.auto_rearm = auto_rearm;
        self
    }

    pub fn with_enter_newline(mut self, enabled: bool) -> Self {
        self.enter_inserts_newline = enabled;
        self
    }

    pub fn with_tab(mut self, enabled: bool) -> Self {
        self.tab_inserts_tab = enabled;
        self
    }

    pub fn with_max_tokens_warning(mut self, tokens: usize) -> Self {
        self.max_tokens_warning = tokens;
        self
    }

    /// Whether `key` counts as a corrective keystroke
    pub fn is_corrective(&self, key: &str) -> bool {
        self.corrective_keys.iter().any(|k| k == key)
    }

    /// Check invariants that serde defaults cannot express
    pub fn validate(&self) -> Result<(), TrialError> {
        if self.max_tokens_warning == 0 {
            return Err(TrialError::InvalidConfig(
                "max_tokens_warning must be greater than zero".to_string(),
            ));
        }
        if self.corrective_keys.iter().any(|k| k.trim().is_empty()) {
            return Err(TrialError::InvalidConfig(
                "corrective_keys must not contain empty key names".to_string(),
            ));
        }
        Ok(())
    }

    /// Load and validate a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, TrialError> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| TrialError::ParseError(format!("Failed to parse engine config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, TrialError> {
        serde_json::to_string_pretty(self).map_err(TrialError::JsonError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.suppress_auto_repeat);
        assert!(!config.auto_rearm);
        assert!(config.is_corrective("Backspace"));
        assert!(config.is_corrective("Delete"));
        assert!(!config.is_corrective("a"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json(r#"{ "auto_rearm": true }"#).unwrap();
        assert!(config.auto_rearm);
        assert!(config.suppress_auto_repeat);
        assert_eq!(config.max_tokens_warning, DEFAULT_MAX_TOKENS_WARNING);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = EngineConfig::new()
            .with_auto_rearm(true)
            .with_enter_newline(true)
            .with_max_tokens_warning(10);
        let json = config.to_json().unwrap();
        let restored = EngineConfig::from_json(&json).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = EngineConfig::from_json(r#"{ "max_tokens_warning": 0 }"#);
        assert!(matches!(result, Err(TrialError::InvalidConfig(_))));

        let result = EngineConfig::from_json(r#"{ "corrective_keys": ["Backspace", " "] }"#);
        assert!(matches!(result, Err(TrialError::InvalidConfig(_))));

        let result = EngineConfig::from_json("not json");
        assert!(matches!(result, Err(TrialError::ParseError(_))));
    }
}
