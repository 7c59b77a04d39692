use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::id::DEFAULT_ID_LENGTH;

/// Tunables shared by every collection built from one configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetsSettings {
    /// Length of generated preset ids, in base-36 characters.
    #[serde(default = "default_id_length")]
    pub id_length: usize,
    /// Emit an [`OperationTrace`](crate::trace::OperationTrace) for every
    /// public operation.
    #[serde(default)]
    pub trace_operations: bool,
}

impl Default for PresetsSettings {
    fn default() -> Self {
        Self {
            id_length: default_id_length(),
            trace_operations: false,
        }
    }
}

const fn default_id_length() -> usize {
    DEFAULT_ID_LENGTH
}

impl PresetsSettings {
    /// Parse settings from TOML text. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for these settings.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content).context("Failed to parse presets settings")
    }

    /// Defaults, with tracing switched on by the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides read through `lookup`.
    #[must_use]
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if crate::trace::trace_enabled_from(&lookup) {
            self.trace_operations = true;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let settings = PresetsSettings::from_toml_str("").unwrap();
        assert_eq!(settings, PresetsSettings::default());
    }

    #[test]
    fn toml_overrides_fields() {
        let settings =
            PresetsSettings::from_toml_str("id_length = 6\ntrace_operations = true\n").unwrap();
        assert_eq!(settings.id_length, 6);
        assert!(settings.trace_operations);
    }

    #[test]
    fn invalid_toml_is_reported() {
        let err = PresetsSettings::from_toml_str("id_length = \"six\"").unwrap_err();
        assert!(err.to_string().contains("presets settings"));
    }

    #[test]
    fn env_lookup_enables_tracing() {
        let settings = PresetsSettings::default().with_env(|key| {
            (key == "PRESETS_TRACE").then(|| "yes".to_string())
        });
        assert!(settings.trace_operations);

        let untouched = PresetsSettings::default().with_env(|_| None);
        assert!(!untouched.trace_operations);
    }
}
