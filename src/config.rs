//! Plugin and scheduler configuration.
//!
//! The plugin is configured through a category document whose items carry
//! their value under a `value` member:
//!
//! ```json
//! {
//!     "enable": {"value": "true"},
//!     "exchanged_data": {"value": {"exchanged_data": {"datapoints": []}}}
//! }
//! ```
//!
//! Items other than `enable` and `exchanged_data` are ignored. An absent
//! item leaves the matching state of the notifier untouched.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::error::ConfigError;

/// Parsed plugin category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginConfig {
    /// New value of the enable switch, if the category carries one.
    pub enable: Option<bool>,
    /// Exchanged data document as JSON text, if the category carries one.
    pub exchanged_data: Option<String>,
}

#[derive(Deserialize)]
struct Category {
    enable: Option<Item>,
    exchanged_data: Option<Item>,
}

#[derive(Deserialize)]
struct Item {
    value: Value,
}

impl PluginConfig {
    /// Parses a category document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and
    /// [`ConfigError::InvalidCategory`] when an item has the wrong shape.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let document: Value = serde_json::from_str(raw).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        if !document.is_object() {
            return Err(ConfigError::InvalidCategory {
                reason: "category must be an object".to_string(),
            });
        }

        let category: Category = serde_json::from_value(document).map_err(|e| ConfigError::InvalidCategory {
            reason: e.to_string(),
        })?;

        let enable = category.enable.map(|item| enable_value(&item.value)).transpose()?;
        let exchanged_data = category
            .exchanged_data
            .map(|item| exchanged_data_value(item.value))
            .transpose()?;

        Ok(Self { enable, exchanged_data })
    }

    /// Reads and parses a category document from disk.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read, otherwise
    /// the errors of [`PluginConfig::from_json`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&raw)
    }

    /// A config that only sets the enable switch.
    #[must_use]
    pub fn enabled(enable: bool) -> Self {
        Self {
            enable: Some(enable),
            exchanged_data: None,
        }
    }

    /// Adds an exchanged data document.
    #[must_use]
    pub fn with_exchanged_data(mut self, exchanged_data: impl Into<String>) -> Self {
        self.exchanged_data = Some(exchanged_data.into());
        self
    }
}

fn enable_value(value: &Value) -> Result<bool, ConfigError> {
    match value {
        Value::Bool(enabled) => Ok(*enabled),
        Value::String(text) => Ok(text == "true" || text == "True"),
        other => Err(ConfigError::InvalidCategory {
            reason: format!("'enable' value must be a string or a boolean, got {other}"),
        }),
    }
}

fn exchanged_data_value(value: Value) -> Result<String, ConfigError> {
    match value {
        Value::String(text) => Ok(text),
        Value::Object(_) => Ok(value.to_string()),
        other => Err(ConfigError::InvalidCategory {
            reason: format!("'exchanged_data' value must be an object or a JSON string, got {other}"),
        }),
    }
}

/// Timing of the periodic emission tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Upper bound of one task sleep, and so of the stop latency.
    pub max_sleep: Duration,
    /// Poll interval of a task while the enable switch is off.
    pub disabled_poll: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_sleep: Duration::from_millis(1000),
            disabled_poll: Duration::from_millis(100),
        }
    }
}
