// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connector configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bridge::DEFAULT_WINDOW_SECS;
use crate::error::ConfigError;
use crate::logger::LogLevel;

/// Configuration for a [`Connector`](crate::Connector).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use enebular_connector::config::ConnectorConfig;
/// use enebular_connector::logger::LogLevel;
///
/// let config = ConnectorConfig::default()
///     .with_coalescing_window(Duration::from_secs(5))
///     .with_log_level(LogLevel::Debug);
/// assert_eq!(config.coalescing_window_secs, 5);
///
/// let loaded = ConnectorConfig::from_json(r#"{"log_level": "error"}"#).unwrap();
/// assert_eq!(loaded.coalescing_window_secs, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Maximum gap, in seconds, between updates of one group's members.
    pub coalescing_window_secs: u64,
    /// Minimum level forwarded by the default logger.
    pub log_level: LogLevel,
    /// Overrides the endpoint name reported by the cloud client.
    pub endpoint_name: Option<String>,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            coalescing_window_secs: DEFAULT_WINDOW_SECS,
            log_level: LogLevel::default(),
            endpoint_name: None,
        }
    }
}

impl ConnectorConfig {
    /// Parses a configuration from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is malformed or a value is out of range.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns error if the coalescing window is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.coalescing_window_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "coalescing_window_secs".to_string(),
                message: "must be at least one second".to_string(),
            });
        }
        Ok(())
    }

    /// Returns the coalescing window.
    #[must_use]
    pub fn coalescing_window(&self) -> Duration {
        Duration::from_secs(self.coalescing_window_secs)
    }

    /// Sets the coalescing window (whole seconds).
    #[must_use]
    pub fn with_coalescing_window(mut self, window: Duration) -> Self {
        self.coalescing_window_secs = window.as_secs();
        self
    }

    /// Sets the minimum log level.
    #[must_use]
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Sets the endpoint name override.
    #[must_use]
    pub fn with_endpoint_name(mut self, name: impl Into<String>) -> Self {
        self.endpoint_name = Some(name.into());
        self
    }
}
