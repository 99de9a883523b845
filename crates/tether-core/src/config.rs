//! Lifecycle configuration
//!
//! Attribute names that mark behaviour declarations and the number of frames
//! discovery waits before reading them.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Prefix for environment overrides (`TETHER_FRAME_DEFERRAL`, ...)
pub const ENV_PREFIX: &str = "TETHER_";

/// Upper bound on chained frames before discovery runs
pub const MAX_FRAME_DEFERRAL: u8 = 8;

/// Frames discovery waits for unless configured otherwise
pub const DEFAULT_FRAME_DEFERRAL: u8 = 2;

/// Manager configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Attribute names read from declaring elements
    pub attributes: AttributeNames,

    /// Number of chained frames discovery waits for.
    ///
    /// Two frames let the caller finish mutating the subtree and let layout
    /// settle before attributes are read. Zero runs discovery inline.
    pub frame_deferral: u8,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            attributes: AttributeNames::default(),
            frame_deferral: DEFAULT_FRAME_DEFERRAL,
        }
    }
}

/// Declarative attribute names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeNames {
    /// Behaviour name attribute (required on declaring elements)
    pub behaviour: String,

    /// Media-query attribute (optional)
    pub query: String,

    /// Keep-alive attribute (optional, presence is enough)
    pub keep_alive: String,
}

impl Default for AttributeNames {
    fn default() -> Self {
        Self {
            behaviour: "data-behaviour".to_string(),
            query: "data-query".to_string(),
            keep_alive: "data-keep-alive".to_string(),
        }
    }
}

impl LifecycleConfig {
    /// Parse a configuration from TOML text and validate it
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply `TETHER_*` overrides from the process environment
    pub fn merge_with_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(std::env::vars())
    }

    /// Apply `TETHER_*` overrides from an explicit variable list.
    ///
    /// Unknown `TETHER_*` keys are ignored.
    pub fn apply_overrides<I, K, V>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let Some(key) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.into();
            match key {
                "FRAME_DEFERRAL" => {
                    self.frame_deferral = value.trim().parse().map_err(|_| {
                        ConfigError::invalid(format!(
                            "{ENV_PREFIX}FRAME_DEFERRAL must be a small integer, got '{value}'"
                        ))
                    })?;
                }
                "BEHAVIOUR_ATTRIBUTE" => self.attributes.behaviour = value,
                "QUERY_ATTRIBUTE" => self.attributes.query = value,
                "KEEP_ALIVE_ATTRIBUTE" => self.attributes.keep_alive = value,
                _ => {}
            }
        }
        self.validate()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_deferral > MAX_FRAME_DEFERRAL {
            return Err(ConfigError::invalid(format!(
                "frame_deferral must be at most {MAX_FRAME_DEFERRAL}, got {}",
                self.frame_deferral
            )));
        }

        let names = [
            ("behaviour", &self.attributes.behaviour),
            ("query", &self.attributes.query),
            ("keep_alive", &self.attributes.keep_alive),
        ];
        for (field, name) in names {
            if name.trim().is_empty() {
                return Err(ConfigError::invalid(format!(
                    "attributes.{field} must not be empty"
                )));
            }
        }
        for (i, (left_field, left)) in names.iter().enumerate() {
            for (right_field, right) in &names[i + 1..] {
                if left == right {
                    return Err(ConfigError::invalid(format!(
                        "attributes.{left_field} and attributes.{right_field} both use '{left}'"
                    )));
                }
            }
        }
        Ok(())
    }
}
