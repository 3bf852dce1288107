// crates/cairn-registry/src/config.rs
//
// Runtime configuration for a registry instance.
// Loaded from a TOML file or populated with defaults.

use serde::Deserialize;
use std::fs;

use cairn_consensus::MIN_VALIDATORS;
use cairn_core::{CairnError, MAX_DELEGATES};

/// Registry configuration.
///
/// Limits may only be tightened relative to the built-in bounds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegistryConfig {
    /// Delegate set bound per agent (at most 10).
    #[serde(default = "default_max_delegates")]
    pub max_delegates: usize,

    /// Distinct validators required to resolve a request (at least 3).
    #[serde(default = "default_validation_quorum")]
    pub validation_quorum: usize,

    /// Also log every published event through tracing.
    #[serde(default = "default_log_events")]
    pub log_events: bool,
}

fn default_max_delegates() -> usize {
    MAX_DELEGATES
}

fn default_validation_quorum() -> usize {
    MIN_VALIDATORS
}

fn default_log_events() -> bool {
    true
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_delegates: default_max_delegates(),
            validation_quorum: default_validation_quorum(),
            log_events: default_log_events(),
        }
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Invalid(#[from] CairnError),
}

impl RegistryConfig {
    /// Load and validate configuration from a TOML file at the given path.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: RegistryConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject limits looser than the built-in bounds.
    pub fn validate(&self) -> Result<(), CairnError> {
        if self.max_delegates == 0 || self.max_delegates > MAX_DELEGATES {
            return Err(CairnError::InvalidInput(format!(
                "max_delegates must be in 1..={}, got {}",
                MAX_DELEGATES, self.max_delegates
            )));
        }
        if self.validation_quorum < MIN_VALIDATORS {
            return Err(CairnError::InvalidInput(format!(
                "validation_quorum must be at least {}, got {}",
                MIN_VALIDATORS, self.validation_quorum
            )));
        }
        Ok(())
    }
}
