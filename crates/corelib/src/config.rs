//! Serializable locator configuration.

use serde::{Deserialize, Serialize};

use crate::configuration::{validate_repetitions, DefaultKetamaConfiguration, DEFAULT_REPETITIONS};
use crate::error::{Error, Result};
use crate::hash::HashAlgorithm;

/// Default upper bound on members (master plus slaves) of a replica group.
pub const DEFAULT_MAX_GROUP_SIZE: usize = 4;

/// Locator settings, typically loaded from JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocatorConfig {
    /// Virtual nodes per node or group.
    pub repetitions: usize,
    /// Key hash algorithm.
    pub hash: HashAlgorithm,
    /// Maximum members in one replica group.
    pub max_group_size: usize,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            repetitions: DEFAULT_REPETITIONS,
            hash: HashAlgorithm::Ketama,
            max_group_size: DEFAULT_MAX_GROUP_SIZE,
        }
    }
}

impl LocatorConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: LocatorConfig = serde_json::from_str(json)
            .map_err(|e| Error::InvalidArgument(format!("locator config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_repetitions(self.repetitions)?;
        if self.max_group_size < 2 {
            return Err(Error::InvalidArgument(format!(
                "max_group_size must be at least 2, got {}",
                self.max_group_size
            )));
        }
        Ok(())
    }

    /// Ring construction strategy for these settings.
    pub fn ketama_configuration(&self) -> Result<DefaultKetamaConfiguration> {
        DefaultKetamaConfiguration::new(self.repetitions)
    }
}
