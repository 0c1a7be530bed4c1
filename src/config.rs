//! Engine configuration, persisted as TOML.
//!
//! ```toml
//! max_nodes = 5000
//! default_edge_weight = 0.5
//! data_dir = "/var/lib/intel-graph"
//!
//! [confidence_policy]
//! policy = "modified_aware"
//! with_modified = 0.8
//! without_modified = 0.5
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::graph::builder::BuildConfig;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(flatten)]
    pub build: BuildConfig,
    /// Layout cache directory. `None` keeps layout state in memory only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl EngineConfig {
    /// Parse and validate TOML text. `origin` names the source in errors.
    pub fn from_toml(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content, &path.display().to_string())
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.is_file() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.build.max_nodes == 0 {
            return Err(ConfigError::Invalid {
                message: "max_nodes must be greater than zero".into(),
            });
        }
        if !self.build.confidence_policy.is_valid() {
            return Err(ConfigError::Invalid {
                message: format!(
                    "confidence policy values must lie in [0, 1]: {:?}",
                    self.build.confidence_policy
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.build.default_edge_weight) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "default_edge_weight must lie in [0, 1], got {}",
                    self.build.default_edge_weight
                ),
            });
        }
        Ok(())
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }
}
