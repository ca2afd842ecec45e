//! Configuration I/O (YAML loading)
//!
//! ```yaml
//! version: 1
//! registry:
//!   include_experimental: false
//!   disabled: [vfree]
//! evaluator:
//!   realloc_failure_keeps_old: true
//! scenario:
//!   max_paths: 256
//! ```

use super::error::{ConfigError, ConfigResult};
use super::model_config::{EvaluatorConfig, ModelConfig, RegistryConfig, ScenarioConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const SUPPORTED_VERSIONS: &[u32] = &[1];

/// YAML Schema v1
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileV1 {
    /// Schema version (always 1 for v1); optional only so a missing field
    /// gets a better error than serde's
    #[serde(default)]
    pub version: Option<u32>,

    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub evaluator: EvaluatorConfig,

    #[serde(default)]
    pub scenario: ScenarioConfig,
}

impl ModelConfig {
    /// Load and validate a YAML config file
    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        tracing::debug!("loading model config from {}", path.display());
        Self::from_yaml_str(&content)
    }

    /// Parse and validate YAML text
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let file: ConfigFileV1 = serde_yaml::from_str(content)?;

        match file.version {
            None => return Err(ConfigError::MissingVersion),
            Some(v) if !SUPPORTED_VERSIONS.contains(&v) => {
                return Err(ConfigError::UnsupportedVersion {
                    found: v,
                    supported: SUPPORTED_VERSIONS.to_vec(),
                })
            }
            Some(_) => {}
        }

        let config = ModelConfig {
            registry: file.registry,
            evaluator: file.evaluator,
            scenario: file.scenario,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        let file = ConfigFileV1 {
            version: Some(1),
            registry: self.registry.clone(),
            evaluator: self.evaluator.clone(),
            scenario: self.scenario.clone(),
        };
        Ok(serde_yaml::to_string(&file)?)
    }
}
