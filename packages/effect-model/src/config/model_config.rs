//! Model configuration
//!
//! One struct per concern, each with `validate()` and fluent setters:
//!
//! ```rust,ignore
//! let config = ModelConfig::default()
//!     .registry(|c| c.include_experimental(true).disable("vfree"))
//!     .evaluator(|c| c.realloc_failure_keeps_old(true));
//! config.validate()?;
//! ```

use super::error::{ConfigError, ConfigResult};
use crate::features::effect_registry::domain::ModelEntry;
use crate::shared::models::MAX_ERRNO;
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}
fn default_max_errno() -> u64 {
    MAX_ERRNO
}
fn default_max_paths() -> usize {
    1024
}

// ============================================================================
// Registry
// ============================================================================

/// Which models get registered
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Register allocators known to cause false positives
    pub include_experimental: bool,

    /// Builtin models to leave out
    pub disabled: Vec<String>,

    /// Additional models, validated like builtins
    pub extra_models: Vec<ModelEntry>,
}

impl RegistryConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(blank) = self.disabled.iter().find(|n| n.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "registry.disabled contains an empty model name ({:?})",
                blank
            )));
        }
        Ok(())
    }

    pub fn include_experimental(mut self, value: bool) -> Self {
        self.include_experimental = value;
        self
    }

    pub fn disable(mut self, name: impl Into<String>) -> Self {
        self.disabled.push(name.into());
        self
    }

    pub fn extra_model(mut self, entry: ModelEntry) -> Self {
        self.extra_models.push(entry);
        self
    }

    pub fn is_disabled(&self, name: &str) -> bool {
        self.disabled.iter().any(|d| d == name)
    }
}

// ============================================================================
// Evaluator
// ============================================================================

/// Evaluator knobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvaluatorConfig {
    /// Largest errno an error sentinel may encode (1..=4095)
    #[serde(default = "default_max_errno")]
    pub max_errno: u64,

    /// On reallocation failure, keep the old block owned instead of
    /// releasing it first
    pub realloc_failure_keeps_old: bool,

    /// Record a defect when a tainted value reaches a format-string sink
    #[serde(default = "default_true")]
    pub report_tainted_sinks: bool,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            max_errno: default_max_errno(),
            realloc_failure_keeps_old: false,
            report_tainted_sinks: true,
        }
    }
}

impl EvaluatorConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_errno == 0 || self.max_errno > MAX_ERRNO {
            return Err(ConfigError::range_with_hint(
                "max_errno",
                self.max_errno,
                1,
                MAX_ERRNO,
                "Error sentinels encode -errno in the last page of the address space",
            ));
        }
        Ok(())
    }

    pub fn max_errno(mut self, value: u64) -> Self {
        self.max_errno = value;
        self
    }

    pub fn realloc_failure_keeps_old(mut self, value: bool) -> Self {
        self.realloc_failure_keeps_old = value;
        self
    }

    pub fn report_tainted_sinks(mut self, value: bool) -> Self {
        self.report_tainted_sinks = value;
        self
    }
}

// ============================================================================
// Scenario driver
// ============================================================================

/// Path exploration limits for the scenario driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Live paths kept after each call (1..=1000000)
    #[serde(default = "default_max_paths")]
    pub max_paths: usize,

    /// Apply each step to all live paths with rayon
    #[serde(default = "default_true")]
    pub parallel: bool,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            max_paths: default_max_paths(),
            parallel: true,
        }
    }
}

impl ScenarioConfig {
    pub const MAX_PATHS_LIMIT: usize = 1_000_000;

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_paths == 0 || self.max_paths > Self::MAX_PATHS_LIMIT {
            return Err(ConfigError::range_with_hint(
                "max_paths",
                self.max_paths,
                1,
                Self::MAX_PATHS_LIMIT,
                "At least one path must be explored",
            ));
        }
        Ok(())
    }

    pub fn max_paths(mut self, value: usize) -> Self {
        self.max_paths = value;
        self
    }

    pub fn parallel(mut self, value: bool) -> Self {
        self.parallel = value;
        self
    }
}

// ============================================================================
// Top level
// ============================================================================

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelConfig {
    pub registry: RegistryConfig,
    pub evaluator: EvaluatorConfig,
    pub scenario: ScenarioConfig,
}

impl ModelConfig {
    /// Validate every section
    pub fn validate(&self) -> ConfigResult<()> {
        self.registry.validate()?;
        self.evaluator.validate()?;
        self.scenario.validate()?;
        Ok(())
    }

    pub fn registry<F>(mut self, f: F) -> Self
    where
        F: FnOnce(RegistryConfig) -> RegistryConfig,
    {
        self.registry = f(self.registry);
        self
    }

    pub fn evaluator<F>(mut self, f: F) -> Self
    where
        F: FnOnce(EvaluatorConfig) -> EvaluatorConfig,
    {
        self.evaluator = f(self.evaluator);
        self
    }

    pub fn scenario<F>(mut self, f: F) -> Self
    where
        F: FnOnce(ScenarioConfig) -> ScenarioConfig,
    {
        self.scenario = f(self.scenario);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ModelConfig::default();
        assert!(!config.registry.include_experimental);
        assert_eq!(config.evaluator.max_errno, 4095);
        assert!(config.evaluator.report_tainted_sinks);
        assert!(!config.evaluator.realloc_failure_keeps_old);
        assert_eq!(config.scenario.max_paths, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_fluent_overrides() {
        let config = ModelConfig::default()
            .registry(|c| c.include_experimental(true).disable("vfree"))
            .evaluator(|c| c.realloc_failure_keeps_old(true))
            .scenario(|c| c.max_paths(8).parallel(false));

        assert!(config.registry.include_experimental);
        assert!(config.registry.is_disabled("vfree"));
        assert!(!config.registry.is_disabled("kfree"));
        assert!(config.evaluator.realloc_failure_keeps_old);
        assert_eq!(config.scenario.max_paths, 8);
        assert!(!config.scenario.parallel);
    }

    #[test]
    fn test_zero_max_paths_rejected() {
        let config = ModelConfig::default().scenario(|c| c.max_paths(0));
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Range { ref field, .. } if field == "max_paths"));
    }

    #[test]
    fn test_max_errno_range() {
        assert!(EvaluatorConfig::default().max_errno(0).validate().is_err());
        assert!(EvaluatorConfig::default().max_errno(4096).validate().is_err());
        assert!(EvaluatorConfig::default().max_errno(1).validate().is_ok());
    }

    #[test]
    fn test_blank_disabled_name_rejected() {
        let config = RegistryConfig::default().disable(" ");
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::Validation(_)
        ));
    }
}
