//! Configuration
//!
//! Two ways in:
//! - Builder: `ModelConfig::default().evaluator(|c| c.max_errno(133))`
//! - YAML: `ModelConfig::from_yaml("effect-model.yaml")?` (versioned schema v1)
//!
//! Both go through the same `validate()`.

pub mod error;
pub mod io;
pub mod model_config;

pub use error::{ConfigError, ConfigResult};
pub use io::ConfigFileV1;
pub use model_config::{EvaluatorConfig, ModelConfig, RegistryConfig, ScenarioConfig};
