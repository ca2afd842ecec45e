//! Error types for effect-model
//!
//! Each feature has its own error enum; `ModelError` is the umbrella for
//! callers that drive several of them (the CLI, the host engine glue).

use crate::config::ConfigError;
use crate::features::effect_evaluator::EvalError;
use crate::features::effect_registry::RegistryError;
use crate::features::scenario::ScenarioError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Evaluation error: {0}")]
    Eval(#[from] EvalError),

    #[error("Scenario error: {0}")]
    Scenario(#[from] ScenarioError),
}

/// Result type alias for effect-model operations
pub type Result<T> = std::result::Result<T, ModelError>;
