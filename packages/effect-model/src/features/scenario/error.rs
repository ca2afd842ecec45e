use crate::features::effect_evaluator::EvalError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Scenario '{scenario}' has no steps")]
    Empty { scenario: String },

    #[error("Step {step}: variable '${name}' is not bound by an earlier call")]
    UnboundVariable { step: usize, name: String },

    #[error("Invalid argument '{0}'. Expected an integer, NULL, ?, $var, &storage, 0x<addr> or ERR_PTR(-<errno>)")]
    InvalidArgument(String),

    #[error("Step {step}: unknown outcome label '{label}'. Valid labels: returned, success, failure, acquired, not-acquired, interrupted, true, false")]
    UnknownLabel { step: usize, label: String },

    #[error("Step {step}: {source}")]
    Eval {
        step: usize,
        #[source]
        source: EvalError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, ScenarioError>;
