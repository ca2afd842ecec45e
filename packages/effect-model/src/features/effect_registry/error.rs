/// Registry load errors
///
/// All of these are fatal: a silently dropped model brings back the false
/// positives it exists to suppress.
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Model has an empty function name")]
    EmptyName,

    #[error("Model '{function}': {effect} references parameter ${param}, but the signature has {arity} fixed parameter(s)")]
    ParamOutOfRange {
        function: String,
        effect: String,
        param: usize,
        arity: usize,
    },

    #[error("Model '{function}': {effect} binds a return value, but the signature returns void")]
    MissingReturn { function: String, effect: String },

    #[error("Model '{function}': sequence has no steps")]
    EmptySequence { function: String },

    #[error("Conflicting models for '{function}': already registered as {existing}, got {incoming}")]
    Conflict {
        function: String,
        existing: String,
        incoming: String,
    },

    #[error("Cannot disable unknown model '{name}'. {suggestion}")]
    UnknownDisabledModel { name: String, suggestion: String },

    #[error("Global registry already initialized; configure it before the first lookup")]
    AlreadyInitialized,
}

pub type Result<T> = std::result::Result<T, RegistryError>;
