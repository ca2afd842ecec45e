use thiserror::Error;

/// Host-side misuse of the evaluator
///
/// Modeled defects never show up here; they go to the defect sink.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("Call to '{callee}' binds {bound} argument(s), but its model reads parameter ${param}")]
    ArityMismatch {
        callee: String,
        param: usize,
        bound: usize,
    },
}

pub type Result<T> = std::result::Result<T, EvalError>;
