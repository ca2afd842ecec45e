//! Effect Evaluator
//!
//! Applies registry descriptors to explicit, per-path abstract state and
//! returns every reachable outcome.
//!
//! ```text
//! domain/          state tables, bindings, outcomes
//! infrastructure/  per-effect transition handlers
//! application/     EffectEvaluator (dispatch, sequencing, arity check)
//! ```

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use application::EffectEvaluator;
pub use domain::{
    AbstractState, AllocState, CallBindings, Contents, LockGroupPolicy, LockState, Observation,
    Outcome, OutcomeLabel, ReturnValue, TaintState,
};
pub use error::EvalError;
