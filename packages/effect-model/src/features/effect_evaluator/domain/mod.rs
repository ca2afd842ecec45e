//! Evaluator domain: abstract state, call bindings, outcomes

pub mod bindings;
pub mod outcome;
pub mod state;

pub use bindings::CallBindings;
pub use outcome::{Observation, Outcome, OutcomeLabel, ReturnValue};
pub use state::{
    AbstractState, AllocState, Allocation, AllocationTable, Contents, LockGroupPolicy, LockState,
    LockTable, Release, TaintState, TaintTable,
};
