//! Common test utilities for effect-model
//!
//! Registry/evaluator fixtures and a small call helper shared by the
//! integration tests.

#![allow(dead_code)]

use effect_model::{
    build_registry, AbstractState, CallBindings, CallSite, CollectingSink, EffectEvaluator,
    EffectRegistry, EvaluatorConfig, Outcome, RegistryConfig, Value,
};
use std::path::PathBuf;
use std::sync::Arc;

pub const FILE: &str = "drivers/test/fixture.c";

/// Default builtin registry
pub fn registry() -> EffectRegistry {
    build_registry(&RegistryConfig::default()).expect("builtin models are valid")
}

/// Builtin registry plus the experimental allocators
pub fn experimental_registry() -> EffectRegistry {
    build_registry(&RegistryConfig::default().include_experimental(true))
        .expect("experimental models are valid")
}

/// Evaluator writing into a sink the test can inspect
pub fn evaluator() -> (EffectEvaluator, Arc<CollectingSink>) {
    evaluator_with(EvaluatorConfig::default())
}

pub fn evaluator_with(config: EvaluatorConfig) -> (EffectEvaluator, Arc<CollectingSink>) {
    let sink = Arc::new(CollectingSink::new());
    (EffectEvaluator::new(config, sink.clone()), sink)
}

pub fn site(line: u32, callee: &str) -> CallSite {
    CallSite::new(FILE, line, callee)
}

/// Look up `callee` and apply it at `line`
pub fn call(
    registry: &EffectRegistry,
    evaluator: &EffectEvaluator,
    callee: &str,
    line: u32,
    args: Vec<Value>,
    state: &AbstractState,
) -> Vec<Outcome> {
    let descriptor = registry
        .lookup(callee)
        .unwrap_or_else(|| panic!("no model for {}", callee));
    evaluator
        .apply(descriptor, &CallBindings::new(site(line, callee), args), state)
        .expect("well-formed call")
}

/// Apply a call that must have exactly one outcome
pub fn call_one(
    registry: &EffectRegistry,
    evaluator: &EffectEvaluator,
    callee: &str,
    line: u32,
    args: Vec<Value>,
    state: &AbstractState,
) -> Outcome {
    let mut outcomes = call(registry, evaluator, callee, line, args, state);
    assert_eq!(outcomes.len(), 1, "{} should not fork", callee);
    outcomes.remove(0)
}

pub fn scenario_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("scenarios")
        .join(name)
}
