/*
 * Effect Model - Kernel Primitive Effects for Path-Sensitive Analysis
 *
 * Feature-First Hexagonal Architecture:
 * - shared/      : Common models (MemoryRef, CallSite, Value)
 * - features/    : Vertical slices (registry → evaluator → branch resolver / defect sink → scenario)
 * - config/      : YAML configuration (version 1 schema)
 *
 * The host engine owns paths, CFG and constraint solving. This crate gives it:
 * - a registry of declarative effects for kernel primitives
 *   (allocation, locking, taint, termination)
 * - an evaluator that applies one effect to one path's state and returns
 *   every outcome, each with its branch facts and defects
 */

#![allow(clippy::module_inception)] // Module naming intentional
#![allow(clippy::new_without_default)] // Default impl not always needed

// ═══════════════════════════════════════════════════════════════════════════
// Module Exports - Feature-First Architecture
// ═══════════════════════════════════════════════════════════════════════════

/// Shared models
pub mod shared;

/// Feature modules
pub mod features;

/// Configuration system
pub mod config;

/// Error types
pub mod errors;

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports for Public API
// ═══════════════════════════════════════════════════════════════════════════

pub use config::{ConfigError, EvaluatorConfig, ModelConfig, RegistryConfig, ScenarioConfig};
pub use errors::{ModelError, Result};
pub use features::branch_resolver::{resolve, BranchCondition, BranchFact, ConditionId, Fork};
pub use features::defect_sink::{
    CollectingSink, Defect, DefectKind, DefectSink, NullSink, TracingSink,
};
pub use features::effect_evaluator::{
    AbstractState, CallBindings, EffectEvaluator, EvalError, Outcome, OutcomeLabel,
};
pub use features::effect_registry::{
    build_registry, global_registry, lookup, register_all_models, register_models_with,
    EffectDescriptor, EffectRegistry, FunctionSignature, ModelEntry, RegistryError,
};
pub use features::scenario::{Scenario, ScenarioError, ScenarioReport, ScenarioRunner};
pub use shared::models::{CallSite, MemoryRef, ObjectId, PointerClass, Value};
