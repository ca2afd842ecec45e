//! Feature modules - Each feature follows Hexagonal Architecture
//!
//! Each feature contains (where it needs them):
//! - domain/         - Pure types (no external dependencies)
//! - ports/          - Interface definitions (traits)
//! - application/    - Entry points
//! - infrastructure/ - Implementations

// Function name -> effect descriptor
pub mod effect_registry;

// Descriptor + bindings + state -> outcomes
pub mod effect_evaluator;

// Fresh conditions for two-way splits
pub mod branch_resolver;

// Defect reporting channel
pub mod defect_sink;

// YAML scenarios explored against the registry
pub mod scenario;
