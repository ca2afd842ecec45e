//! Effect Registry
//!
//! Function name -> declarative effect descriptor, for the kernel primitives
//! the host engine cannot see into.
//!
//! ```text
//! domain/          signatures, descriptors, entries
//! infrastructure/  builtin model table, validating registry
//! application/     configuration-driven assembly, process-wide registry
//! ```

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use application::{
    build_registry, builtin_model_names, global_registry, lookup, register_all_models,
    register_models_with,
};
pub use domain::{EffectDescriptor, FunctionSignature, ModelEntry, ParamIndex, ParamKind, ReturnKind, SizeExpr};
pub use error::RegistryError;
pub use infrastructure::{EffectRegistry, RegistryBuilder};
