pub mod kernel_models;
pub mod registry;

pub use kernel_models::{declined_models, experimental_models, stable_models};
pub use registry::{validate_entry, EffectRegistry, RegistryBuilder};
