//! Registry assembly
//!
//! Builtin models + configuration -> validated [`EffectRegistry`]. The
//! process-wide registry is built at most once; later configuration attempts
//! fail instead of silently changing models under a running analysis.

use crate::config::error::find_closest_match;
use crate::config::RegistryConfig;
use crate::features::effect_registry::domain::{EffectDescriptor, ModelEntry};
use crate::features::effect_registry::error::{RegistryError, Result};
use crate::features::effect_registry::infrastructure::kernel_models::{
    declined_models, experimental_models, stable_models,
};
use crate::features::effect_registry::infrastructure::registry::EffectRegistry;
use once_cell::sync::OnceCell;

static GLOBAL_REGISTRY: OnceCell<EffectRegistry> = OnceCell::new();

/// Every builtin name any configuration could register, sorted
pub fn builtin_model_names() -> Vec<String> {
    let mut names: Vec<String> = stable_models()
        .into_iter()
        .chain(experimental_models())
        .chain(declined_models())
        .map(|m| m.signature.name)
        .collect();
    names.sort_unstable();
    names.dedup();
    names
}

/// Build an owned registry from builtins and `config`
pub fn build_registry(config: &RegistryConfig) -> Result<EffectRegistry> {
    let known = builtin_model_names();
    for name in &config.disabled {
        if !known.contains(name) {
            return Err(RegistryError::UnknownDisabledModel {
                name: name.clone(),
                suggestion: find_closest_match(name, &known),
            });
        }
    }

    let optional: Vec<ModelEntry> = if config.include_experimental {
        experimental_models()
    } else {
        declined_models()
    };

    let mut builder = EffectRegistry::builder();
    builder.register_all(
        stable_models()
            .into_iter()
            .chain(optional)
            .filter(|m| !config.is_disabled(m.name())),
    )?;
    builder.register_all(config.extra_models.iter().cloned())?;

    let registry = builder.build();
    tracing::debug!(
        "built effect registry: {} models (experimental={}, disabled={}, extra={})",
        registry.len(),
        config.include_experimental,
        config.disabled.len(),
        config.extra_models.len()
    );
    Ok(registry)
}

/// Build the process-wide registry with default configuration
///
/// Idempotent: later calls return the registry built by the first one.
pub fn register_all_models() -> Result<&'static EffectRegistry> {
    GLOBAL_REGISTRY.get_or_try_init(|| build_registry(&RegistryConfig::default()))
}

/// Build the process-wide registry with `config`
///
/// Fails with [`RegistryError::AlreadyInitialized`] once any registry is in
/// place.
pub fn register_models_with(config: &RegistryConfig) -> Result<&'static EffectRegistry> {
    if GLOBAL_REGISTRY.get().is_some() {
        return Err(RegistryError::AlreadyInitialized);
    }
    let registry = build_registry(config)?;
    GLOBAL_REGISTRY
        .set(registry)
        .map_err(|_| RegistryError::AlreadyInitialized)?;
    GLOBAL_REGISTRY.get().ok_or(RegistryError::AlreadyInitialized)
}

/// The process-wide registry, if built
pub fn global_registry() -> Option<&'static EffectRegistry> {
    GLOBAL_REGISTRY.get()
}

/// Look up `name` in the process-wide registry
///
/// `None` both for unmodeled functions and before registration.
pub fn lookup(name: &str) -> Option<&'static EffectDescriptor> {
    global_registry().and_then(|r| r.lookup(name))
}
