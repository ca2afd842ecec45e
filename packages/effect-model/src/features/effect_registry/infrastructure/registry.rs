//! Effect Registry
//!
//! Flat, immutable name -> model mapping. Built once through
//! [`RegistryBuilder`], which validates every entry; after `build()` the
//! registry is read-only and safe to share across evaluator threads.

use crate::features::effect_registry::domain::{
    EffectDescriptor, FunctionSignature, ModelEntry,
};
use crate::features::effect_registry::error::{RegistryError, Result};
use rustc_hash::FxHashMap;

/// Read-only model registry
#[derive(Debug, Clone, Default)]
pub struct EffectRegistry {
    entries: FxHashMap<String, ModelEntry>,
}

impl EffectRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Descriptor for `name`, exact match
    pub fn lookup(&self, name: &str) -> Option<&EffectDescriptor> {
        self.entries.get(name).map(|e| &e.effect)
    }

    /// Descriptor for a signature; resolution is by name only
    pub fn lookup_signature(&self, signature: &FunctionSignature) -> Option<&EffectDescriptor> {
        self.lookup(&signature.name)
    }

    pub fn entry(&self, name: &str) -> Option<&ModelEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Model names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Entries sorted by name
    pub fn entries(&self) -> Vec<&ModelEntry> {
        let mut entries: Vec<&ModelEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| a.name().cmp(b.name()));
        entries
    }
}

/// Validating builder for [`EffectRegistry`]
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entries: FxHashMap<String, ModelEntry>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model
    ///
    /// Re-registering an identical model is a no-op; any other duplicate is a
    /// conflict.
    pub fn register(
        &mut self,
        signature: FunctionSignature,
        effect: EffectDescriptor,
    ) -> Result<&mut Self> {
        self.register_entry(ModelEntry::new(signature, effect))
    }

    pub fn register_entry(&mut self, entry: ModelEntry) -> Result<&mut Self> {
        validate_entry(&entry)?;

        if let Some(existing) = self.entries.get(entry.name()) {
            if *existing == entry {
                tracing::debug!("duplicate registration of '{}' ignored", entry.name());
                return Ok(self);
            }
            return Err(RegistryError::Conflict {
                function: entry.name().to_string(),
                existing: describe(existing),
                incoming: describe(&entry),
            });
        }

        tracing::debug!("registered model {} => {}", entry.signature, entry.effect);
        self.entries.insert(entry.name().to_string(), entry);
        Ok(self)
    }

    pub fn register_all(&mut self, entries: impl IntoIterator<Item = ModelEntry>) -> Result<&mut Self> {
        for entry in entries {
            self.register_entry(entry)?;
        }
        Ok(self)
    }

    pub fn remove(&mut self, name: &str) -> Option<ModelEntry> {
        self.entries.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn build(self) -> EffectRegistry {
        EffectRegistry {
            entries: self.entries,
        }
    }
}

fn describe(entry: &ModelEntry) -> String {
    format!("{} => {}", entry.signature, entry.effect)
}

/// Load-time checks for a single entry
pub fn validate_entry(entry: &ModelEntry) -> Result<()> {
    let signature = &entry.signature;
    if signature.name.trim().is_empty() {
        return Err(RegistryError::EmptyName);
    }

    validate_descriptor(signature, &entry.effect)?;

    if entry.effect.produces_return() && !signature.returns_value() {
        return Err(RegistryError::MissingReturn {
            function: signature.name.clone(),
            effect: entry.effect.to_string(),
        });
    }

    Ok(())
}

fn validate_descriptor(signature: &FunctionSignature, effect: &EffectDescriptor) -> Result<()> {
    if let EffectDescriptor::Sequence { steps } = effect {
        if steps.is_empty() {
            return Err(RegistryError::EmptySequence {
                function: signature.name.clone(),
            });
        }
        for step in steps {
            validate_descriptor(signature, step)?;
        }
        return Ok(());
    }

    let arity = signature.arity();
    if let Some(param) = effect
        .referenced_params()
        .into_iter()
        .find(|p| *p >= arity)
    {
        return Err(RegistryError::ParamOutOfRange {
            function: signature.name.clone(),
            effect: effect.to_string(),
            param,
            arity,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::effect_registry::domain::{ParamKind, ReturnKind, SizeExpr};

    fn kfree() -> FunctionSignature {
        FunctionSignature::new("kfree", vec![ParamKind::Pointer], ReturnKind::Void)
    }

    fn kmalloc() -> FunctionSignature {
        FunctionSignature::new(
            "kmalloc",
            vec![ParamKind::Size, ParamKind::Flags],
            ReturnKind::Pointer,
        )
    }

    #[test]
    fn test_register_and_lookup() {
        let mut builder = EffectRegistry::builder();
        builder
            .register(kmalloc(), EffectDescriptor::allocate(0))
            .unwrap()
            .register(kfree(), EffectDescriptor::free(0))
            .unwrap();
        let registry = builder.build();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.lookup("kfree"), Some(&EffectDescriptor::free(0)));
        assert_eq!(
            registry.lookup_signature(&kmalloc()),
            Some(&EffectDescriptor::allocate(0))
        );
        assert!(registry.lookup("kzalloc").is_none());
        assert_eq!(registry.names(), vec!["kfree", "kmalloc"]);
    }

    #[test]
    fn test_param_out_of_range_rejected() {
        let mut builder = RegistryBuilder::new();
        let err = builder
            .register(kfree(), EffectDescriptor::free(1))
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::ParamOutOfRange { param: 1, arity: 1, .. }
        ));
    }

    #[test]
    fn test_nested_param_out_of_range_rejected() {
        let sig = FunctionSignature::new(
            "get_user",
            vec![ParamKind::Pointer, ParamKind::Pointer],
            ReturnKind::Integer,
        );
        let effect = EffectDescriptor::sequence(vec![
            EffectDescriptor::taint(vec![0, 1]),
            EffectDescriptor::WriteAll { target: 2 },
        ]);
        let err = RegistryBuilder::new().register(sig, effect).unwrap_err();
        assert!(matches!(err, RegistryError::ParamOutOfRange { param: 2, .. }));
    }

    #[test]
    fn test_size_param_checked() {
        let sig = FunctionSignature::new("vmalloc", vec![ParamKind::Size], ReturnKind::Pointer);
        let effect = EffectDescriptor::Allocate {
            size: Some(SizeExpr::Param(1)),
            nullable: true,
        };
        assert!(RegistryBuilder::new().register(sig, effect).is_err());
    }

    #[test]
    fn test_conflicting_descriptor_rejected() {
        let mut builder = RegistryBuilder::new();
        builder.register(kfree(), EffectDescriptor::free(0)).unwrap();
        let err = builder
            .register(kfree(), EffectDescriptor::Identity)
            .unwrap_err();
        assert!(matches!(err, RegistryError::Conflict { .. }));
    }

    #[test]
    fn test_identical_reregistration_tolerated() {
        let mut builder = RegistryBuilder::new();
        builder.register(kfree(), EffectDescriptor::free(0)).unwrap();
        builder.register(kfree(), EffectDescriptor::free(0)).unwrap();
        assert_eq!(builder.build().len(), 1);
    }

    #[test]
    fn test_missing_return_rejected() {
        let sig = FunctionSignature::new("bad_alloc", vec![ParamKind::Size], ReturnKind::Void);
        let err = RegistryBuilder::new()
            .register(sig, EffectDescriptor::allocate(0))
            .unwrap_err();
        assert!(matches!(err, RegistryError::MissingReturn { .. }));
    }

    #[test]
    fn test_empty_name_and_sequence_rejected() {
        let sig = FunctionSignature::new("  ", vec![], ReturnKind::Void);
        assert_eq!(
            RegistryBuilder::new()
                .register(sig, EffectDescriptor::Identity)
                .unwrap_err(),
            RegistryError::EmptyName
        );

        let sig = FunctionSignature::new("noop", vec![], ReturnKind::Void);
        assert!(matches!(
            RegistryBuilder::new()
                .register(sig, EffectDescriptor::sequence(vec![]))
                .unwrap_err(),
            RegistryError::EmptySequence { .. }
        ));
    }

    #[test]
    fn test_registry_shared_across_threads() {
        let mut builder = RegistryBuilder::new();
        builder.register(kfree(), EffectDescriptor::free(0)).unwrap();
        let registry = std::sync::Arc::new(builder.build());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = std::sync::Arc::clone(&registry);
                std::thread::spawn(move || registry.lookup("kfree").cloned())
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Some(EffectDescriptor::free(0)));
        }
    }
}
