//! Registry assembly and configuration loading

mod common;

use common::*;
use effect_model::config::ConfigError;
use effect_model::features::effect_registry::{
    builtin_model_names, ParamKind, RegistryBuilder, ReturnKind,
};
use effect_model::{
    build_registry, global_registry, lookup, register_all_models, register_models_with,
    AbstractState, EffectDescriptor, FunctionSignature, ModelConfig, ModelEntry, OutcomeLabel,
    RegistryConfig, RegistryError, Value,
};
use pretty_assertions::assert_eq;
use std::io::Write;
use tempfile::NamedTempFile;

const CONFIG_WITH_EXTRAS: &str = r#"
version: 1
registry:
  disabled: [vfree]
  extra_models:
    - signature:
        name: my_pool_alloc
        params: [pointer, size]
        returns: pointer
      effect:
        effect: allocate
        size:
          param: 1
    - signature:
        name: my_pool_free
        params: [pointer, pointer]
      effect:
        effect: free
        target: 1
evaluator:
  realloc_failure_keeps_old: true
scenario:
  max_paths: 64
  parallel: false
"#;

#[test]
fn process_wide_registry_is_built_once() {
    let registry = register_all_models().unwrap();
    assert!(registry.contains("kmalloc"));
    assert_eq!(lookup("kfree"), Some(&EffectDescriptor::free(0)));
    assert!(lookup("strlen").is_none());

    // idempotent, same instance
    let again = register_all_models().unwrap();
    assert!(std::ptr::eq(registry, again));
    assert!(global_registry().is_some());

    // reconfiguring after the fact is refused
    let err = register_models_with(&RegistryConfig::default().include_experimental(true))
        .unwrap_err();
    assert_eq!(err, RegistryError::AlreadyInitialized);
    assert!(lookup("krealloc").is_none());
}

#[test]
fn copy_from_user_variants_resolve_to_one_effect() {
    let registry = registry();
    let variants: Vec<_> = registry
        .names()
        .into_iter()
        .filter(|n| n.contains("copy_from_user"))
        .collect();
    assert_eq!(variants.len(), 10);

    let first = registry.lookup(variants[0]).unwrap();
    assert!(variants.iter().all(|v| registry.lookup(v) == Some(first)));
}

#[test]
fn experimental_allocators_are_opt_in() {
    let stable = registry();
    assert!(!stable.contains("krealloc"));
    assert!(!stable.contains("kmem_cache_alloc"));
    assert_eq!(stable.lookup("dma_alloc_attrs"), Some(&EffectDescriptor::Identity));

    let experimental = experimental_registry();
    assert!(experimental.contains("krealloc"));
    assert!(experimental.lookup("dma_alloc_attrs").map_or(false, |d| d.is_allocation()));
}

#[test]
fn disabling_unknown_model_suggests_closest() {
    let err = build_registry(&RegistryConfig::default().disable("kmaloc")).unwrap_err();
    match err {
        RegistryError::UnknownDisabledModel { name, suggestion } => {
            assert_eq!(name, "kmaloc");
            assert!(suggestion.contains("kmalloc"), "{}", suggestion);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn malformed_models_abort_loading() {
    let out_of_range = ModelEntry::new(
        FunctionSignature::new("bad_free", vec![ParamKind::Pointer], ReturnKind::Void),
        EffectDescriptor::free(2),
    );
    let mut builder = RegistryBuilder::new();
    assert!(matches!(
        builder.register_entry(out_of_range).unwrap_err(),
        RegistryError::ParamOutOfRange { param: 2, arity: 1, .. }
    ));

    // an extra model may not silently replace a builtin
    let clash = ModelEntry::new(
        FunctionSignature::new("kfree", vec![ParamKind::Pointer], ReturnKind::Void),
        EffectDescriptor::Identity,
    );
    let err = build_registry(&RegistryConfig::default().extra_model(clash.clone())).unwrap_err();
    assert!(matches!(err, RegistryError::Conflict { .. }));

    // unless the builtin is disabled first
    let registry =
        build_registry(&RegistryConfig::default().disable("kfree").extra_model(clash)).unwrap();
    assert_eq!(registry.lookup("kfree"), Some(&EffectDescriptor::Identity));
}

#[test]
fn builtin_names_are_sorted_and_unique() {
    let names = builtin_model_names();
    let mut sorted = names.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(names, sorted);
    assert!(names.iter().any(|n| n == "dma_alloc_attrs"));
}

#[test]
fn config_file_with_extra_models() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(CONFIG_WITH_EXTRAS.as_bytes()).unwrap();

    let config = ModelConfig::from_yaml(file.path()).unwrap();
    assert!(config.evaluator.realloc_failure_keeps_old);
    assert_eq!(config.scenario.max_paths, 64);
    assert!(!config.scenario.parallel);

    let registry = build_registry(&config.registry).unwrap();
    assert!(!registry.contains("vfree"));
    assert!(registry.contains("vmalloc"));

    let (evaluator, _) = evaluator();
    let outcomes = call(
        &registry,
        &evaluator,
        "my_pool_alloc",
        1,
        vec![Value::storage("pool"), Value::Int(32)],
        &AbstractState::new(),
    );
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].label, OutcomeLabel::Success);

    let freed = call_one(
        &registry,
        &evaluator,
        "my_pool_free",
        2,
        vec![Value::storage("pool"), outcomes[0].value()],
        &outcomes[0].state,
    );
    assert!(freed.state.allocations.owned().is_empty());
}

#[test]
fn extra_model_with_bad_index_is_fatal() {
    let yaml = r#"
version: 1
registry:
  extra_models:
    - signature:
        name: broken
        params: [pointer]
      effect:
        effect: free
        target: 3
"#;
    let config = ModelConfig::from_yaml_str(yaml).unwrap();
    assert!(matches!(
        build_registry(&config.registry).unwrap_err(),
        RegistryError::ParamOutOfRange { .. }
    ));
}

#[test]
fn config_errors() {
    assert!(matches!(
        ModelConfig::from_yaml_str("registry: {}\n").unwrap_err(),
        ConfigError::MissingVersion
    ));
    assert!(matches!(
        ModelConfig::from_yaml_str("version: 2\n").unwrap_err(),
        ConfigError::UnsupportedVersion { found: 2, .. }
    ));
    assert!(matches!(
        ModelConfig::from_yaml_str("version: 1\nscenario:\n  max_paths: 0\n").unwrap_err(),
        ConfigError::Range { .. }
    ));
    assert!(matches!(
        ModelConfig::from_yaml_str("version: 1\nevaluatr: {}\n").unwrap_err(),
        ConfigError::Yaml(_)
    ));
}

#[test]
fn config_yaml_roundtrip_through_file() {
    let config = ModelConfig::default()
        .registry(|r| r.include_experimental(true).disable("vfree"))
        .evaluator(|e| e.max_errno(1024))
        .scenario(|s| s.max_paths(8));
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(config.to_yaml().unwrap().as_bytes()).unwrap();

    assert_eq!(ModelConfig::from_yaml(file.path()).unwrap(), config);
}
