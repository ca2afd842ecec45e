/// Builtin kernel models
///
/// Hand-curated allowlist of kernel primitives. Near-duplicate symbols (the
/// `copy_from_user` family) are registered one by one with the same effect.
use crate::features::effect_registry::domain::{
    EffectDescriptor, FunctionSignature, ModelEntry, ParamKind, ReturnKind, SizeExpr,
};

use ParamKind::{Flags, FormatString, Integer, Lock, Pointer, Size};

/// Every `copy_from_user` variant shares this signature and effect.
const COPY_FROM_USER_VARIANTS: &[&str] = &[
    "copy_from_user",
    "_copy_from_user",
    "__copy_from_user",
    "__copy_from_user_inatomic",
    "__copy_from_user_nocache",
    "__copy_from_user_inatomic_nocache",
    "__copy_from_user_ll",
    "__copy_from_user_ll_nozero",
    "__copy_from_user_ll_nocache",
    "__copy_from_user_ll_nocache_nozero",
];

/// Result of `num_online_cpus`; never <= 0.
pub const ONLINE_CPUS: i64 = 4096;

macro_rules! model {
    ($name:expr, [$($param:expr),*] -> $ret:ident, $effect:expr) => {
        ModelEntry::new(
            FunctionSignature::new($name, vec![$($param),*], ReturnKind::$ret),
            $effect,
        )
    };
    ($name:expr, [$($param:expr),*], ... -> $ret:ident, $effect:expr) => {
        ModelEntry::new(
            FunctionSignature::new($name, vec![$($param),*], ReturnKind::$ret).variadic(),
            $effect,
        )
    };
}

/// Data copied from userspace: both sides tainted, destination fully written.
pub fn copy_from_user_effect() -> EffectDescriptor {
    EffectDescriptor::sequence(vec![
        EffectDescriptor::taint(vec![0, 1]),
        EffectDescriptor::WriteAll { target: 0 },
    ])
}

fn write_and_return_dst() -> EffectDescriptor {
    EffectDescriptor::sequence(vec![
        EffectDescriptor::WriteAll { target: 0 },
        EffectDescriptor::ReturnArgument { param: 0 },
    ])
}

/// Models registered in every configuration
pub fn stable_models() -> Vec<ModelEntry> {
    let mut models = vec![
        // Fatal paths
        model!("panic", [FormatString], ... -> Void, EffectDescriptor::Terminate),
        model!("BUG", [] -> Void, EffectDescriptor::Terminate),
        model!("unreachable", [] -> Void, EffectDescriptor::Terminate),
        // Facts the analyzer would otherwise get wrong
        model!(
            "num_online_cpus",
            [] -> Integer,
            EffectDescriptor::ReturnConstant { value: ONLINE_CPUS }
        ),
        // Don't let feature probes look "always true"
        model!("cpu_has_fxsr", [] -> Integer, EffectDescriptor::NondetBool),
        model!("cpu_has", [Pointer, Integer] -> Integer, EffectDescriptor::NondetBool),
        model!("static_cpu_has", [Integer] -> Integer, EffectDescriptor::NondetBool),
        // Userspace input
        model!(
            "get_user",
            [Pointer, Pointer] -> Integer,
            EffectDescriptor::taint(vec![0, 1])
        ),
        model!("memset", [Pointer, Integer, Size] -> Pointer, write_and_return_dst()),
        model!("memcpy", [Pointer, Pointer, Size] -> Pointer, write_and_return_dst()),
        // Allocation
        model!("kmalloc", [Size, Flags] -> Pointer, EffectDescriptor::allocate(0)),
        model!("vmalloc", [Size] -> Pointer, EffectDescriptor::allocate(0)),
        model!("kfree", [Pointer] -> Void, EffectDescriptor::free(0)),
        model!("vfree", [Pointer] -> Void, EffectDescriptor::free(0)),
        model!("kmem_cache_free", [Pointer, Pointer] -> Void, EffectDescriptor::free(1)),
        model!(
            "dma_pool_free",
            [Pointer, Pointer, Integer] -> Void,
            EffectDescriptor::free(1)
        ),
        // Format string sinks
        model!(
            "printk",
            [FormatString], ... -> Integer,
            EffectDescriptor::FormatStringSink { fmt: 0 }
        ),
        // Mutexes
        model!("mutex_lock", [Lock] -> Void, EffectDescriptor::lock(0)),
        model!("mutex_unlock", [Lock] -> Void, EffectDescriptor::unlock(0)),
        model!("mutex_trylock", [Lock] -> Integer, EffectDescriptor::TryLock { lock: 0 }),
        model!(
            "mutex_lock_interruptible",
            [Lock] -> Integer,
            EffectDescriptor::InterruptibleLock { lock: 0 }
        ),
        model!(
            "mutex_lock_killable",
            [Lock] -> Integer,
            EffectDescriptor::InterruptibleLock { lock: 0 }
        ),
        // Spinlocks
        model!("spin_lock", [Lock] -> Void, EffectDescriptor::lock(0)),
        model!("spin_unlock", [Lock] -> Void, EffectDescriptor::unlock(0)),
        model!("spin_trylock", [Lock] -> Integer, EffectDescriptor::TryLock { lock: 0 }),
        // rw locks, modeled as exclusive
        // TODO: the rest of include/linux/rwlock_api_smp.h (_irq, _irqsave, _bh variants)
        model!("__raw_read_lock", [Lock] -> Void, EffectDescriptor::lock(0)),
        model!("__raw_read_unlock", [Lock] -> Void, EffectDescriptor::unlock(0)),
        model!("__raw_write_lock", [Lock] -> Void, EffectDescriptor::lock(0)),
        model!("__raw_write_unlock", [Lock] -> Void, EffectDescriptor::unlock(0)),
        // Device core: parent lock first when the bus asks for it
        model!(
            "__device_driver_lock",
            [Lock, Lock] -> Void,
            EffectDescriptor::CompositeLockAcquire { child: 0, parent: 1 }
        ),
        model!(
            "__device_driver_unlock",
            [Lock, Lock] -> Void,
            EffectDescriptor::CompositeLockRelease { child: 0, parent: 1 }
        ),
        // Error pointers
        model!(
            "IS_ERR",
            [Pointer] -> Bool,
            EffectDescriptor::ClassifyPointer { target: 0, include_null: false }
        ),
        model!(
            "IS_ERR_OR_NULL",
            [Pointer] -> Bool,
            EffectDescriptor::ClassifyPointer { target: 0, include_null: true }
        ),
    ];

    models.extend(COPY_FROM_USER_VARIANTS.iter().map(|name| {
        model!(*name, [Pointer, Pointer, Size] -> Integer, copy_from_user_effect())
    }));

    models
}

/// Allocators whose models produce false positives on real trees; opt-in only.
pub fn experimental_models() -> Vec<ModelEntry> {
    vec![
        // Flags the caller's `if (!new) kfree(old)` as a double release.
        model!(
            "krealloc",
            [Pointer, Size, Flags] -> Pointer,
            EffectDescriptor::Reallocate { old: 0, size: SizeExpr::Param(1) }
        ),
        // No size argument: the block size is the cache's object size.
        model!(
            "kmem_cache_alloc",
            [Pointer, Flags] -> Pointer,
            EffectDescriptor::AllocateNoSize
        ),
        model!(
            "dma_alloc_attrs",
            [Pointer, Size, Pointer, Flags, Pointer] -> Pointer,
            EffectDescriptor::allocate(1)
        ),
    ]
}

/// Stand-ins registered when experimental models are off.
pub fn declined_models() -> Vec<ModelEntry> {
    vec![model!(
        "dma_alloc_attrs",
        [Pointer, Size, Pointer, Flags, Pointer] -> Pointer,
        EffectDescriptor::Identity
    )]
}
