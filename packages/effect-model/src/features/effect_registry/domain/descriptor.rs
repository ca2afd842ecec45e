/*
 * Effect Descriptor
 *
 * Declarative statement of what a black-box function does to abstract state.
 * Parameter references are zero-based indices into the fixed parameters of
 * the owning signature; the registry checks them at load time.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Zero-based index of a fixed parameter
pub type ParamIndex = usize;

/// Size of an allocated block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeExpr {
    /// Taken from an integer argument
    Param(ParamIndex),
    /// Fixed number of bytes
    Bytes(u64),
}

fn default_true() -> bool {
    true
}

/// Effect descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum EffectDescriptor {
    /// Fresh owned block on success, null (or an error pointer when not
    /// `nullable`) on failure
    Allocate {
        #[serde(default)]
        size: Option<SizeExpr>,
        #[serde(default = "default_true")]
        nullable: bool,
    },

    /// Allocation whose size the model cannot see
    AllocateNoSize,

    /// Owned -> Released
    Free { target: ParamIndex },

    /// Free(old) then Allocate(size); provenance of `old` carries forward
    Reallocate { old: ParamIndex, size: SizeExpr },

    /// Each parameter's storage becomes a taint source
    TaintArguments {
        params: Vec<ParamIndex>,
        #[serde(default)]
        taints_return: bool,
    },

    /// The whole buffer becomes initialized
    WriteAll { target: ParamIndex },

    /// Parameter consumed as a format string
    FormatStringSink { fmt: ParamIndex },

    LockAcquire {
        lock: ParamIndex,
        #[serde(default = "default_true")]
        exclusive: bool,
    },

    LockRelease { lock: ParamIndex },

    /// Acquire-or-fail, both explorable
    TryLock { lock: ParamIndex },

    /// Acquire-or-interrupted (`-EINTR`), both explorable
    InterruptibleLock { lock: ParamIndex },

    /// Parent (when the child's group requires it) then child
    CompositeLockAcquire { child: ParamIndex, parent: ParamIndex },

    /// Child then parent, mirroring the acquire
    CompositeLockRelease { child: ParamIndex, parent: ParamIndex },

    /// `IS_ERR` / `IS_ERR_OR_NULL`; never releases the pointee
    ClassifyPointer {
        target: ParamIndex,
        #[serde(default)]
        include_null: bool,
    },

    /// Known constant result
    ReturnConstant { value: i64 },

    /// Returns one of its arguments unchanged
    ReturnArgument { param: ParamIndex },

    /// Returns 1 or 0, both explorable
    NondetBool,

    /// Ordered composition
    Sequence { steps: Vec<EffectDescriptor> },

    /// Never returns
    Terminate,

    /// No modeled effect
    Identity,
}

impl EffectDescriptor {
    pub fn allocate(size_param: ParamIndex) -> Self {
        Self::Allocate {
            size: Some(SizeExpr::Param(size_param)),
            nullable: true,
        }
    }

    pub fn free(target: ParamIndex) -> Self {
        Self::Free { target }
    }

    pub fn lock(lock: ParamIndex) -> Self {
        Self::LockAcquire {
            lock,
            exclusive: true,
        }
    }

    pub fn unlock(lock: ParamIndex) -> Self {
        Self::LockRelease { lock }
    }

    pub fn taint(params: Vec<ParamIndex>) -> Self {
        Self::TaintArguments {
            params,
            taints_return: false,
        }
    }

    pub fn sequence(steps: Vec<EffectDescriptor>) -> Self {
        Self::Sequence { steps }
    }

    /// Every parameter index the descriptor reads, including nested steps.
    pub fn referenced_params(&self) -> Vec<ParamIndex> {
        let mut params = Vec::new();
        self.collect_params(&mut params);
        params.sort_unstable();
        params.dedup();
        params
    }

    fn collect_params(&self, out: &mut Vec<ParamIndex>) {
        match self {
            Self::Allocate { size, .. } => {
                if let Some(SizeExpr::Param(p)) = size {
                    out.push(*p);
                }
            }
            Self::Reallocate { old, size } => {
                out.push(*old);
                if let SizeExpr::Param(p) = size {
                    out.push(*p);
                }
            }
            Self::TaintArguments { params, .. } => out.extend(params.iter().copied()),
            Self::Free { target }
            | Self::WriteAll { target }
            | Self::ClassifyPointer { target, .. } => out.push(*target),
            Self::FormatStringSink { fmt } => out.push(*fmt),
            Self::LockAcquire { lock, .. }
            | Self::LockRelease { lock }
            | Self::TryLock { lock }
            | Self::InterruptibleLock { lock } => out.push(*lock),
            Self::CompositeLockAcquire { child, parent }
            | Self::CompositeLockRelease { child, parent } => {
                out.push(*child);
                out.push(*parent);
            }
            Self::ReturnArgument { param } => out.push(*param),
            Self::Sequence { steps } => steps.iter().for_each(|s| s.collect_params(out)),
            Self::AllocateNoSize
            | Self::ReturnConstant { .. }
            | Self::NondetBool
            | Self::Terminate
            | Self::Identity => {}
        }
    }

    /// Allocate-family effects must always reach both success and failure.
    pub fn is_allocation(&self) -> bool {
        match self {
            Self::Allocate { .. } | Self::AllocateNoSize | Self::Reallocate { .. } => true,
            Self::Sequence { steps } => steps.iter().any(|s| s.is_allocation()),
            _ => false,
        }
    }

    /// Whether applying the effect binds a return value.
    pub fn produces_return(&self) -> bool {
        match self {
            Self::Allocate { .. }
            | Self::AllocateNoSize
            | Self::Reallocate { .. }
            | Self::TryLock { .. }
            | Self::InterruptibleLock { .. }
            | Self::ClassifyPointer { .. }
            | Self::ReturnConstant { .. }
            | Self::ReturnArgument { .. }
            | Self::NondetBool => true,
            Self::TaintArguments { taints_return, .. } => *taints_return,
            Self::Sequence { steps } => steps.iter().any(|s| s.produces_return()),
            _ => false,
        }
    }

    pub fn never_returns(&self) -> bool {
        match self {
            Self::Terminate => true,
            Self::Sequence { steps } => steps.iter().any(|s| s.never_returns()),
            _ => false,
        }
    }

    /// Short name of the variant
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Allocate { .. } => "Allocate",
            Self::AllocateNoSize => "AllocateNoSize",
            Self::Free { .. } => "Free",
            Self::Reallocate { .. } => "Reallocate",
            Self::TaintArguments { .. } => "TaintArguments",
            Self::WriteAll { .. } => "WriteAll",
            Self::FormatStringSink { .. } => "FormatStringSink",
            Self::LockAcquire { .. } => "LockAcquire",
            Self::LockRelease { .. } => "LockRelease",
            Self::TryLock { .. } => "TryLock",
            Self::InterruptibleLock { .. } => "InterruptibleLock",
            Self::CompositeLockAcquire { .. } => "CompositeLockAcquire",
            Self::CompositeLockRelease { .. } => "CompositeLockRelease",
            Self::ClassifyPointer { .. } => "ClassifyPointer",
            Self::ReturnConstant { .. } => "ReturnConstant",
            Self::ReturnArgument { .. } => "ReturnArgument",
            Self::NondetBool => "NondetBool",
            Self::Sequence { .. } => "Sequence",
            Self::Terminate => "Terminate",
            Self::Identity => "Identity",
        }
    }
}

impl fmt::Display for SizeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeExpr::Param(p) => write!(f, "${}", p),
            SizeExpr::Bytes(n) => write!(f, "{}", n),
        }
    }
}

impl fmt::Display for EffectDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.kind_name();
        match self {
            Self::Allocate { size, nullable } => {
                let size = size.map(|s| s.to_string()).unwrap_or_else(|| "?".to_string());
                if *nullable {
                    write!(f, "{}({})", name, size)
                } else {
                    write!(f, "{}({}, err_ptr)", name, size)
                }
            }
            Self::Reallocate { old, size } => write!(f, "{}(${}, {})", name, old, size),
            Self::TaintArguments {
                params,
                taints_return,
            } => {
                let mut args: Vec<String> = params.iter().map(|p| format!("${}", p)).collect();
                if *taints_return {
                    args.push("return".to_string());
                }
                write!(f, "{}({})", name, args.join(", "))
            }
            Self::Free { target }
            | Self::WriteAll { target }
            | Self::FormatStringSink { fmt: target }
            | Self::ReturnArgument { param: target }
            | Self::LockRelease { lock: target }
            | Self::TryLock { lock: target }
            | Self::InterruptibleLock { lock: target } => write!(f, "{}(${})", name, target),
            Self::LockAcquire { lock, exclusive } => {
                write!(f, "{}(${}, exclusive={})", name, lock, exclusive)
            }
            Self::CompositeLockAcquire { child, parent }
            | Self::CompositeLockRelease { child, parent } => {
                write!(f, "{}(${}, parent=${})", name, child, parent)
            }
            Self::ClassifyPointer {
                target,
                include_null,
            } => write!(f, "{}(${}, include_null={})", name, target, include_null),
            Self::ReturnConstant { value } => write!(f, "{}({})", name, value),
            Self::Sequence { steps } => {
                let parts: Vec<String> = steps.iter().map(|s| s.to_string()).collect();
                write!(f, "{}", parts.join(" ; "))
            }
            Self::AllocateNoSize | Self::NondetBool | Self::Terminate | Self::Identity => {
                write!(f, "{}()", name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn copy_from_user() -> EffectDescriptor {
        EffectDescriptor::sequence(vec![
            EffectDescriptor::taint(vec![0, 1]),
            EffectDescriptor::WriteAll { target: 0 },
        ])
    }

    #[test]
    fn test_referenced_params_nested() {
        assert_eq!(copy_from_user().referenced_params(), vec![0, 1]);
        assert_eq!(
            EffectDescriptor::Reallocate {
                old: 0,
                size: SizeExpr::Param(1)
            }
            .referenced_params(),
            vec![0, 1]
        );
        assert!(EffectDescriptor::Terminate.referenced_params().is_empty());
    }

    #[test]
    fn test_allocation_family() {
        assert!(EffectDescriptor::allocate(0).is_allocation());
        assert!(EffectDescriptor::AllocateNoSize.is_allocation());
        assert!(!EffectDescriptor::free(0).is_allocation());
        assert!(!copy_from_user().is_allocation());
    }

    #[test]
    fn test_produces_return() {
        assert!(EffectDescriptor::allocate(0).produces_return());
        assert!(!EffectDescriptor::free(0).produces_return());
        assert!(!copy_from_user().produces_return());
        assert!(EffectDescriptor::TaintArguments {
            params: vec![0],
            taints_return: true
        }
        .produces_return());
    }

    #[test]
    fn test_display() {
        assert_eq!(EffectDescriptor::allocate(0).to_string(), "Allocate($0)");
        assert_eq!(
            copy_from_user().to_string(),
            "TaintArguments($0, $1) ; WriteAll($0)"
        );
        assert_eq!(EffectDescriptor::Terminate.to_string(), "Terminate()");
    }

    #[test]
    fn test_yaml_tagged_form() {
        let yaml = r#"
effect: sequence
steps:
  - effect: taint_arguments
    params: [0, 1]
  - effect: write_all
    target: 0
"#;
        let parsed: EffectDescriptor = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(parsed, copy_from_user());

        let alloc: EffectDescriptor =
            serde_yaml::from_str("effect: allocate\nsize: {param: 0}\n").unwrap();
        assert_eq!(alloc, EffectDescriptor::allocate(0));
    }
}
