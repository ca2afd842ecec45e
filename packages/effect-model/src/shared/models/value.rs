//! Argument values and pointer classification.

use super::ids::{MemoryRef, ObjectId, StorageId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Width of the reserved error-code range at the top of the address space.
pub const MAX_ERRNO: u64 = 4095;

/// Highest representable address.
pub const MAX_ADDRESS: u64 = u64::MAX;

pub const ENOMEM: i64 = 12;
pub const EINTR: i64 = 4;

/// Pointer classification
///
/// `ErrorSentinel` and `Null` are distinct classes, but consumers that ask
/// "is this NULL or an error" treat them the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerClass {
    Valid,
    Null,
    ErrorSentinel,
}

impl PointerClass {
    /// Classify a raw address with the kernel's default error range.
    pub fn classify_raw(raw: u64) -> Self {
        Self::classify_raw_with(raw, MAX_ERRNO)
    }

    /// Classify a raw address; values at or above `MAX_ADDRESS - max_errno` are error sentinels.
    pub fn classify_raw_with(raw: u64, max_errno: u64) -> Self {
        if raw == 0 {
            PointerClass::Null
        } else if raw >= MAX_ADDRESS - max_errno {
            PointerClass::ErrorSentinel
        } else {
            PointerClass::Valid
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, PointerClass::Valid)
    }

    pub fn is_null_or_error(&self) -> bool {
        !self.is_valid()
    }
}

/// Encode a negative errno the way `ERR_PTR` does.
pub fn err_ptr(errno: i64) -> u64 {
    errno.unsigned_abs().wrapping_neg()
}

/// Value bound to an argument (or returned) at a call site
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// The null pointer
    Null,

    /// Raw address with no tracked block behind it
    Address(u64),

    /// Heap block tracked in the allocation table
    Object(ObjectId),

    /// Host-owned storage
    Storage(StorageId),

    /// Scalar
    Int(i64),

    /// Nothing is known about the value
    Unknown,
}

impl Value {
    pub fn storage(name: impl Into<String>) -> Self {
        Value::Storage(StorageId::new(name))
    }

    /// Memory the value refers to, if it names a tracked identity.
    pub fn memory_ref(&self) -> Option<MemoryRef> {
        match self {
            Value::Object(id) => Some(MemoryRef::Object(*id)),
            Value::Storage(id) => Some(MemoryRef::Storage(id.clone())),
            _ => None,
        }
    }

    /// Pointer class of the value, `None` when undetermined.
    ///
    /// Integers are read as raw pointer bits so `ERR_PTR(-ENOMEM)` passed as
    /// an integer still classifies as an error sentinel.
    pub fn pointer_class(&self, max_errno: u64) -> Option<PointerClass> {
        match self {
            Value::Null => Some(PointerClass::Null),
            Value::Address(raw) => Some(PointerClass::classify_raw_with(*raw, max_errno)),
            Value::Int(v) => Some(PointerClass::classify_raw_with(*v as u64, max_errno)),
            Value::Object(_) | Value::Storage(_) => Some(PointerClass::Valid),
            Value::Unknown => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Address(raw) => write!(f, "{:#x}", raw),
            Value::Object(id) => write!(f, "{}", id),
            Value::Storage(id) => write!(f, "{}", id),
            Value::Int(v) => write!(f, "{}", v),
            Value::Unknown => write!(f, "?"),
        }
    }
}
