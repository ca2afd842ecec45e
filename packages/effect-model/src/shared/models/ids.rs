//! Identities shared by the registry, evaluator, and defect sink.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Heap block conjured by an allocation effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl ObjectId {
    /// Fresh identity, unique for the lifetime of the process (across threads).
    pub fn fresh() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}

/// Storage owned by the host engine (stack buffer, global, lock object, user pointer).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StorageId(pub String);

impl StorageId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "&{}", self.0)
    }
}

/// Memory reference
///
/// Lock, taint, contents, and allocation tables are all keyed by this.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryRef {
    Object(ObjectId),
    Storage(StorageId),
}

impl MemoryRef {
    pub fn storage(name: impl Into<String>) -> Self {
        Self::Storage(StorageId::new(name))
    }
}

impl From<ObjectId> for MemoryRef {
    fn from(id: ObjectId) -> Self {
        Self::Object(id)
    }
}

impl From<StorageId> for MemoryRef {
    fn from(id: StorageId) -> Self {
        Self::Storage(id)
    }
}

impl fmt::Display for MemoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryRef::Object(id) => write!(f, "{}", id),
            MemoryRef::Storage(id) => write!(f, "{}", id),
        }
    }
}

/// Location of a call to a modeled function
///
/// Ordered so taint provenance sets iterate deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallSite {
    /// Source file of the caller
    pub file: String,

    /// Line of the call
    pub line: u32,

    /// Modeled function being called
    pub callee: String,
}

impl CallSite {
    pub fn new(file: impl Into<String>, line: u32, callee: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            callee: callee.into(),
        }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.file, self.line, self.callee)
    }
}
