//! Defect records

use crate::shared::models::{CallSite, MemoryRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of modeled defect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DefectKind {
    DoubleRelease,
    UseAfterRelease,
    DoubleLock,
    UnbalancedUnlock,
    TaintedSink,
}

impl DefectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DoubleRelease => "double-release",
            Self::UseAfterRelease => "use-after-release",
            Self::DoubleLock => "double-lock",
            Self::UnbalancedUnlock => "unbalanced-unlock",
            Self::TaintedSink => "tainted-sink",
        }
    }
}

impl fmt::Display for DefectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `(kind, call site, description)`, plus the memory it concerns when known
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Defect {
    pub kind: DefectKind,
    pub site: CallSite,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryRef>,
}

impl Defect {
    pub fn new(kind: DefectKind, site: CallSite, description: impl Into<String>) -> Self {
        Self {
            kind,
            site,
            description: description.into(),
            memory: None,
        }
    }

    pub fn concerning(mut self, memory: MemoryRef) -> Self {
        self.memory = Some(memory);
        self
    }
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.site, self.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_are_kebab_case() {
        assert_eq!(DefectKind::DoubleRelease.to_string(), "double-release");
        assert_eq!(
            serde_json::to_string(&DefectKind::UnbalancedUnlock).unwrap(),
            "\"unbalanced-unlock\""
        );
    }

    #[test]
    fn test_display() {
        let defect = Defect::new(
            DefectKind::DoubleLock,
            CallSite::new("fs/inode.c", 7, "mutex_lock"),
            "&i_mutex is already held",
        );
        assert_eq!(
            defect.to_string(),
            "[double-lock] fs/inode.c:7 (mutex_lock): &i_mutex is already held"
        );
    }
}
