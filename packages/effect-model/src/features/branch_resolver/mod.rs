//! Nondeterministic Branch Resolver
//!
//! Every bifurcating effect (allocation, trylock, interruptible lock, feature
//! probe, pointer classification of an unknown value) asks for a [`Fork`]: a
//! fresh condition with both of its facts. Nothing is cached; two calls at the
//! same site are two independent events.

use crate::shared::models::CallSite;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONDITION_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one nondeterministic event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConditionId(pub u64);

impl ConditionId {
    pub fn fresh() -> Self {
        Self(NEXT_CONDITION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConditionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// What the nondeterministic event decides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchCondition {
    AllocationSucceeds,
    LockAcquired,
    LockInterrupted,
    FeaturePresent,
    PointerNotValid,
}

impl BranchCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AllocationSucceeds => "allocation-succeeds",
            Self::LockAcquired => "lock-acquired",
            Self::LockInterrupted => "lock-interrupted",
            Self::FeaturePresent => "feature-present",
            Self::PointerNotValid => "pointer-not-valid",
        }
    }
}

impl fmt::Display for BranchCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One side of a resolved condition, carried by the outcome that assumes it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BranchFact {
    pub id: ConditionId,
    pub condition: BranchCondition,
    pub site: CallSite,
    pub taken: bool,
}

impl BranchFact {
    /// The same condition, decided the other way
    pub fn negated(&self) -> Self {
        Self {
            taken: !self.taken,
            ..self.clone()
        }
    }
}

impl fmt::Display for BranchFact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.taken { "" } else { "!" };
        write!(f, "{}{}[{}] @ {}", sign, self.condition, self.id, self.site)
    }
}

/// Both facts of a fresh condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fork {
    pub taken: BranchFact,
    pub not_taken: BranchFact,
}

impl Fork {
    pub fn id(&self) -> ConditionId {
        self.taken.id
    }

    /// `(true, fact)` then `(false, fact)`
    pub fn branches(self) -> [(bool, BranchFact); 2] {
        [(true, self.taken), (false, self.not_taken)]
    }
}

/// Resolve a nondeterministic condition at `site`
///
/// Both answers, never one: the caller explores each.
pub fn resolve(site: &CallSite, condition: BranchCondition) -> Fork {
    let taken = BranchFact {
        id: ConditionId::fresh(),
        condition,
        site: site.clone(),
        taken: true,
    };
    let not_taken = taken.negated();
    tracing::trace!("fork {} at {}", taken.id, site);
    Fork { taken, not_taken }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> CallSite {
        CallSite::new("mm/slab.c", 10, "kmalloc")
    }

    #[test]
    fn test_resolve_yields_both_facts() {
        let fork = resolve(&site(), BranchCondition::AllocationSucceeds);
        assert!(fork.taken.taken);
        assert!(!fork.not_taken.taken);
        assert_eq!(fork.taken.id, fork.not_taken.id);
        assert_eq!(fork.taken.condition, BranchCondition::AllocationSucceeds);
    }

    #[test]
    fn test_resolutions_never_reused() {
        let first = resolve(&site(), BranchCondition::LockAcquired);
        let second = resolve(&site(), BranchCondition::LockAcquired);
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn test_branches_order() {
        let branches = resolve(&site(), BranchCondition::FeaturePresent).branches();
        assert!(branches[0].0 && branches[0].1.taken);
        assert!(!branches[1].0 && !branches[1].1.taken);
    }

    #[test]
    fn test_display() {
        let fact = BranchFact {
            id: ConditionId(3),
            condition: BranchCondition::LockAcquired,
            site: CallSite::new("a.c", 1, "mutex_trylock"),
            taken: false,
        };
        assert_eq!(fact.to_string(), "!lock-acquired[c3] @ a.c:1 (mutex_trylock)");
    }
}
