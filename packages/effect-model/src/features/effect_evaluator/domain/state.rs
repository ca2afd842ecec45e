/*
 * Abstract Machine State
 *
 * Allocation, lock, taint and contents tables for ONE explored path. The
 * host threads a state through its walk; `apply` never mutates its input,
 * every outcome owns a copy.
 */

use crate::shared::models::{CallSite, MemoryRef, Value};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ═══════════════════════════════════════════════════════════════════════════
// Allocation table
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocState {
    Owned,
    Released,
}

impl fmt::Display for AllocState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocState::Owned => write!(f, "owned"),
            AllocState::Released => write!(f, "released"),
        }
    }
}

/// One tracked block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub state: AllocState,
    /// Bytes, when the allocator's size argument was a known integer
    pub size: Option<u64>,
    /// `None` for memory adopted on release
    pub allocated_at: Option<CallSite>,
    pub released_at: Option<CallSite>,
}

/// Result of a release transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Release {
    /// Owned -> Released
    Released,
    /// Already released; carries where
    AlreadyReleased(Option<CallSite>),
    /// Untracked memory, now tracked as Released
    Adopted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationTable {
    blocks: FxHashMap<MemoryRef, Allocation>,
}

impl AllocationTable {
    pub fn get(&self, memory: &MemoryRef) -> Option<&Allocation> {
        self.blocks.get(memory)
    }

    pub fn state(&self, memory: &MemoryRef) -> Option<AllocState> {
        self.blocks.get(memory).map(|a| a.state)
    }

    pub fn is_released(&self, memory: &MemoryRef) -> bool {
        self.state(memory) == Some(AllocState::Released)
    }

    pub fn insert_owned(&mut self, memory: MemoryRef, size: Option<u64>, site: CallSite) {
        self.blocks.insert(
            memory,
            Allocation {
                state: AllocState::Owned,
                size,
                allocated_at: Some(site),
                released_at: None,
            },
        );
    }

    /// Owned -> Released; a second release leaves the table unchanged
    pub fn release(&mut self, memory: &MemoryRef, site: &CallSite) -> Release {
        match self.blocks.get_mut(memory) {
            Some(block) if block.state == AllocState::Released => {
                Release::AlreadyReleased(block.released_at.clone())
            }
            Some(block) => {
                block.state = AllocState::Released;
                block.released_at = Some(site.clone());
                Release::Released
            }
            None => {
                self.blocks.insert(
                    memory.clone(),
                    Allocation {
                        state: AllocState::Released,
                        size: None,
                        allocated_at: None,
                        released_at: Some(site.clone()),
                    },
                );
                Release::Adopted
            }
        }
    }

    /// Blocks still owned, sorted
    pub fn owned(&self) -> Vec<&MemoryRef> {
        let mut owned: Vec<&MemoryRef> = self
            .blocks
            .iter()
            .filter(|(_, a)| a.state == AllocState::Owned)
            .map(|(m, _)| m)
            .collect();
        owned.sort();
        owned
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Lock table
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    #[default]
    Unlocked,
    Locked { exclusive: bool, since: CallSite },
}

impl LockState {
    pub fn is_locked(&self) -> bool {
        matches!(self, LockState::Locked { .. })
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockState::Unlocked => write!(f, "unlocked"),
            LockState::Locked { since, .. } => write!(f, "locked since {}", since),
        }
    }
}

/// Policy shared by every lock in a group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockGroupPolicy {
    /// Composite acquire takes the parent's lock before the child's
    #[serde(default)]
    pub needs_parent_lock: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockTable {
    held: FxHashMap<MemoryRef, LockState>,
    groups: FxHashMap<MemoryRef, String>,
    policies: FxHashMap<String, LockGroupPolicy>,
}

impl LockTable {
    pub fn state(&self, lock: &MemoryRef) -> LockState {
        self.held.get(lock).cloned().unwrap_or_default()
    }

    pub fn is_locked(&self, lock: &MemoryRef) -> bool {
        self.held.contains_key(lock)
    }

    /// Unlocked -> Locked; `false` (and no change) if already held
    pub fn acquire(&mut self, lock: &MemoryRef, exclusive: bool, site: &CallSite) -> bool {
        if self.held.contains_key(lock) {
            return false;
        }
        self.held.insert(
            lock.clone(),
            LockState::Locked {
                exclusive,
                since: site.clone(),
            },
        );
        true
    }

    /// Locked -> Unlocked; `false` (and no change) if not held
    pub fn release(&mut self, lock: &MemoryRef) -> bool {
        self.held.remove(lock).is_some()
    }

    /// Currently held locks, sorted
    pub fn held(&self) -> Vec<&MemoryRef> {
        let mut held: Vec<&MemoryRef> = self.held.keys().collect();
        held.sort();
        held
    }

    pub fn assign_group(&mut self, lock: MemoryRef, group: impl Into<String>) {
        self.groups.insert(lock, group.into());
    }

    pub fn set_group_policy(&mut self, group: impl Into<String>, policy: LockGroupPolicy) {
        self.policies.insert(group.into(), policy);
    }

    pub fn group_of(&self, lock: &MemoryRef) -> Option<&str> {
        self.groups.get(lock).map(|g| g.as_str())
    }

    pub fn needs_parent_lock(&self, lock: &MemoryRef) -> bool {
        self.group_of(lock)
            .and_then(|g| self.policies.get(g))
            .map_or(false, |p| p.needs_parent_lock)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Taint table
// ═══════════════════════════════════════════════════════════════════════════

/// Taint of a value; provenance only ever grows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaintState {
    #[default]
    Clean,
    Tainted { provenance: BTreeSet<CallSite> },
}

impl TaintState {
    pub fn from_provenance(provenance: BTreeSet<CallSite>) -> Self {
        if provenance.is_empty() {
            TaintState::Clean
        } else {
            TaintState::Tainted { provenance }
        }
    }

    pub fn source(site: CallSite) -> Self {
        Self::from_provenance(BTreeSet::from([site]))
    }

    pub fn is_tainted(&self) -> bool {
        matches!(self, TaintState::Tainted { .. })
    }

    pub fn provenance(&self) -> Vec<&CallSite> {
        match self {
            TaintState::Clean => Vec::new(),
            TaintState::Tainted { provenance } => provenance.iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaintTable {
    sources: FxHashMap<MemoryRef, BTreeSet<CallSite>>,
}

impl TaintTable {
    pub fn add(&mut self, memory: MemoryRef, site: CallSite) {
        self.sources.entry(memory).or_default().insert(site);
    }

    pub fn extend(&mut self, memory: MemoryRef, provenance: impl IntoIterator<Item = CallSite>) {
        let mut provenance = provenance.into_iter().peekable();
        if provenance.peek().is_some() {
            self.sources.entry(memory).or_default().extend(provenance);
        }
    }

    pub fn state(&self, memory: &MemoryRef) -> TaintState {
        self.sources
            .get(memory)
            .map(|p| TaintState::from_provenance(p.clone()))
            .unwrap_or_default()
    }

    pub fn is_tainted(&self, memory: &MemoryRef) -> bool {
        self.sources.get(memory).map_or(false, |p| !p.is_empty())
    }

    pub fn provenance(&self, memory: &MemoryRef) -> Option<&BTreeSet<CallSite>> {
        self.sources.get(memory)
    }

    /// Tainted references, sorted
    pub fn tainted(&self) -> Vec<&MemoryRef> {
        let mut tainted: Vec<&MemoryRef> = self
            .sources
            .iter()
            .filter(|(_, p)| !p.is_empty())
            .map(|(m, _)| m)
            .collect();
        tainted.sort();
        tainted
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Contents
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Contents {
    Uninitialized,
    Initialized,
}

// ═══════════════════════════════════════════════════════════════════════════
// Abstract state
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbstractState {
    pub allocations: AllocationTable,
    pub locks: LockTable,
    pub taint: TaintTable,
    contents: FxHashMap<MemoryRef, Contents>,
}

impl AbstractState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self, memory: &MemoryRef) -> Option<Contents> {
        self.contents.get(memory).copied()
    }

    pub fn set_contents(&mut self, memory: MemoryRef, contents: Contents) {
        self.contents.insert(memory, contents);
    }

    /// Taint of whatever `value` refers to; non-references are clean
    pub fn value_taint(&self, value: &Value) -> TaintState {
        value
            .memory_ref()
            .map(|m| self.taint.state(&m))
            .unwrap_or_default()
    }

    pub fn is_released(&self, value: &Value) -> bool {
        value
            .memory_ref()
            .map_or(false, |m| self.allocations.is_released(&m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(line: u32) -> CallSite {
        CallSite::new("drivers/x.c", line, "test")
    }

    #[test]
    fn test_release_transitions() {
        let mut table = AllocationTable::default();
        let block = MemoryRef::storage("p");
        table.insert_owned(block.clone(), Some(16), site(1));

        assert_eq!(table.release(&block, &site(2)), Release::Released);
        assert_eq!(
            table.release(&block, &site(3)),
            Release::AlreadyReleased(Some(site(2)))
        );
        // The failed release did not overwrite where it was released.
        assert_eq!(table.get(&block).unwrap().released_at, Some(site(2)));
    }

    #[test]
    fn test_release_adopts_untracked() {
        let mut table = AllocationTable::default();
        let buf = MemoryRef::storage("buf");
        assert_eq!(table.release(&buf, &site(1)), Release::Adopted);
        assert!(table.is_released(&buf));
        assert!(matches!(
            table.release(&buf, &site(2)),
            Release::AlreadyReleased(_)
        ));
    }

    #[test]
    fn test_lock_transitions() {
        let mut locks = LockTable::default();
        let l = MemoryRef::storage("L");

        assert!(locks.acquire(&l, true, &site(1)));
        assert!(!locks.acquire(&l, true, &site(2)));
        assert_eq!(
            locks.state(&l),
            LockState::Locked {
                exclusive: true,
                since: site(1)
            }
        );
        assert!(locks.release(&l));
        assert!(!locks.release(&l));
        assert_eq!(locks.state(&l), LockState::Unlocked);
    }

    #[test]
    fn test_group_policy() {
        let mut locks = LockTable::default();
        let child = MemoryRef::storage("dev");
        locks.assign_group(child.clone(), "usb");
        assert!(!locks.needs_parent_lock(&child));

        locks.set_group_policy(
            "usb",
            LockGroupPolicy {
                needs_parent_lock: true,
            },
        );
        assert!(locks.needs_parent_lock(&child));
        assert!(!locks.needs_parent_lock(&MemoryRef::storage("other")));
    }

    #[test]
    fn test_taint_is_monotone() {
        let mut taint = TaintTable::default();
        let buf = MemoryRef::storage("buf");
        taint.add(buf.clone(), site(1));
        taint.add(buf.clone(), site(2));
        taint.extend(buf.clone(), Vec::new());

        let state = taint.state(&buf);
        assert!(state.is_tainted());
        assert_eq!(state.provenance().len(), 2);

        taint.extend(MemoryRef::storage("clean"), Vec::new());
        assert!(!taint.is_tainted(&MemoryRef::storage("clean")));
        assert_eq!(taint.len(), 1);
    }

    #[test]
    fn test_value_taint_of_non_reference() {
        let state = AbstractState::new();
        assert_eq!(state.value_taint(&Value::Int(3)), TaintState::Clean);
        assert!(!state.is_released(&Value::Null));
    }
}
