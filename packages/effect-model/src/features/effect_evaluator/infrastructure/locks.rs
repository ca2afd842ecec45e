//! Lock effects
//!
//! Invalid transitions (acquire while held, release while free) are reported
//! and leave the lock table unchanged.

use super::context::EffectContext;
use crate::features::branch_resolver::{resolve, BranchCondition};
use crate::features::defect_sink::DefectKind;
use crate::features::effect_evaluator::domain::{LockState, Outcome, OutcomeLabel};
use crate::features::effect_registry::domain::ParamIndex;
use crate::shared::models::{MemoryRef, Value, EINTR};

fn acquire_ref(ctx: &EffectContext<'_>, lock: &MemoryRef, exclusive: bool, outcome: &mut Outcome) {
    if outcome.state.locks.acquire(lock, exclusive, ctx.site()) {
        tracing::trace!("{}: {} acquired", ctx.site(), lock);
        return;
    }
    let held = outcome.state.locks.state(lock);
    let description = match held {
        LockState::Locked { since, .. } => {
            format!("{} acquired while already held (since {})", lock, since)
        }
        LockState::Unlocked => format!("{} acquired while already held", lock),
    };
    ctx.report(outcome, DefectKind::DoubleLock, description);
}

fn release_ref(ctx: &EffectContext<'_>, lock: &MemoryRef, outcome: &mut Outcome) {
    if outcome.state.locks.release(lock) {
        tracing::trace!("{}: {} released", ctx.site(), lock);
        return;
    }
    ctx.report(
        outcome,
        DefectKind::UnbalancedUnlock,
        format!("{} released while not held", lock),
    );
}

/// Lock identity bound to `param`, if the value names one
fn lock_ref(ctx: &EffectContext<'_>, param: ParamIndex) -> Option<MemoryRef> {
    let value = ctx.arg(param);
    let lock = value.memory_ref();
    if lock.is_none() {
        tracing::trace!("{}: lock argument {} has no identity", ctx.site(), value);
    }
    lock
}

pub fn acquire(
    ctx: &EffectContext<'_>,
    lock: ParamIndex,
    exclusive: bool,
    mut outcome: Outcome,
) -> Outcome {
    if let Some(lock) = lock_ref(ctx, lock) {
        acquire_ref(ctx, &lock, exclusive, &mut outcome);
    }
    outcome
}

pub fn release(ctx: &EffectContext<'_>, lock: ParamIndex, mut outcome: Outcome) -> Outcome {
    if let Some(lock) = lock_ref(ctx, lock) {
        release_ref(ctx, &lock, &mut outcome);
    }
    outcome
}

/// Acquired (returns 1) or not (returns 0)
///
/// A lock already held can only fail; trying it is not a defect.
pub fn try_lock(ctx: &EffectContext<'_>, lock: ParamIndex, outcome: Outcome) -> Vec<Outcome> {
    let lock = lock_ref(ctx, lock);
    if let Some(held) = lock.as_ref().filter(|l| outcome.state.locks.is_locked(l)) {
        tracing::trace!("{}: {} already held, trylock fails", ctx.site(), held);
        return vec![outcome
            .labeled(OutcomeLabel::NotAcquired)
            .returning(Value::Int(0))];
    }

    let fork = resolve(ctx.site(), BranchCondition::LockAcquired);
    let mut acquired = outcome
        .clone()
        .labeled(OutcomeLabel::Acquired)
        .assuming(fork.taken)
        .returning(Value::Int(1));
    if let Some(lock) = &lock {
        acquire_ref(ctx, lock, true, &mut acquired);
    }
    let not_acquired = outcome
        .labeled(OutcomeLabel::NotAcquired)
        .assuming(fork.not_taken)
        .returning(Value::Int(0));

    vec![acquired, not_acquired]
}

/// Acquired (returns 0) or interrupted by a signal (returns -EINTR)
pub fn interruptible_lock(
    ctx: &EffectContext<'_>,
    lock: ParamIndex,
    outcome: Outcome,
) -> Vec<Outcome> {
    let lock = lock_ref(ctx, lock);
    let fork = resolve(ctx.site(), BranchCondition::LockInterrupted);

    let mut acquired = outcome
        .clone()
        .labeled(OutcomeLabel::Acquired)
        .assuming(fork.not_taken)
        .returning(Value::Int(0));
    if let Some(lock) = &lock {
        acquire_ref(ctx, lock, true, &mut acquired);
    }
    let interrupted = outcome
        .labeled(OutcomeLabel::Interrupted)
        .assuming(fork.taken)
        .returning(Value::Int(-EINTR));

    vec![acquired, interrupted]
}

/// Parent lock is part of the operation only when the child's group asks
/// for it and a parent is bound.
fn composite_parent(
    ctx: &EffectContext<'_>,
    child: &MemoryRef,
    parent: ParamIndex,
    outcome: &Outcome,
) -> Option<MemoryRef> {
    if !outcome.state.locks.needs_parent_lock(child) {
        return None;
    }
    lock_ref(ctx, parent)
}

/// Parent then child
pub fn composite_acquire(
    ctx: &EffectContext<'_>,
    child: ParamIndex,
    parent: ParamIndex,
    mut outcome: Outcome,
) -> Outcome {
    let Some(child) = lock_ref(ctx, child) else {
        return outcome;
    };
    if let Some(parent) = composite_parent(ctx, &child, parent, &outcome) {
        acquire_ref(ctx, &parent, true, &mut outcome);
    }
    acquire_ref(ctx, &child, true, &mut outcome);
    outcome
}

/// Child then parent
pub fn composite_release(
    ctx: &EffectContext<'_>,
    child: ParamIndex,
    parent: ParamIndex,
    mut outcome: Outcome,
) -> Outcome {
    let Some(child) = lock_ref(ctx, child) else {
        return outcome;
    };
    let parent = composite_parent(ctx, &child, parent, &outcome);
    release_ref(ctx, &child, &mut outcome);
    if let Some(parent) = parent {
        release_ref(ctx, &parent, &mut outcome);
    }
    outcome
}
