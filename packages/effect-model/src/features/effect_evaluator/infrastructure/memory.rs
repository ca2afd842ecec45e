//! Allocation-family effects
//!
//! Allocate, Free, Reallocate, WriteAll, and the liveness check shared by
//! every effect that touches a buffer.

use super::context::EffectContext;
use crate::features::branch_resolver::{resolve, BranchCondition};
use crate::features::defect_sink::DefectKind;
use crate::features::effect_evaluator::domain::{Contents, Outcome, OutcomeLabel, Release};
use crate::features::effect_registry::domain::{ParamIndex, SizeExpr};
use crate::shared::models::{err_ptr, CallSite, MemoryRef, ObjectId, Value, ENOMEM};
use std::collections::BTreeSet;

/// Value the failure branch of an allocator returns
fn failure_value(nullable: bool) -> Value {
    if nullable {
        Value::Null
    } else {
        Value::Address(err_ptr(ENOMEM))
    }
}

fn resolve_size(ctx: &EffectContext<'_>, size: Option<SizeExpr>) -> Option<u64> {
    match size? {
        SizeExpr::Bytes(n) => Some(n),
        SizeExpr::Param(p) => ctx.arg(p).as_int().and_then(|n| u64::try_from(n).ok()),
    }
}

/// Success and failure branches of an allocation
///
/// `success` and `failure` are the states each branch starts from; they
/// differ only for reallocation that keeps the old block on failure.
fn fork_allocation(
    ctx: &EffectContext<'_>,
    size: Option<u64>,
    nullable: bool,
    inherited: BTreeSet<CallSite>,
    success: Outcome,
    failure: Outcome,
) -> Vec<Outcome> {
    let site = ctx.site();
    let fork = resolve(site, BranchCondition::AllocationSucceeds);

    let id = ObjectId::fresh();
    let block = MemoryRef::Object(id);
    let mut success = success
        .labeled(OutcomeLabel::Success)
        .assuming(fork.taken);
    success
        .state
        .allocations
        .insert_owned(block.clone(), size, site.clone());
    success
        .state
        .set_contents(block.clone(), Contents::Uninitialized);
    success.state.taint.extend(block.clone(), inherited);
    let taint = success.state.taint.state(&block);
    let success = success.returning_tainted(Value::Object(id), taint);

    let failure = failure
        .labeled(OutcomeLabel::Failure)
        .assuming(fork.not_taken)
        .returning(failure_value(nullable));

    tracing::debug!("{}: {} conjured (size {:?})", site, id, size);
    vec![success, failure]
}

pub fn allocate(
    ctx: &EffectContext<'_>,
    size: Option<SizeExpr>,
    nullable: bool,
    outcome: Outcome,
) -> Vec<Outcome> {
    let size = resolve_size(ctx, size);
    fork_allocation(ctx, size, nullable, BTreeSet::new(), outcome.clone(), outcome)
}

/// Release `target`; never forks
pub fn free(ctx: &EffectContext<'_>, target: ParamIndex, mut outcome: Outcome) -> Outcome {
    let value = ctx.arg(target);
    let Some(memory) = value.memory_ref() else {
        // Null, error sentinels, raw addresses and unknowns: nothing tracked to release.
        tracing::trace!("{}: release of untracked value {} ignored", ctx.site(), value);
        return outcome;
    };

    match outcome.state.allocations.release(&memory, ctx.site()) {
        Release::Released => {
            tracing::trace!("{}: {} released", ctx.site(), memory);
        }
        Release::Adopted => {
            tracing::debug!("{}: {} was untracked, now released", ctx.site(), memory);
        }
        Release::AlreadyReleased(previous) => {
            let description = match previous {
                Some(at) => format!("{} released again (first released at {})", memory, at),
                None => format!("{} released again", memory),
            };
            ctx.report_on(&mut outcome, DefectKind::DoubleRelease, memory, description);
        }
    }
    outcome
}

/// Free(old) then Allocate(size); the new block inherits old's taint
pub fn reallocate(
    ctx: &EffectContext<'_>,
    old: ParamIndex,
    size: SizeExpr,
    outcome: Outcome,
) -> Vec<Outcome> {
    let inherited: BTreeSet<CallSite> = ctx
        .arg(old)
        .memory_ref()
        .and_then(|m| outcome.state.taint.provenance(&m).cloned())
        .unwrap_or_default();
    let size = resolve_size(ctx, Some(size));

    if ctx.config.realloc_failure_keeps_old {
        let freed = free(ctx, old, outcome.clone());
        fork_allocation(ctx, size, true, inherited, freed, outcome)
    } else {
        let freed = free(ctx, old, outcome);
        fork_allocation(ctx, size, true, inherited, freed.clone(), freed)
    }
}

/// Whole extent of `target` becomes initialized
pub fn write_all(ctx: &EffectContext<'_>, target: ParamIndex, mut outcome: Outcome) -> Outcome {
    let value = ctx.arg(target);
    check_live(ctx, &mut outcome, value, "written");
    if let Some(memory) = value.memory_ref() {
        outcome.state.set_contents(memory, Contents::Initialized);
    }
    outcome
}

/// Record use-after-release when `value` names a released block
///
/// Reported at most once per block within one call, however many steps
/// of a sequence touch it.
pub fn check_live(ctx: &EffectContext<'_>, outcome: &mut Outcome, value: &Value, access: &str) {
    let Some(memory) = value.memory_ref() else {
        return;
    };
    if !outcome.state.allocations.is_released(&memory) {
        return;
    }
    let reported = outcome.defects.iter().any(|d| {
        d.kind == DefectKind::UseAfterRelease && d.memory.as_ref() == Some(&memory)
    });
    if reported {
        tracing::trace!("{}: {} {} after release, already reported", ctx.site(), memory, access);
        return;
    }
    let description = format!("{} {} after release", memory, access);
    ctx.report_on(outcome, DefectKind::UseAfterRelease, memory, description);
}
