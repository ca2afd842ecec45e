/*
 * Effect Evaluator
 *
 * apply(descriptor, bindings, state) -> outcomes
 *
 * - Input state is never mutated; every outcome owns its state.
 * - Defects go to the sink and onto the outcome they were found on.
 * - Terminate yields no outcomes. Sequence is a left fold over outcomes.
 */

use crate::config::EvaluatorConfig;
use crate::features::defect_sink::{Defect, DefectKind, DefectSink, NullSink};
use crate::features::effect_evaluator::domain::{AbstractState, CallBindings, Outcome};
use crate::features::effect_evaluator::error::{EvalError, Result};
use crate::features::effect_evaluator::infrastructure::{
    locks, memory, pointer, taint, EffectContext,
};
use crate::features::effect_registry::domain::EffectDescriptor;
use crate::shared::models::{CallSite, Value};
use std::sync::Arc;

/// Applies effect descriptors to abstract state
///
/// Holds no per-path state: one evaluator serves every path and thread.
#[derive(Clone)]
pub struct EffectEvaluator {
    config: EvaluatorConfig,
    sink: Arc<dyn DefectSink>,
}

impl std::fmt::Debug for EffectEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectEvaluator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for EffectEvaluator {
    fn default() -> Self {
        Self::new(EvaluatorConfig::default(), Arc::new(NullSink))
    }
}

impl EffectEvaluator {
    pub fn new(config: EvaluatorConfig, sink: Arc<dyn DefectSink>) -> Self {
        Self { config, sink }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Every reachable outcome of the call
    pub fn apply(
        &self,
        descriptor: &EffectDescriptor,
        bindings: &CallBindings,
        state: &AbstractState,
    ) -> Result<Vec<Outcome>> {
        if let Some(&param) = descriptor.referenced_params().last() {
            if param >= bindings.len() {
                return Err(EvalError::ArityMismatch {
                    callee: bindings.site.callee.clone(),
                    param,
                    bound: bindings.len(),
                });
            }
        }

        let ctx = EffectContext::new(&self.config, bindings, self.sink.as_ref());
        let outcomes = self.step(&ctx, descriptor, Outcome::initial(state.clone()));
        tracing::debug!(
            "{}: {} -> {} outcome(s)",
            bindings.site,
            descriptor,
            outcomes.len()
        );
        Ok(outcomes)
    }

    fn step(
        &self,
        ctx: &EffectContext<'_>,
        descriptor: &EffectDescriptor,
        outcome: Outcome,
    ) -> Vec<Outcome> {
        match descriptor {
            EffectDescriptor::Allocate { size, nullable } => {
                memory::allocate(ctx, *size, *nullable, outcome)
            }
            EffectDescriptor::AllocateNoSize => memory::allocate(ctx, None, true, outcome),
            EffectDescriptor::Free { target } => vec![memory::free(ctx, *target, outcome)],
            EffectDescriptor::Reallocate { old, size } => {
                memory::reallocate(ctx, *old, *size, outcome)
            }
            EffectDescriptor::WriteAll { target } => {
                vec![memory::write_all(ctx, *target, outcome)]
            }
            EffectDescriptor::TaintArguments {
                params,
                taints_return,
            } => vec![taint::taint_arguments(ctx, params, *taints_return, outcome)],
            EffectDescriptor::FormatStringSink { fmt } => {
                vec![taint::format_string_sink(ctx, *fmt, outcome)]
            }
            EffectDescriptor::LockAcquire { lock, exclusive } => {
                vec![locks::acquire(ctx, *lock, *exclusive, outcome)]
            }
            EffectDescriptor::LockRelease { lock } => vec![locks::release(ctx, *lock, outcome)],
            EffectDescriptor::TryLock { lock } => locks::try_lock(ctx, *lock, outcome),
            EffectDescriptor::InterruptibleLock { lock } => {
                locks::interruptible_lock(ctx, *lock, outcome)
            }
            EffectDescriptor::CompositeLockAcquire { child, parent } => {
                vec![locks::composite_acquire(ctx, *child, *parent, outcome)]
            }
            EffectDescriptor::CompositeLockRelease { child, parent } => {
                vec![locks::composite_release(ctx, *child, *parent, outcome)]
            }
            EffectDescriptor::ClassifyPointer {
                target,
                include_null,
            } => pointer::classify_pointer(ctx, *target, *include_null, outcome),
            EffectDescriptor::ReturnConstant { value } => {
                vec![pointer::return_constant(*value, outcome)]
            }
            EffectDescriptor::ReturnArgument { param } => {
                vec![pointer::return_argument(ctx, *param, outcome)]
            }
            EffectDescriptor::NondetBool => pointer::nondet_bool(ctx, outcome),
            EffectDescriptor::Sequence { steps } => {
                steps.iter().fold(vec![outcome], |outcomes, step| {
                    outcomes
                        .into_iter()
                        .flat_map(|o| self.step(ctx, step, o))
                        .collect()
                })
            }
            EffectDescriptor::Terminate => {
                tracing::trace!("{}: path terminates", ctx.site());
                Vec::new()
            }
            EffectDescriptor::Identity => vec![outcome],
        }
    }

    /// Host-side dereference of `value`; reports use-after-release
    pub fn observe_dereference(
        &self,
        site: &CallSite,
        value: &Value,
        state: &AbstractState,
    ) -> Option<Defect> {
        let memory = value.memory_ref()?;
        if !state.allocations.is_released(&memory) {
            return None;
        }
        let defect = Defect::new(
            DefectKind::UseAfterRelease,
            site.clone(),
            format!("{} dereferenced after release", memory),
        )
        .concerning(memory);
        self.sink.record(defect.clone());
        Some(defect)
    }
}
