//! Value-producing effects: pointer classification, constants, feature probes

use super::context::EffectContext;
use crate::features::branch_resolver::{resolve, BranchCondition};
use crate::features::effect_evaluator::domain::{Outcome, OutcomeLabel};
use crate::features::effect_registry::domain::ParamIndex;
use crate::shared::models::{PointerClass, Value};

fn bool_value(b: bool) -> Value {
    Value::Int(i64::from(b))
}

fn bool_label(b: bool) -> OutcomeLabel {
    if b {
        OutcomeLabel::True
    } else {
        OutcomeLabel::False
    }
}

/// `IS_ERR` / `IS_ERR_OR_NULL`
///
/// Never releases the pointee. An undetermined pointer forks.
pub fn classify_pointer(
    ctx: &EffectContext<'_>,
    target: ParamIndex,
    include_null: bool,
    outcome: Outcome,
) -> Vec<Outcome> {
    let value = ctx.arg(target);
    match value.pointer_class(ctx.config.max_errno) {
        Some(class) => {
            let flagged = match class {
                PointerClass::ErrorSentinel => true,
                PointerClass::Null => include_null,
                PointerClass::Valid => false,
            };
            vec![outcome
                .labeled(bool_label(flagged))
                .returning(bool_value(flagged))]
        }
        None => {
            let fork = resolve(ctx.site(), BranchCondition::PointerNotValid);
            fork.branches()
                .into_iter()
                .map(|(flagged, fact)| {
                    outcome
                        .clone()
                        .labeled(bool_label(flagged))
                        .assuming(fact)
                        .returning(bool_value(flagged))
                })
                .collect()
        }
    }
}

pub fn return_constant(value: i64, outcome: Outcome) -> Outcome {
    outcome.returning(Value::Int(value))
}

/// The argument itself, with whatever taint it carries
pub fn return_argument(ctx: &EffectContext<'_>, param: ParamIndex, outcome: Outcome) -> Outcome {
    let value = ctx.arg(param).clone();
    let taint = outcome.state.value_taint(&value);
    outcome.returning_tainted(value, taint)
}

/// 1 or 0, both explorable
pub fn nondet_bool(ctx: &EffectContext<'_>, outcome: Outcome) -> Vec<Outcome> {
    let fork = resolve(ctx.site(), BranchCondition::FeaturePresent);
    fork.branches()
        .into_iter()
        .map(|(present, fact)| {
            outcome
                .clone()
                .labeled(bool_label(present))
                .assuming(fact)
                .returning(bool_value(present))
        })
        .collect()
}
