//! Taint sources and format-string sinks

use super::context::EffectContext;
use super::memory::check_live;
use crate::features::defect_sink::DefectKind;
use crate::features::effect_evaluator::domain::{Observation, Outcome, TaintState};
use crate::features::effect_registry::domain::ParamIndex;
use crate::shared::models::Value;

/// Each argument's storage gains this call site as a taint source
pub fn taint_arguments(
    ctx: &EffectContext<'_>,
    params: &[ParamIndex],
    taints_return: bool,
    mut outcome: Outcome,
) -> Outcome {
    for &param in params {
        let value = ctx.arg(param);
        check_live(ctx, &mut outcome, value, "tainted");
        match value.memory_ref() {
            Some(memory) => outcome.state.taint.add(memory, ctx.site().clone()),
            None => tracing::trace!("{}: cannot taint {}", ctx.site(), value),
        }
    }

    if taints_return {
        outcome = outcome.returning_tainted(Value::Unknown, TaintState::source(ctx.site().clone()));
    }
    outcome
}

/// The value reaches a format string; taint state is left alone
pub fn format_string_sink(ctx: &EffectContext<'_>, fmt: ParamIndex, mut outcome: Outcome) -> Outcome {
    let value = ctx.arg(fmt);
    check_live(ctx, &mut outcome, value, "used as a format string");

    let taint = outcome.state.value_taint(value);
    if ctx.config.report_tainted_sinks && taint.is_tainted() {
        let sources: Vec<String> = taint.provenance().iter().map(|s| s.to_string()).collect();
        ctx.report(
            &mut outcome,
            DefectKind::TaintedSink,
            format!(
                "{} reaches a format string (tainted at {})",
                value,
                sources.join(", ")
            ),
        );
    }

    outcome.observations.push(Observation::FormatStringSink {
        site: ctx.site().clone(),
        value: value.clone(),
        taint,
    });
    outcome
}
