//! Per-call evaluation context

use crate::config::EvaluatorConfig;
use crate::features::defect_sink::{Defect, DefectKind, DefectSink};
use crate::features::effect_evaluator::domain::{CallBindings, Outcome};
use crate::shared::models::{CallSite, MemoryRef, Value};

static UNBOUND: Value = Value::Unknown;

/// Everything an effect handler reads besides the outcome it transforms
pub struct EffectContext<'a> {
    pub config: &'a EvaluatorConfig,
    pub bindings: &'a CallBindings,
    sink: &'a dyn DefectSink,
}

impl<'a> EffectContext<'a> {
    pub fn new(
        config: &'a EvaluatorConfig,
        bindings: &'a CallBindings,
        sink: &'a dyn DefectSink,
    ) -> Self {
        Self {
            config,
            bindings,
            sink,
        }
    }

    pub fn site(&self) -> &CallSite {
        &self.bindings.site
    }

    /// Argument `index`; arity is checked before any handler runs
    pub fn arg(&self, index: usize) -> &Value {
        self.bindings.arg(index).unwrap_or(&UNBOUND)
    }

    /// Record a defect in the sink and on the outcome
    pub fn report(&self, outcome: &mut Outcome, kind: DefectKind, description: String) {
        self.record(outcome, Defect::new(kind, self.site().clone(), description));
    }

    /// Like `report`, tagged with the memory the defect concerns
    pub fn report_on(
        &self,
        outcome: &mut Outcome,
        kind: DefectKind,
        memory: MemoryRef,
        description: String,
    ) {
        self.record(
            outcome,
            Defect::new(kind, self.site().clone(), description).concerning(memory),
        );
    }

    fn record(&self, outcome: &mut Outcome, defect: Defect) {
        tracing::debug!("defect {}", defect);
        self.sink.record(defect.clone());
        outcome.defects.push(defect);
    }
}
