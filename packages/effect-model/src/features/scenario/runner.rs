/*
 * Scenario Runner
 *
 * Stand-in for the host engine on straight-line code:
 * - every step is applied to every live path
 * - each outcome becomes its own path (state, variables, facts)
 * - `expect` prunes paths, Terminate ends them
 * - unmodeled callees get the host's generic treatment (unknown return)
 *
 * Paths at one step are advanced in parallel; the registry is shared
 * read-only and the evaluator's sink serializes defect writes.
 */

use super::error::{Result, ScenarioError};
use super::model::{Scenario, ScenarioCall, ScenarioStep};
use crate::config::ScenarioConfig;
use crate::features::branch_resolver::BranchFact;
use crate::features::defect_sink::{Defect, DefectKind};
use crate::features::effect_evaluator::{
    AbstractState, CallBindings, EffectEvaluator, LockGroupPolicy, Observation, Outcome,
    OutcomeLabel, TaintState,
};
use crate::features::effect_registry::EffectRegistry;
use crate::shared::models::{CallSite, MemoryRef, ObjectId, Value};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Callee name of call sites that come from scenario setup
pub const SETUP_CALLEE: &str = "<setup>";

/// One explored path
#[derive(Debug, Clone)]
struct ExplorationPath {
    state: AbstractState,
    env: FxHashMap<String, Value>,
    labels: Vec<OutcomeLabel>,
    facts: Vec<BranchFact>,
    defects: Vec<Defect>,
    observations: Vec<Observation>,
}

impl ExplorationPath {
    fn new(state: AbstractState) -> Self {
        Self {
            state,
            env: FxHashMap::default(),
            labels: Vec::new(),
            facts: Vec::new(),
            defects: Vec::new(),
            observations: Vec::new(),
        }
    }

    /// Path continued through `outcome` of a call
    fn follow(&self, outcome: Outcome, bind: Option<&str>) -> Self {
        let mut next = Self {
            state: outcome.state,
            env: self.env.clone(),
            labels: self.labels.clone(),
            facts: self.facts.clone(),
            defects: self.defects.clone(),
            observations: self.observations.clone(),
        };
        next.labels.push(outcome.label);
        next.facts.extend(outcome.facts);
        next.defects.extend(outcome.defects);
        next.observations.extend(outcome.observations);
        if let Some(name) = bind {
            let value = match outcome.return_value {
                Some(ret) => next.bind_return(ret.value, ret.taint),
                None => Value::Unknown,
            };
            next.env.insert(name.to_string(), value);
        }
        next
    }

    /// Value a variable holds after binding a return; taint lives in the
    /// taint table, so a tainted return without a reference gets one.
    fn bind_return(&mut self, value: Value, taint: TaintState) -> Value {
        let TaintState::Tainted { provenance } = taint else {
            return value;
        };
        let (value, memory) = match value.memory_ref() {
            Some(memory) => (value, memory),
            None => {
                let id = ObjectId::fresh();
                (Value::Object(id), MemoryRef::Object(id))
            }
        };
        self.state.taint.extend(memory, provenance);
        value
    }

    fn summarize(self, terminated: bool) -> PathSummary {
        let refs = |refs: Vec<&MemoryRef>| -> Vec<String> {
            refs.into_iter().map(|m| m.to_string()).collect()
        };
        PathSummary {
            labels: self.labels,
            terminated,
            facts: self.facts.iter().map(|f| f.to_string()).collect(),
            held_locks: refs(self.state.locks.held()),
            owned: refs(self.state.allocations.owned()),
            tainted: refs(self.state.taint.tainted()),
            bindings: self.env.into_iter().collect(),
            defects: self.defects,
            observations: self.observations,
        }
    }
}

/// What one step did to one path
#[derive(Debug, Default)]
struct Advanced {
    live: Vec<ExplorationPath>,
    terminated: Option<ExplorationPath>,
    pruned: usize,
}

/// Path at the end of the scenario (or where it terminated)
#[derive(Debug, Clone, Serialize)]
pub struct PathSummary {
    /// Outcome label of every call on the path
    pub labels: Vec<OutcomeLabel>,
    /// Ended in a call that never returns
    pub terminated: bool,
    pub facts: Vec<String>,
    pub defects: Vec<Defect>,
    pub observations: Vec<Observation>,
    pub bindings: BTreeMap<String, Value>,
    pub held_locks: Vec<String>,
    pub owned: Vec<String>,
    pub tainted: Vec<String>,
}

impl PathSummary {
    pub fn has_defect(&self, kind: DefectKind) -> bool {
        self.defects.iter().any(|d| d.kind == kind)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub paths: Vec<PathSummary>,
    /// Outcomes dropped by `expect`
    pub pruned: usize,
    /// Live paths were cut to `max_paths` at some step
    pub truncated: bool,
}

impl ScenarioReport {
    /// Distinct defects over all paths, first-seen order
    pub fn defects(&self) -> Vec<&Defect> {
        let mut seen: Vec<&Defect> = Vec::new();
        for defect in self.paths.iter().flat_map(|p| p.defects.iter()) {
            if !seen.contains(&defect) {
                seen.push(defect);
            }
        }
        seen
    }

    pub fn has_defect(&self, kind: DefectKind) -> bool {
        self.paths.iter().any(|p| p.has_defect(kind))
    }

    pub fn count(&self, kind: DefectKind) -> usize {
        self.defects().iter().filter(|d| d.kind == kind).count()
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "scenario: {}", self.scenario)?;
        writeln!(
            f,
            "paths: {} (pruned {}{})",
            self.paths.len(),
            self.pruned,
            if self.truncated { ", truncated" } else { "" }
        )?;
        for (i, path) in self.paths.iter().enumerate() {
            let labels: Vec<&str> = path.labels.iter().map(|l| l.as_str()).collect();
            writeln!(
                f,
                "  #{} [{}]{}",
                i,
                labels.join(" -> "),
                if path.terminated { " (terminated)" } else { "" }
            )?;
            for defect in &path.defects {
                writeln!(f, "      {}", defect)?;
            }
        }
        let defects = self.defects();
        if defects.is_empty() {
            writeln!(f, "no defects")?;
        } else {
            writeln!(f, "defects: {}", defects.len())?;
        }
        Ok(())
    }
}

/// Explores a scenario against a registry
pub struct ScenarioRunner<'r> {
    registry: &'r EffectRegistry,
    evaluator: EffectEvaluator,
    config: ScenarioConfig,
}

impl<'r> ScenarioRunner<'r> {
    pub fn new(registry: &'r EffectRegistry, evaluator: EffectEvaluator, config: ScenarioConfig) -> Self {
        Self {
            registry,
            evaluator,
            config,
        }
    }

    /// State every path starts from
    pub fn initial_state(&self, scenario: &Scenario) -> AbstractState {
        let setup_site = CallSite::new(scenario.file.as_str(), 0, SETUP_CALLEE);
        let mut state = AbstractState::new();

        for group in &scenario.setup.lock_groups {
            state.locks.set_group_policy(
                group.name.as_str(),
                LockGroupPolicy {
                    needs_parent_lock: group.needs_parent_lock,
                },
            );
            for member in &group.members {
                state
                    .locks
                    .assign_group(MemoryRef::storage(member.as_str()), group.name.as_str());
            }
        }
        for name in &scenario.setup.tainted {
            state
                .taint
                .add(MemoryRef::storage(name.as_str()), setup_site.clone());
        }
        for name in &scenario.setup.owned {
            state.allocations.insert_owned(
                MemoryRef::storage(name.as_str()),
                None,
                setup_site.clone(),
            );
        }
        state
    }

    pub fn run(&self, scenario: &Scenario) -> Result<ScenarioReport> {
        scenario.validate()?;
        tracing::info!(
            "running scenario '{}' ({} steps)",
            scenario.name,
            scenario.steps.len()
        );

        let mut live = vec![ExplorationPath::new(self.initial_state(scenario))];
        let mut finished: Vec<PathSummary> = Vec::new();
        let mut pruned = 0;
        let mut truncated = false;

        for (index, step) in scenario.steps.iter().enumerate() {
            if live.is_empty() {
                break;
            }

            let advanced: Vec<Advanced> = if self.config.parallel {
                live.into_par_iter()
                    .map(|path| self.advance(scenario, index, step, path))
                    .collect::<Result<Vec<_>>>()?
            } else {
                live.into_iter()
                    .map(|path| self.advance(scenario, index, step, path))
                    .collect::<Result<Vec<_>>>()?
            };

            live = Vec::new();
            for adv in advanced {
                pruned += adv.pruned;
                live.extend(adv.live);
                if let Some(path) = adv.terminated {
                    finished.push(path.summarize(true));
                }
            }

            if live.len() > self.config.max_paths {
                tracing::warn!(
                    "step {}: {} live paths exceed max_paths={}, dropping the rest",
                    index,
                    live.len(),
                    self.config.max_paths
                );
                live.truncate(self.config.max_paths);
                truncated = true;
            }
        }

        let mut paths: Vec<PathSummary> = live.into_iter().map(|p| p.summarize(false)).collect();
        paths.extend(finished);

        let report = ScenarioReport {
            scenario: scenario.name.clone(),
            paths,
            pruned,
            truncated,
        };
        tracing::info!(
            "scenario '{}': {} path(s), {} defect(s)",
            report.scenario,
            report.paths.len(),
            report.defects().len()
        );
        Ok(report)
    }

    fn advance(
        &self,
        scenario: &Scenario,
        index: usize,
        step: &ScenarioStep,
        path: ExplorationPath,
    ) -> Result<Advanced> {
        let line = scenario.line_of(index);
        match step {
            ScenarioStep::Call(call) => self.advance_call(scenario, index, line, call, path),
            ScenarioStep::Deref(deref) => {
                let mut path = path;
                let value = deref.deref.resolve(&path.env, index)?;
                let site = CallSite::new(scenario.file.as_str(), line, "<deref>");
                if let Some(defect) = self.evaluator.observe_dereference(&site, &value, &path.state) {
                    path.defects.push(defect);
                }
                Ok(Advanced {
                    live: vec![path],
                    ..Advanced::default()
                })
            }
        }
    }

    fn advance_call(
        &self,
        scenario: &Scenario,
        index: usize,
        line: u32,
        call: &ScenarioCall,
        path: ExplorationPath,
    ) -> Result<Advanced> {
        let args = call
            .args
            .iter()
            .map(|a| a.resolve(&path.env, index))
            .collect::<Result<Vec<Value>>>()?;
        let site = CallSite::new(scenario.file.as_str(), line, call.call.as_str());
        let bindings = CallBindings::new(site, args);

        let outcomes = match self.registry.lookup(&call.call) {
            Some(descriptor) => self
                .evaluator
                .apply(descriptor, &bindings, &path.state)
                .map_err(|source| ScenarioError::Eval { step: index, source })?,
            None => {
                tracing::debug!("{}: no model, generic treatment", bindings.site);
                vec![Outcome::initial(path.state.clone()).returning(Value::Unknown)]
            }
        };

        if outcomes.is_empty() {
            tracing::debug!("{}: path terminated", bindings.site);
            return Ok(Advanced {
                terminated: Some(path),
                ..Advanced::default()
            });
        }

        let expected = call
            .expect
            .as_deref()
            .map(|label| scenario.expected_label(index, label))
            .transpose()?;

        let mut advanced = Advanced::default();
        for outcome in outcomes {
            if expected.map_or(false, |label| label != outcome.label) {
                advanced.pruned += 1;
                continue;
            }
            advanced.live.push(path.follow(outcome, call.bind.as_deref()));
        }
        Ok(advanced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EvaluatorConfig, RegistryConfig};
    use crate::features::defect_sink::CollectingSink;
    use crate::features::effect_registry::build_registry;
    use std::sync::Arc;

    fn run(yaml: &str) -> ScenarioReport {
        let registry = build_registry(&RegistryConfig::default()).unwrap();
        let evaluator =
            EffectEvaluator::new(EvaluatorConfig::default(), Arc::new(CollectingSink::new()));
        let runner = ScenarioRunner::new(&registry, evaluator, ScenarioConfig::default());
        runner.run(&Scenario::from_yaml_str(yaml).unwrap()).unwrap()
    }

    #[test]
    fn test_allocation_forks_paths() {
        let report = run("name: alloc\nsteps:\n  - call: kmalloc\n    args: [16, 0]\n");
        assert_eq!(report.paths.len(), 2);
        assert_eq!(report.paths[0].labels, vec![OutcomeLabel::Success]);
        assert_eq!(report.paths[0].owned.len(), 1);
        assert_eq!(report.paths[1].labels, vec![OutcomeLabel::Failure]);
        assert!(report.paths[1].owned.is_empty());
    }

    #[test]
    fn test_expect_prunes() {
        let report = run(
            "name: alloc\nsteps:\n  - call: kmalloc\n    args: [16, 0]\n    expect: failure\n",
        );
        assert_eq!(report.paths.len(), 1);
        assert_eq!(report.pruned, 1);
    }

    #[test]
    fn test_unmodeled_call_is_generic() {
        let report = run("name: other\nsteps:\n  - call: do_something\n    args: [1]\n    bind: r\n");
        assert_eq!(report.paths.len(), 1);
        assert_eq!(report.paths[0].labels, vec![OutcomeLabel::Returned]);
        assert_eq!(report.paths[0].bindings.get("r"), Some(&Value::Unknown));
    }

    #[test]
    fn test_terminate_ends_path() {
        let report = run(
            "name: bug\nsteps:\n  - call: BUG\n  - call: mutex_unlock\n    args: [\"&L\"]\n",
        );
        assert_eq!(report.paths.len(), 1);
        assert!(report.paths[0].terminated);
        assert!(report.defects().is_empty());
    }

    #[test]
    fn test_max_paths_truncates() {
        let registry = build_registry(&RegistryConfig::default()).unwrap();
        let runner = ScenarioRunner::new(
            &registry,
            EffectEvaluator::default(),
            ScenarioConfig::default().max_paths(2).parallel(false),
        );
        let scenario = Scenario::from_yaml_str(
            "name: many\nsteps:\n  - call: cpu_has_fxsr\n  - call: cpu_has_fxsr\n",
        )
        .unwrap();
        let report = runner.run(&scenario).unwrap();
        assert_eq!(report.paths.len(), 2);
        assert!(report.truncated);
    }

    #[test]
    fn test_unbound_variable_is_error() {
        let registry = build_registry(&RegistryConfig::default()).unwrap();
        let runner =
            ScenarioRunner::new(&registry, EffectEvaluator::default(), ScenarioConfig::default());
        let scenario =
            Scenario::from_yaml_str("name: x\nsteps:\n  - call: kfree\n    args: [$p]\n").unwrap();
        assert!(matches!(
            runner.run(&scenario).unwrap_err(),
            ScenarioError::UnboundVariable { step: 0, .. }
        ));
    }

    #[test]
    fn test_arity_error_names_step() {
        let registry = build_registry(&RegistryConfig::default()).unwrap();
        let runner =
            ScenarioRunner::new(&registry, EffectEvaluator::default(), ScenarioConfig::default());
        let scenario =
            Scenario::from_yaml_str("name: x\nsteps:\n  - call: mutex_lock\n").unwrap();
        assert!(matches!(
            runner.run(&scenario).unwrap_err(),
            ScenarioError::Eval { step: 0, .. }
        ));
    }

    #[test]
    fn test_tainted_return_reaches_format_sink() {
        use crate::features::effect_registry::{
            EffectDescriptor, FunctionSignature, ModelEntry, ParamKind, ReturnKind,
        };

        let read_user_ptr = ModelEntry::new(
            FunctionSignature::new("read_user_ptr", vec![ParamKind::Pointer], ReturnKind::Pointer),
            EffectDescriptor::TaintArguments {
                params: vec![0],
                taints_return: true,
            },
        );
        let registry =
            build_registry(&RegistryConfig::default().extra_model(read_user_ptr)).unwrap();
        let sink = Arc::new(CollectingSink::new());
        let evaluator = EffectEvaluator::new(EvaluatorConfig::default(), sink.clone());
        let runner = ScenarioRunner::new(&registry, evaluator, ScenarioConfig::default());
        let scenario = Scenario::from_yaml_str(
            "name: user pointer\nsteps:\n  - call: read_user_ptr\n    args: [\"&u\"]\n    bind: r\n  - call: printk\n    args: [$r]\n",
        )
        .unwrap();

        let report = runner.run(&scenario).unwrap();
        let path = &report.paths[0];
        let bound = path.bindings.get("r").cloned().unwrap();
        assert!(matches!(bound, Value::Object(_)));
        assert_eq!(path.tainted.len(), 2);
        assert_eq!(report.count(DefectKind::TaintedSink), 1);
        assert_eq!(sink.len(), 1);
        let Observation::FormatStringSink { taint, .. } = &path.observations[0];
        assert!(taint.is_tainted());
    }
}
