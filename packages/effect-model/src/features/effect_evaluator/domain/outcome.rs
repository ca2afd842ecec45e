//! Outcomes of applying an effect

use super::state::{AbstractState, TaintState};
use crate::features::branch_resolver::BranchFact;
use crate::features::defect_sink::Defect;
use crate::shared::models::{CallSite, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which way the call went
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeLabel {
    /// Non-branching effect
    Returned,
    Success,
    Failure,
    Acquired,
    NotAcquired,
    Interrupted,
    True,
    False,
}

impl OutcomeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Returned => "returned",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Acquired => "acquired",
            Self::NotAcquired => "not-acquired",
            Self::Interrupted => "interrupted",
            Self::True => "true",
            Self::False => "false",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "returned" => Self::Returned,
            "success" => Self::Success,
            "failure" => Self::Failure,
            "acquired" => Self::Acquired,
            "not-acquired" => Self::NotAcquired,
            "interrupted" => Self::Interrupted,
            "true" => Self::True,
            "false" => Self::False,
            _ => return None,
        })
    }
}

impl fmt::Display for OutcomeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Return value with its taint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnValue {
    pub value: Value,
    pub taint: TaintState,
}

impl ReturnValue {
    pub fn clean(value: Value) -> Self {
        Self {
            value,
            taint: TaintState::Clean,
        }
    }
}

/// Facts reported to the host that are not state changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Observation {
    /// A value reached a format-string sink
    FormatStringSink {
        site: CallSite,
        value: Value,
        taint: TaintState,
    },
}

/// One reachable result of a call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub label: OutcomeLabel,
    pub state: AbstractState,
    pub return_value: Option<ReturnValue>,
    /// Branch facts this outcome assumes, oldest first
    pub facts: Vec<BranchFact>,
    pub observations: Vec<Observation>,
    /// Defects found on the way to this outcome
    pub defects: Vec<Defect>,
}

impl Outcome {
    /// Starting point of an application: the input state, nothing returned
    pub fn initial(state: AbstractState) -> Self {
        Self {
            label: OutcomeLabel::Returned,
            state,
            return_value: None,
            facts: Vec::new(),
            observations: Vec::new(),
            defects: Vec::new(),
        }
    }

    pub fn labeled(mut self, label: OutcomeLabel) -> Self {
        self.label = label;
        self
    }

    pub fn assuming(mut self, fact: BranchFact) -> Self {
        self.facts.push(fact);
        self
    }

    pub fn returning(mut self, value: Value) -> Self {
        self.return_value = Some(ReturnValue::clean(value));
        self
    }

    pub fn returning_tainted(mut self, value: Value, taint: TaintState) -> Self {
        self.return_value = Some(ReturnValue { value, taint });
        self
    }

    /// Returned value, `Unknown` when the effect bound none
    pub fn value(&self) -> Value {
        self.return_value
            .as_ref()
            .map(|r| r.value.clone())
            .unwrap_or(Value::Unknown)
    }
}
