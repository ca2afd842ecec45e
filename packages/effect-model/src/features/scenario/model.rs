//! Scenario files
//!
//! ```yaml
//! name: double release
//! file: drivers/foo.c
//! steps:
//!   - call: kmalloc
//!     args: [16, 0]
//!     bind: p
//!     expect: success
//!   - call: kfree
//!     args: [$p]
//!   - call: kfree
//!     args: [$p]
//! ```
//!
//! Arguments: integers, `NULL`, `"?"` (unknown), `$var` (value bound by an
//! earlier step), `"&name"` (host storage), `"0x..."` (raw address) and
//! `ERR_PTR(-errno)`. `&` and `?` are YAML indicators and must be quoted.

use super::error::{Result, ScenarioError};
use crate::features::effect_evaluator::OutcomeLabel;
use crate::shared::models::{err_ptr, Value, MAX_ERRNO};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

fn default_file() -> String {
    "scenario.c".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Source file reported in call sites
    #[serde(default = "default_file")]
    pub file: String,

    #[serde(default)]
    pub setup: ScenarioSetup,

    pub steps: Vec<ScenarioStep>,
}

/// Initial state of every path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioSetup {
    pub lock_groups: Vec<LockGroupSpec>,

    /// Storage already tainted when the scenario starts
    pub tainted: Vec<String>,

    /// Storage tracked as owned heap blocks
    pub owned: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LockGroupSpec {
    pub name: String,

    #[serde(default)]
    pub needs_parent_lock: bool,

    /// Storage names of the locks in the group
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScenarioStep {
    Call(ScenarioCall),
    Deref(DerefStep),
}

impl ScenarioStep {
    pub fn line(&self) -> Option<u32> {
        match self {
            ScenarioStep::Call(c) => c.line,
            ScenarioStep::Deref(d) => d.line,
        }
    }
}

/// Call to a (possibly modeled) function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioCall {
    pub call: String,

    #[serde(default)]
    pub line: Option<u32>,

    #[serde(default)]
    pub args: Vec<ArgSpec>,

    /// Variable the return value is bound to
    #[serde(default)]
    pub bind: Option<String>,

    /// Keep only paths where the call ended with this label
    #[serde(default)]
    pub expect: Option<String>,
}

/// Host-side dereference of a value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DerefStep {
    pub deref: ArgSpec,

    #[serde(default)]
    pub line: Option<u32>,
}

/// Argument expression
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawArg", into = "RawArg")]
pub enum ArgSpec {
    Int(i64),
    Null,
    Unknown,
    Var(String),
    Storage(String),
    Address(u64),
    ErrPtr(i64),
}

/// Serialized form of [`ArgSpec`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawArg {
    /// Unquoted `NULL` is YAML null
    Null,
    Int(i64),
    Text(String),
}

impl TryFrom<RawArg> for ArgSpec {
    type Error = ScenarioError;

    fn try_from(raw: RawArg) -> Result<Self> {
        match raw {
            RawArg::Null => Ok(ArgSpec::Null),
            RawArg::Int(v) => Ok(ArgSpec::Int(v)),
            RawArg::Text(s) => s.parse(),
        }
    }
}

impl From<ArgSpec> for RawArg {
    fn from(arg: ArgSpec) -> Self {
        match arg {
            ArgSpec::Int(v) => RawArg::Int(v),
            other => RawArg::Text(other.to_string()),
        }
    }
}

impl FromStr for ArgSpec {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self> {
        let text = s.trim();
        let invalid = || ScenarioError::InvalidArgument(s.to_string());

        if text == "NULL" {
            return Ok(ArgSpec::Null);
        }
        if text == "?" {
            return Ok(ArgSpec::Unknown);
        }
        if let Some(name) = text.strip_prefix('$') {
            return if name.is_empty() {
                Err(invalid())
            } else {
                Ok(ArgSpec::Var(name.to_string()))
            };
        }
        if let Some(name) = text.strip_prefix('&') {
            return if name.is_empty() {
                Err(invalid())
            } else {
                Ok(ArgSpec::Storage(name.to_string()))
            };
        }
        if let Some(hex) = text.strip_prefix("0x") {
            return u64::from_str_radix(hex, 16)
                .map(ArgSpec::Address)
                .map_err(|_| invalid());
        }
        if let Some(inner) = text
            .strip_prefix("ERR_PTR(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let errno = inner
                .trim()
                .parse::<i64>()
                .ok()
                .and_then(i64::checked_abs)
                .ok_or_else(invalid)?;
            return if (1..=MAX_ERRNO).contains(&errno.unsigned_abs()) {
                Ok(ArgSpec::ErrPtr(errno))
            } else {
                Err(invalid())
            };
        }
        text.parse::<i64>().map(ArgSpec::Int).map_err(|_| invalid())
    }
}

impl fmt::Display for ArgSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgSpec::Int(v) => write!(f, "{}", v),
            ArgSpec::Null => write!(f, "NULL"),
            ArgSpec::Unknown => write!(f, "?"),
            ArgSpec::Var(name) => write!(f, "${}", name),
            ArgSpec::Storage(name) => write!(f, "&{}", name),
            ArgSpec::Address(raw) => write!(f, "{:#x}", raw),
            ArgSpec::ErrPtr(errno) => write!(f, "ERR_PTR(-{})", errno),
        }
    }
}

impl ArgSpec {
    /// Value of the argument on a path with variables `env`
    pub fn resolve(&self, env: &FxHashMap<String, Value>, step: usize) -> Result<Value> {
        Ok(match self {
            ArgSpec::Int(v) => Value::Int(*v),
            ArgSpec::Null => Value::Null,
            ArgSpec::Unknown => Value::Unknown,
            ArgSpec::Var(name) => {
                env.get(name)
                    .cloned()
                    .ok_or_else(|| ScenarioError::UnboundVariable {
                        step,
                        name: name.clone(),
                    })?
            }
            ArgSpec::Storage(name) => Value::storage(name.as_str()),
            ArgSpec::Address(raw) => Value::Address(*raw),
            ArgSpec::ErrPtr(errno) => Value::Address(err_ptr(*errno)),
        })
    }
}

impl Scenario {
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let scenario: Scenario = serde_yaml::from_str(content)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Structural checks that do not need a registry
    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(ScenarioError::Empty {
                scenario: self.name.clone(),
            });
        }
        for (index, step) in self.steps.iter().enumerate() {
            if let ScenarioStep::Call(call) = step {
                if let Some(label) = &call.expect {
                    self.expected_label(index, label)?;
                }
            }
        }
        Ok(())
    }

    pub(crate) fn expected_label(&self, step: usize, label: &str) -> Result<OutcomeLabel> {
        OutcomeLabel::parse(label).ok_or_else(|| ScenarioError::UnknownLabel {
            step,
            label: label.to_string(),
        })
    }

    /// Line reported for step `index` (explicit, else 1-based position)
    pub fn line_of(&self, index: usize) -> u32 {
        self.steps
            .get(index)
            .and_then(|s| s.line())
            .unwrap_or_else(|| u32::try_from(index + 1).unwrap_or(u32::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_syntax() {
        assert_eq!("NULL".parse::<ArgSpec>().unwrap(), ArgSpec::Null);
        assert_eq!("?".parse::<ArgSpec>().unwrap(), ArgSpec::Unknown);
        assert_eq!("$p".parse::<ArgSpec>().unwrap(), ArgSpec::Var("p".into()));
        assert_eq!(
            "&buf".parse::<ArgSpec>().unwrap(),
            ArgSpec::Storage("buf".into())
        );
        assert_eq!(
            "0xffff".parse::<ArgSpec>().unwrap(),
            ArgSpec::Address(0xffff)
        );
        assert_eq!(
            "ERR_PTR(-12)".parse::<ArgSpec>().unwrap(),
            ArgSpec::ErrPtr(12)
        );
        assert_eq!("-4".parse::<ArgSpec>().unwrap(), ArgSpec::Int(-4));
        assert!("$".parse::<ArgSpec>().is_err());
        assert!("buf".parse::<ArgSpec>().is_err());
    }

    #[test]
    fn test_err_ptr_errno_must_be_in_range() {
        assert_eq!(
            "ERR_PTR(-4095)".parse::<ArgSpec>().unwrap(),
            ArgSpec::ErrPtr(4095)
        );
        for text in [
            "ERR_PTR(0)",
            "ERR_PTR(-4096)",
            "ERR_PTR(-5000)",
            "ERR_PTR(-9223372036854775808)",
            "ERR_PTR(x)",
        ] {
            assert!(
                matches!(text.parse::<ArgSpec>(), Err(ScenarioError::InvalidArgument(_))),
                "{} should be rejected",
                text
            );
        }
    }

    #[test]
    fn test_parse_scenario() {
        let yaml = r#"
name: lock twice
setup:
  lock_groups:
    - name: usb
      needs_parent_lock: true
      members: [dev]
steps:
  - call: mutex_lock
    args: ["&L"]
  - call: mutex_trylock
    line: 40
    args: ["&L"]
    bind: r
    expect: not-acquired
  - deref: $r
"#;
        let scenario = Scenario::from_yaml_str(yaml).unwrap();
        assert_eq!(scenario.file, "scenario.c");
        assert_eq!(scenario.setup.lock_groups[0].members, vec!["dev"]);
        assert_eq!(scenario.steps.len(), 3);
        assert!(matches!(&scenario.steps[2], ScenarioStep::Deref(d) if d.deref == ArgSpec::Var("r".into())));
        assert_eq!(scenario.line_of(0), 1);
        assert_eq!(scenario.line_of(1), 40);
    }

    #[test]
    fn test_integer_args_parse_from_yaml_numbers() {
        let yaml = "name: alloc\nsteps:\n  - call: kfree\n    args: [16, NULL]\n";
        let scenario = Scenario::from_yaml_str(yaml).unwrap();
        let ScenarioStep::Call(call) = &scenario.steps[0] else {
            panic!("expected a call step");
        };
        assert_eq!(call.args, vec![ArgSpec::Int(16), ArgSpec::Null]);
    }

    #[test]
    fn test_unknown_label_rejected() {
        let yaml = "name: x\nsteps:\n  - call: kmalloc\n    args: [1, 0]\n    expect: succeeded\n";
        assert!(matches!(
            Scenario::from_yaml_str(yaml).unwrap_err(),
            ScenarioError::UnknownLabel { step: 0, .. }
        ));
    }

    #[test]
    fn test_empty_scenario_rejected() {
        assert!(matches!(
            Scenario::from_yaml_str("name: nothing\nsteps: []\n").unwrap_err(),
            ScenarioError::Empty { .. }
        ));
    }

    #[test]
    fn test_resolve_unbound_variable() {
        let env = FxHashMap::default();
        assert!(matches!(
            ArgSpec::Var("p".into()).resolve(&env, 3).unwrap_err(),
            ScenarioError::UnboundVariable { step: 3, .. }
        ));
        assert_eq!(
            ArgSpec::ErrPtr(12).resolve(&env, 0).unwrap(),
            Value::Address(err_ptr(12))
        );
    }
}
