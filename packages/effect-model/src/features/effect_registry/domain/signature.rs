/// Function signatures used as registry keys
use serde::{Deserialize, Serialize};
use std::fmt;

/// Parameter kind
///
/// Only used for validation and display; the evaluator never inspects types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Pointer,
    Integer,
    Size,
    Flags,
    FormatString,
    Lock,
}

/// Return kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnKind {
    #[default]
    Void,
    Pointer,
    Integer,
    Bool,
}

/// Signature of a modeled (C-style, name-unique) function
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FunctionSignature {
    /// Symbol name
    pub name: String,

    /// Fixed parameters, in order
    #[serde(default)]
    pub params: Vec<ParamKind>,

    /// Trailing `...`
    #[serde(default)]
    pub variadic: bool,

    #[serde(default)]
    pub returns: ReturnKind,
}

impl FunctionSignature {
    pub fn new(name: impl Into<String>, params: Vec<ParamKind>, returns: ReturnKind) -> Self {
        Self {
            name: name.into(),
            params,
            variadic: false,
            returns,
        }
    }

    /// Mark the signature as taking trailing variadic arguments
    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    /// Number of fixed parameters
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn returns_value(&self) -> bool {
        self.returns != ReturnKind::Void
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParamKind::Pointer => "void *",
            ParamKind::Integer => "long",
            ParamKind::Size => "size_t",
            ParamKind::Flags => "gfp_t",
            ParamKind::FormatString => "const char *",
            ParamKind::Lock => "lock *",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for ReturnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReturnKind::Void => "void",
            ReturnKind::Pointer => "void *",
            ReturnKind::Integer => "long",
            ReturnKind::Bool => "bool",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut params: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
        if self.variadic {
            params.push("...".to_string());
        }
        if params.is_empty() {
            params.push("void".to_string());
        }
        write!(f, "{} {}({})", self.returns, self.name, params.join(", "))
    }
}
