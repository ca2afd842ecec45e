use crate::shared::models::{CallSite, Value};

/// Argument values bound at one call site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallBindings {
    pub site: CallSite,
    pub args: Vec<Value>,
}

impl CallBindings {
    pub fn new(site: CallSite, args: Vec<Value>) -> Self {
        Self { site, args }
    }

    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}
