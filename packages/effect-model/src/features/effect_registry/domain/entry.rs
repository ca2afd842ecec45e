/// Registry entry: one modeled function
use super::{EffectDescriptor, FunctionSignature};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelEntry {
    pub signature: FunctionSignature,
    pub effect: EffectDescriptor,
}

impl ModelEntry {
    pub fn new(signature: FunctionSignature, effect: EffectDescriptor) -> Self {
        Self { signature, effect }
    }

    pub fn name(&self) -> &str {
        &self.signature.name
    }
}
