/// Effect Registry Domain Models
mod descriptor;
mod entry;
mod signature;

pub use descriptor::{EffectDescriptor, ParamIndex, SizeExpr};
pub use entry::ModelEntry;
pub use signature::{FunctionSignature, ParamKind, ReturnKind};
