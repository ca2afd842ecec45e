//! Shared models

mod ids;
mod value;

pub use ids::{CallSite, MemoryRef, ObjectId, StorageId};
pub use value::{err_ptr, PointerClass, Value, EINTR, ENOMEM, MAX_ADDRESS, MAX_ERRNO};
