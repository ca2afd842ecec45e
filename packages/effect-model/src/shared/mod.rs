//! Shared module - Common types
//!
//! Identities and values used by every feature. No feature depends on
//! another feature's types through this module.

pub mod models;

// Re-exports for convenience
pub use models::*;
