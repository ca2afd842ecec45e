//! Effect handlers, one module per concern

pub mod context;
pub mod locks;
pub mod memory;
pub mod pointer;
pub mod taint;

pub use context::EffectContext;
