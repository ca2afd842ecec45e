//! Defect Sink
//!
//! Modeled defects are the product of the evaluator, not failures of it:
//! they are recorded here and analysis continues down the offending path.

pub mod domain;
pub mod infrastructure;
pub mod ports;

pub use domain::{Defect, DefectKind};
pub use infrastructure::{CollectingSink, TracingSink};
pub use ports::{DefectSink, NullSink};
