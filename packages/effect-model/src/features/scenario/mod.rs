//! Scenario
//!
//! YAML descriptions of straight-line call sequences, explored path by path
//! against the registry. Stands in for the host engine in tests and the CLI.

pub mod error;
pub mod model;
pub mod runner;

pub use error::{Result, ScenarioError};
pub use model::{ArgSpec, DerefStep, LockGroupSpec, Scenario, ScenarioCall, ScenarioSetup, ScenarioStep};
pub use runner::{PathSummary, ScenarioReport, ScenarioRunner, SETUP_CALLEE};
