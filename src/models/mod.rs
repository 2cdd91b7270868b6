//! Data models
//!
//! Scenarios, execution records and run reports.

mod execution;
mod report;
mod scenario;

pub use execution::{Execution, ExecutionSummary};
pub use report::ScenarioReport;
pub use scenario::{ContextFactory, Scenario};
