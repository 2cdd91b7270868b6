//! Scenario run reports

use serde::{Deserialize, Serialize};
use std::fmt;

use super::execution::{Execution, ExecutionSummary};

/// Summary of one scenario run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub group: String,
    pub tags: Vec<String>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub retried: usize,
    pub total_duration_ms: u64,
    pub failures: Vec<ExecutionSummary>,
}

impl ScenarioReport {
    pub fn new(
        scenario: impl Into<String>,
        group: impl Into<String>,
        tags: Vec<String>,
        executions: &[Execution],
    ) -> Self {
        let total = executions.len();
        let failures: Vec<ExecutionSummary> = executions
            .iter()
            .filter(|e| e.error().is_some())
            .map(Execution::summary)
            .collect();
        let retried = executions.iter().filter(|e| e.retries() > 0).count();
        let total_duration_ms = executions
            .iter()
            .map(|e| e.duration().as_millis() as u64)
            .sum();

        Self {
            scenario: scenario.into(),
            group: group.into(),
            tags,
            total,
            passed: total - failures.len(),
            failed: failures.len(),
            retried,
            total_duration_ms,
            failures,
        }
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.passed as f64 / self.total as f64) * 100.0
        }
    }

    pub fn is_all_passed(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}]: {}/{} passed ({:.1}%), {} retried, {}ms",
            self.scenario,
            self.group,
            self.passed,
            self.total,
            self.pass_rate(),
            self.retried,
            self.total_duration_ms
        )
    }
}
