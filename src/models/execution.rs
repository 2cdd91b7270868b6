//! Execution records
//!
//! One record per step run: timing, description, error and the retry count
//! the run finished with.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::context::ExecutionContext;

/// Record of a single step run
#[derive(Debug)]
pub struct Execution {
    description: String,
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
    error: Option<anyhow::Error>,
    retries: u32,
    test_number: u64,
    correlation_id: String,
}

impl Execution {
    /// Start recording a run of the step described by `description`
    pub fn start(description: impl Into<String>, ctx: &ExecutionContext) -> Self {
        Self {
            description: description.into(),
            start: Utc::now(),
            end: None,
            error: None,
            retries: ctx.retries(),
            test_number: ctx.test_number(),
            correlation_id: ctx.correlation_id().to_string(),
        }
    }

    /// Finalize the record with the step result and the context of the
    /// final attempt
    pub fn finish(mut self, result: Result<()>, ctx: &ExecutionContext) -> Self {
        self.end = Some(Utc::now());
        self.error = result.err();
        self.retries = ctx.retries();
        self.correlation_id = ctx.correlation_id().to_string();
        self
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    /// Time between start and end; zero while still running
    pub fn duration(&self) -> Duration {
        self.end
            .and_then(|end| (end - self.start).to_std().ok())
            .unwrap_or_default()
    }

    pub fn error(&self) -> Option<&anyhow::Error> {
        self.error.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.end.is_some()
    }

    pub fn is_success(&self) -> bool {
        self.is_finished() && self.error.is_none()
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn test_number(&self) -> u64 {
        self.test_number
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Serializable view of the record
    pub fn summary(&self) -> ExecutionSummary {
        ExecutionSummary {
            description: self.description.clone(),
            test_number: self.test_number,
            correlation_id: self.correlation_id.clone(),
            retries: self.retries,
            start: self.start,
            duration_ms: self.duration().as_millis() as u64,
            error: self.error.as_ref().map(|e| format!("{e:#}")),
        }
    }
}

impl fmt::Display for Execution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}:", self.duration(), self.description)?;
        if let Some(err) = &self.error {
            write!(f, " {err:#}")?;
        }
        if self.retries > 0 {
            write!(f, " ({} retries)", self.retries)?;
        }
        write!(f, " {}", self.correlation_id)
    }
}

/// Serializable execution data used for reports
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExecutionSummary {
    pub description: String,
    pub test_number: u64,
    pub correlation_id: String,
    pub retries: u32,
    pub start: DateTime<Utc>,
    pub duration_ms: u64,
    pub error: Option<String>,
}
