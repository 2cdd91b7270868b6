//! Sequence steps

use anyhow::Result;
use futures::future::BoxFuture;
use std::sync::Arc;

use super::Step;
use crate::context::ExecutionContext;

/// Ordered list of steps, stopping at the first failure
pub struct SequenceStep {
    name: String,
    steps: Vec<Arc<dyn Step>>,
}

impl SequenceStep {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step
    pub fn add(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Arc::new(step));
        self
    }

    /// Append the same step `n` times
    pub fn add_n(mut self, n: usize, step: impl Step + 'static) -> Self {
        let step: Arc<dyn Step> = Arc::new(step);
        self.steps
            .extend(std::iter::repeat_with(|| Arc::clone(&step)).take(n));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    async fn run_all(&self, ctx: &ExecutionContext) -> Result<()> {
        for step in &self.steps {
            step.execute(ctx).await?;
        }
        Ok(())
    }
}

/// Build a sequence from already shared steps
pub fn seq(name: impl Into<String>, steps: Vec<Arc<dyn Step>>) -> SequenceStep {
    SequenceStep {
        name: name.into(),
        steps,
    }
}

impl Step for SequenceStep {
    fn describe(&self, _ctx: &ExecutionContext) -> String {
        self.name.clone()
    }

    fn execute<'a>(&'a self, ctx: &'a ExecutionContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.run_all(ctx))
    }
}
