//! Function steps

use anyhow::Result;
use futures::future::BoxFuture;

use super::Step;
use crate::context::ExecutionContext;

type Action = Box<dyn Fn() -> Result<()> + Send + Sync>;

/// Step wrapping a zero-argument fallible closure
pub struct FuncStep {
    name: String,
    action: Action,
}

impl FuncStep {
    pub fn new<F>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            action: Box::new(action),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Shorthand for [`FuncStep::new`]
pub fn func<F>(name: impl Into<String>, action: F) -> FuncStep
where
    F: Fn() -> Result<()> + Send + Sync + 'static,
{
    FuncStep::new(name, action)
}

impl Step for FuncStep {
    fn describe(&self, ctx: &ExecutionContext) -> String {
        ctx.expand_vars_no_error(&self.name)
    }

    fn execute<'a>(&'a self, _ctx: &'a ExecutionContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { (self.action)() })
    }
}
