//! Executable steps
//!
//! A step is the unit of work the engine runs against a context. Steps
//! compose: a sequence runs several steps in order and a retry wraps any
//! step with a retry budget.
//!
//! ## Variants
//!
//! - [`FuncStep`]: a plain fallible closure
//! - [`SequenceStep`]: ordered steps, stops at the first failure
//! - [`HttpStep`]: an HTTP request checked against expectations
//! - [`Retry`]: re-runs a failing step with a fresh context

mod func;
mod http;
mod retry;
mod sequence;

pub use func::{func, FuncStep};
pub use http::{Expectation, HttpStep};
pub use retry::{retry, Retry, DEFAULT_BACKOFF};
pub use sequence::{seq, SequenceStep};

use anyhow::Result;
use futures::future::BoxFuture;
use std::sync::Arc;

use crate::context::ExecutionContext;

/// Outcome of running a step, together with the context the final
/// attempt ran with
#[derive(Debug)]
pub struct Attempt {
    pub context: ExecutionContext,
    pub result: Result<()>,
}

/// Central trait for executable steps
pub trait Step: Send + Sync {
    /// Human readable description of the step for `ctx`. Must not fail.
    fn describe(&self, ctx: &ExecutionContext) -> String;

    /// Execute the step
    fn execute<'a>(&'a self, ctx: &'a ExecutionContext) -> BoxFuture<'a, Result<()>>;

    /// Execute the step and report the context of the final attempt.
    ///
    /// Steps which derive new contexts while running (see [`Retry`])
    /// override this so the executor can record the final retry count.
    fn attempt(&self, ctx: ExecutionContext) -> BoxFuture<'_, Attempt> {
        Box::pin(async move {
            let result = self.execute(&ctx).await;
            Attempt {
                context: ctx,
                result,
            }
        })
    }
}

impl<S: Step + ?Sized> Step for Arc<S> {
    fn describe(&self, ctx: &ExecutionContext) -> String {
        (**self).describe(ctx)
    }

    fn execute<'a>(&'a self, ctx: &'a ExecutionContext) -> BoxFuture<'a, Result<()>> {
        (**self).execute(ctx)
    }

    fn attempt(&self, ctx: ExecutionContext) -> BoxFuture<'_, Attempt> {
        (**self).attempt(ctx)
    }
}

impl<S: Step + ?Sized> Step for Box<S> {
    fn describe(&self, ctx: &ExecutionContext) -> String {
        (**self).describe(ctx)
    }

    fn execute<'a>(&'a self, ctx: &'a ExecutionContext) -> BoxFuture<'a, Result<()>> {
        (**self).execute(ctx)
    }

    fn attempt(&self, ctx: ExecutionContext) -> BoxFuture<'_, Attempt> {
        (**self).attempt(ctx)
    }
}
