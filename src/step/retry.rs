//! Retry controller
//!
//! Wraps a step so a failing run is repeated with a derived context whose
//! retry counter is incremented, until it succeeds or the budget is spent.

use anyhow::Result;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::{Attempt, Step};
use crate::context::{Data, ExecutionContext};

/// Delay between two attempts unless configured otherwise
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Step decorator adding retries
pub struct Retry {
    step: Arc<dyn Step>,
    max_retries: u32,
    backoff: Duration,
}

impl Retry {
    /// Wrap `step`, allowing up to `max_retries` additional attempts
    pub fn new(step: impl Step + 'static, max_retries: u32) -> Self {
        Self {
            step: Arc::new(step),
            max_retries,
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// Fixed delay between attempts
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }
}

/// Shorthand for [`Retry::new`]
pub fn retry(step: impl Step + 'static, max_retries: u32) -> Retry {
    Retry::new(step, max_retries)
}

impl Step for Retry {
    fn describe(&self, ctx: &ExecutionContext) -> String {
        self.step.describe(ctx)
    }

    fn execute<'a>(&'a self, ctx: &'a ExecutionContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { self.attempt(ctx.clone()).await.result })
    }

    fn attempt(&self, ctx: ExecutionContext) -> BoxFuture<'_, Attempt> {
        Box::pin(async move {
            let mut current = ctx;
            loop {
                let result = self.step.execute(&current).await;
                let err = match result {
                    Ok(()) => {
                        return Attempt {
                            context: current,
                            result: Ok(()),
                        }
                    }
                    Err(err) => err,
                };

                if current.retries() >= self.max_retries {
                    return Attempt {
                        context: current,
                        result: Err(err),
                    };
                }

                warn!(
                    "{} failed ({}), retry {}/{} in {}ms",
                    self.step.describe(&current),
                    err,
                    current.retries() + 1,
                    self.max_retries,
                    self.backoff.as_millis()
                );

                if !self.backoff.is_zero() {
                    tokio::time::sleep(self.backoff).await;
                }

                let next_retry = current.retries() + 1;
                current = current.derive(Data::new()).with_retries(next_retry);
            }
        })
    }
}
