//! Parallel step execution
//!
//! Runs one step against a stream of contexts on a bounded pool of workers
//! sharing a single input queue.

use futures::FutureExt;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, warn};

use crate::context::{ContextStream, ExecutionContext};
use crate::models::Execution;
use crate::step::{Attempt, Step};

/// Capacity of the execution result channel
pub const RESULT_BUFFER: usize = 10;

/// Stream of finished executions, in arrival order
pub type ExecutionStream = mpsc::Receiver<Execution>;

/// Parallel step executor
pub struct ParallelExecutor {
    workers: usize,
}

impl ParallelExecutor {
    /// Executor with `workers` concurrent workers; zero is treated as one
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `step` once for every context in `contexts`
    ///
    /// The returned stream is closed after every worker has drained the
    /// input and finished its last execution. Must be called within a tokio
    /// runtime.
    pub fn run(&self, step: Arc<dyn Step>, contexts: ContextStream) -> ExecutionStream {
        let (tx, rx) = mpsc::channel(RESULT_BUFFER);
        let queue = Arc::new(Mutex::new(contexts));

        for worker in 0..self.workers {
            let step = Arc::clone(&step);
            let queue = Arc::clone(&queue);
            // every worker owns a sender; the stream closes when the last one finishes
            let tx = tx.clone();
            tokio::spawn(async move {
                run_worker(worker, step, queue, tx).await;
            });
        }

        rx
    }
}

impl Default for ParallelExecutor {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Run `step` for every context with `worker_count` workers
pub fn run_parallel(
    worker_count: usize,
    step: Arc<dyn Step>,
    contexts: ContextStream,
) -> ExecutionStream {
    ParallelExecutor::new(worker_count).run(step, contexts)
}

/// Same as [`run_parallel`] with a single worker
pub fn run(step: Arc<dyn Step>, contexts: ContextStream) -> ExecutionStream {
    run_parallel(1, step, contexts)
}

async fn run_worker(
    worker: usize,
    step: Arc<dyn Step>,
    queue: Arc<Mutex<ContextStream>>,
    results: mpsc::Sender<Execution>,
) {
    loop {
        // the lock is released before the step runs
        let next = queue.lock().await.recv().await;
        let Some(ctx) = next else {
            break;
        };

        let (execution, Attempt { context, result }) = run_guarded(worker, &*step, ctx).await;
        let execution = execution.finish(result, &context);

        if let Some(err) = execution.error() {
            warn!("{}: {:#}", execution.description(), err);
        }

        if results.send(execution).await.is_err() {
            debug!("Worker {} stopped, result stream dropped", worker);
            break;
        }
    }
    debug!("Worker {} finished", worker);
}

/// Describe and run `step`; a panic in either becomes the execution's error
async fn run_guarded(
    worker: usize,
    step: &dyn Step,
    ctx: ExecutionContext,
) -> (Execution, Attempt) {
    let description = match panic::catch_unwind(AssertUnwindSafe(|| step.describe(&ctx))) {
        Ok(description) => description,
        Err(panic) => {
            let message = panic_message(&*panic);
            error!("Worker {}: describe panicked: {}", worker, message);
            let execution = Execution::start(String::new(), &ctx);
            let result = Err(anyhow::anyhow!("describe panicked: {}", message));
            return (execution, Attempt { context: ctx, result });
        }
    };
    debug!("Worker {} starting {}", worker, description);

    let execution = Execution::start(description, &ctx);
    let fallback = ctx.clone();
    let attempt = match AssertUnwindSafe(step.attempt(ctx)).catch_unwind().await {
        Ok(attempt) => attempt,
        Err(panic) => {
            let message = panic_message(&*panic);
            error!("Worker {}: {} panicked: {}", worker, execution.description(), message);
            Attempt {
                context: fallback,
                result: Err(anyhow::anyhow!("step panicked: {}", message)),
            }
        }
    };
    (execution, attempt)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Data;
    use crate::executor::{collect, context_stream};
    use crate::step::{func, retry};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn contexts(n: u64) -> ContextStream {
        ExecutionContext::new().populate(n, |i| {
            [("n".to_string(), i.to_string())].into_iter().collect()
        })
    }

    #[test]
    fn test_executor_creation() {
        assert_eq!(ParallelExecutor::new(8).workers(), 8);
        assert_eq!(ParallelExecutor::new(0).workers(), 1);
        assert_eq!(ParallelExecutor::default().workers(), 1);
    }

    #[tokio::test]
    async fn test_run_parallel_all_contexts() {
        let step: Arc<dyn Step> = Arc::new(func("ok {{.Test.n}}", || Ok(())));
        let mut stream = run_parallel(2, step, contexts(3));

        let mut executions = Vec::new();
        while let Some(execution) = stream.recv().await {
            executions.push(execution);
        }

        assert_eq!(executions.len(), 3);
        assert!(executions.iter().all(Execution::is_success));
        let numbers: HashSet<u64> = executions.iter().map(|e| e.test_number()).collect();
        assert_eq!(numbers, HashSet::from([1, 2, 3]));
        let descriptions: HashSet<&str> = executions.iter().map(|e| e.description()).collect();
        assert!(descriptions.contains("ok 2"));

        // closed after the last execution
        assert!(stream.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_zero_workers_treated_as_one() {
        let step: Arc<dyn Step> = Arc::new(func("ok", || Ok(())));
        let executions = collect(run_parallel(0, step, contexts(4))).await;
        assert_eq!(executions.len(), 4);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_other_contexts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let step: Arc<dyn Step> = Arc::new(func("odd fails", move || {
            if counter.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
                anyhow::bail!("failed");
            }
            Ok(())
        }));

        let executions = collect(run_parallel(3, step, contexts(10))).await;
        assert_eq!(executions.len(), 10);
        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert_eq!(executions.iter().filter(|e| e.error().is_some()).count(), 5);
    }

    #[tokio::test]
    async fn test_workers_run_concurrently() {
        struct Sleepy(Arc<AtomicUsize>, Arc<AtomicUsize>);

        impl Step for Sleepy {
            fn describe(&self, _ctx: &ExecutionContext) -> String {
                "sleepy".to_string()
            }

            fn execute<'a>(
                &'a self,
                _ctx: &'a ExecutionContext,
            ) -> futures::future::BoxFuture<'a, anyhow::Result<()>> {
                Box::pin(async move {
                    let running = self.0.fetch_add(1, Ordering::SeqCst) + 1;
                    self.1.fetch_max(running, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    self.0.fetch_sub(1, Ordering::SeqCst);
                    let result: anyhow::Result<()> = Ok(());
                    result
                })
            }
        }

        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let step: Arc<dyn Step> = Arc::new(Sleepy(running, peak.clone()));
        let stream = context_stream((0..6).map(|_| ExecutionContext::new().derive(Data::new())));

        let executions = collect(run_parallel(3, step, stream)).await;
        assert_eq!(executions.len(), 6);
        let peak = peak.load(Ordering::SeqCst);
        assert!(peak > 1 && peak <= 3, "peak concurrency was {peak}");
    }

    #[tokio::test]
    async fn test_records_final_retry_count() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let flaky = func("flaky", move || {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                anyhow::bail!("not yet");
            }
            Ok(())
        });
        let step: Arc<dyn Step> = Arc::new(retry(flaky, 4).with_backoff(Duration::ZERO));

        let executions = collect(run(step, contexts(1))).await;
        assert_eq!(executions.len(), 1);
        assert!(executions[0].is_success());
        assert_eq!(executions[0].retries(), 2);
    }

    #[tokio::test]
    async fn test_panicking_describe_is_recorded() {
        struct Unnamed(Arc<AtomicUsize>);

        impl Step for Unnamed {
            fn describe(&self, _ctx: &ExecutionContext) -> String {
                panic!("no name")
            }

            fn execute<'a>(
                &'a self,
                _ctx: &'a ExecutionContext,
            ) -> futures::future::BoxFuture<'a, anyhow::Result<()>> {
                self.0.fetch_add(1, Ordering::SeqCst);
                let result: anyhow::Result<()> = Ok(());
                Box::pin(async move { result })
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let step: Arc<dyn Step> = Arc::new(Unnamed(calls.clone()));
        let executions = collect(run_parallel(2, step, contexts(3))).await;

        assert_eq!(executions.len(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        for execution in &executions {
            let err = execution.error().unwrap().to_string();
            assert!(err.contains("no name"), "unexpected error {err}");
            assert!(execution.is_finished());
        }
    }

    #[tokio::test]
    async fn test_panicking_step_is_recorded() {
        let step: Arc<dyn Step> = Arc::new(func("panics", || panic!("kaboom")));
        let executions = collect(run_parallel(2, step, contexts(2))).await;

        assert_eq!(executions.len(), 2);
        for execution in &executions {
            let err = execution.error().unwrap().to_string();
            assert!(err.contains("kaboom"), "unexpected error {err}");
        }
    }
}
