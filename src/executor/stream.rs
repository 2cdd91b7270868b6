//! Stream helpers

use tokio::sync::mpsc;

use super::ExecutionStream;
use crate::context::{ContextStream, ExecutionContext};
use crate::models::Execution;

/// Closed stream pre-filled with `contexts`
pub fn context_stream<I>(contexts: I) -> ContextStream
where
    I: IntoIterator<Item = ExecutionContext>,
{
    let contexts: Vec<ExecutionContext> = contexts.into_iter().collect();
    let (tx, rx) = mpsc::channel(contexts.len().max(1));
    for ctx in contexts {
        // capacity covers every context, so this never fails
        let _ = tx.try_send(ctx);
    }
    rx
}

/// Drain `stream` until it is closed
pub async fn collect(mut stream: ExecutionStream) -> Vec<Execution> {
    let mut executions = Vec::new();
    while let Some(execution) = stream.recv().await {
        executions.push(execution);
    }
    executions
}
