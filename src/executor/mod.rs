//! Test execution engine
//!
//! Fans a stream of contexts out to a pool of workers running one step and
//! collects the resulting executions.

mod parallel;
mod stream;

pub use parallel::{run, run_parallel, ExecutionStream, ParallelExecutor, RESULT_BUFFER};
pub use stream::{collect, context_stream};
