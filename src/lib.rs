// Chunk-Pool: fixed-size thread pool with order-preserving chunked reductions
// - One shared FIFO queue drained by long-lived workers
// - Results land in position-indexed slots, never re-sorted
// - Chunked maximum/minimum/all/any/join/filter/map on top of the pool
//   or on per-call scoped threads
//
// Shutdown
// Closing a pool abandons work that has not started yet. Every caller
// blocked in `ThreadPool::map` is released, with `Error::Interrupted`
// when some of its elements were abandoned.
mod barrier;
mod chunk;
mod config;
mod error;
mod parallel;
mod pool;
mod queue;
mod worker;

pub use chunk::{chunk_ranges, split};
pub use config::{
    Builder, DEFAULT_THREAD_NAME, WORKERS_ENV, default_worker_count, parse_worker_count,
};
pub use error::{ChunkFailure, Error, Result};
pub use parallel::Parallelism;
pub use pool::{Lifecycle, ThreadPool};

// convenience function to create a pool sized by the environment or the machine
pub fn new() -> Result<ThreadPool> {
    Builder::from_env()?.build()
}

// create thread pool with specific worker count
pub fn with_workers(worker_count: usize) -> Result<ThreadPool> {
    ThreadPool::new(worker_count)
}
