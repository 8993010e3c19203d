use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use crate::barrier::ResultBarrier;
use crate::config::Builder;
use crate::error::{ChunkFailure, Error, Result};
use crate::queue::{Disposition, Task, TaskQueue};
use crate::worker;

/// Where a pool is in its shutdown sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Open,
    Closing,
    Closed,
}

/// Fixed set of worker threads draining one shared FIFO queue
///
/// Work is submitted with [`ThreadPool::map`], which blocks until every
/// element has been processed and returns the results in input order.
/// Dropping the pool closes it.
pub struct ThreadPool {
    queue: Arc<TaskQueue>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
    closed: AtomicBool,
}

impl ThreadPool {
    /// Start a pool with `worker_count` workers and default settings
    pub fn new(worker_count: usize) -> Result<Self> {
        Builder::new().workers(worker_count).build()
    }

    pub fn builder() -> Builder {
        Builder::new()
    }

    pub(crate) fn from_builder(builder: &Builder) -> Result<Self> {
        let worker_count = builder.worker_count();
        let queue = Arc::new(TaskQueue::new());

        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            match worker::spawn_worker(
                id,
                &builder.thread_name,
                builder.stack_size,
                Arc::clone(&queue),
            ) {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    tracing::warn!(worker = id, error = %err, "worker spawn failed, stopping pool");
                    queue.close();
                    for handle in workers {
                        if handle.join().is_err() {
                            tracing::warn!("worker thread terminated by panic");
                        }
                    }
                    return Err(Error::Spawn(err));
                }
            }
        }

        if worker_count == 0 {
            tracing::warn!("pool started without workers, submitted work will not run");
        }
        tracing::debug!(workers = worker_count, name = %builder.thread_name, "thread pool started");

        Ok(ThreadPool {
            queue,
            workers: Mutex::new(workers),
            worker_count,
            closed: AtomicBool::new(false),
        })
    }

    /// Apply `f` to every element on the pool's workers
    ///
    /// Blocks until all elements are processed. `result[i]` is always
    /// `f(&items[i])`, whichever worker ran it and in whatever order they
    /// finished. A panic in `f` is caught on the worker and reported through
    /// [`Error::AggregatedChunkFailure`] once every other element is done.
    ///
    /// Returns [`Error::Interrupted`] if the pool closes before every element
    /// has started; elements already running are allowed to finish first.
    /// On a pool with zero workers this blocks until another thread closes it.
    pub fn map<T, R, F>(&self, f: F, items: &[T]) -> Result<Vec<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync,
    {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let barrier = Arc::new(ResultBarrier::new(items.len()));
        let f = &f;
        let mut rejected = 0usize;
        for (index, item) in items.iter().enumerate() {
            let barrier = Arc::clone(&barrier);
            let job = move |disposition: Disposition| match disposition {
                Disposition::Run => match panic::catch_unwind(AssertUnwindSafe(|| f(item))) {
                    Ok(value) => barrier.record_at(index, value),
                    Err(payload) => {
                        let failure = ChunkFailure::from_panic(index, payload);
                        tracing::warn!(index, message = %failure.message, "task panicked");
                        barrier.record_failure(failure);
                    }
                },
                Disposition::Abandon => barrier.record_abandoned(index),
            };
            // SAFETY: `await_all` below does not return until every task has
            // settled its slot, on a worker, on this thread, or in `close`. The
            // queue refuses tasks once closing so none can be left behind, and
            // settling is each job's last use of `f` and `item`.
            let task = unsafe { Task::scoped(job) };
            if let Err(task) = self.queue.push(task) {
                task.abandon();
                rejected += 1;
            }
        }
        if rejected > 0 {
            tracing::debug!(
                rejected,
                unsettled = barrier.remaining_count(),
                "pool is closing, submission abandoned"
            );
        }

        barrier.await_all()
    }

    /// Stop the workers and release every waiting caller
    ///
    /// Workers finish the task they are running and exit. Tasks still queued
    /// are abandoned on this thread, which releases any caller blocked in
    /// [`ThreadPool::map`] with [`Error::Interrupted`]. Calling `close` again
    /// is a no-op. Must not be called from inside a task of the same pool.
    pub fn close(&self) {
        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        if self.closed.load(Ordering::Acquire) {
            return;
        }

        self.queue.close();
        let handles = std::mem::take(&mut *workers);
        let joined = handles.len();
        for handle in handles {
            if handle.join().is_err() {
                tracing::warn!("worker thread terminated by panic");
            }
        }

        let leftover = self.queue.drain();
        if !leftover.is_empty() {
            tracing::warn!(
                count = leftover.len(),
                "abandoning queued tasks on shutdown"
            );
        }
        for task in leftover {
            task.abandon();
        }

        self.closed.store(true, Ordering::Release);
        tracing::debug!(workers = joined, "thread pool closed");
    }

    pub fn lifecycle(&self) -> Lifecycle {
        if self.closed.load(Ordering::Acquire) {
            Lifecycle::Closed
        } else if self.queue.is_closing() {
            Lifecycle::Closing
        } else {
            Lifecycle::Open
        }
    }

    pub fn is_closed(&self) -> bool {
        self.lifecycle() == Lifecycle::Closed
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Tasks waiting in the queue, not counting ones being executed
    pub fn total_pending(&self) -> usize {
        self.queue.len()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("worker_count", &self.worker_count)
            .field("pending", &self.total_pending())
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}
