use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// How a dequeued task should settle its slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    Run,
    Abandon,
}

type Job<'a> = Box<dyn FnOnce(Disposition) + Send + 'a>;

/// A unit of work that settles exactly one barrier slot
pub(crate) struct Task {
    job: Job<'static>,
}

impl Task {
    #[cfg(test)]
    pub(crate) fn new<F>(job: F) -> Self
    where
        F: FnOnce(Disposition) + Send + 'static,
    {
        Task { job: Box::new(job) }
    }

    /// Wrap a job that borrows from the submitting caller's stack
    ///
    /// # Safety
    ///
    /// The caller must not let the borrowed data go out of scope before the
    /// job has been consumed by [`Task::run`] or [`Task::abandon`], and the job
    /// must not touch the borrows after it has settled its slot.
    pub(crate) unsafe fn scoped<'a, F>(job: F) -> Self
    where
        F: FnOnce(Disposition) + Send + 'a,
    {
        let job: Job<'a> = Box::new(job);
        // only the lifetime changes, the fat pointer layout is identical
        let job = unsafe { std::mem::transmute::<Job<'a>, Job<'static>>(job) };
        Task { job }
    }

    pub(crate) fn run(self) {
        (self.job)(Disposition::Run)
    }

    pub(crate) fn abandon(self) {
        (self.job)(Disposition::Abandon)
    }
}

struct State {
    tasks: VecDeque<Task>,
    closing: bool,
}

/// Unbounded FIFO shared by every worker of a pool
pub(crate) struct TaskQueue {
    state: Mutex<State>,
    available: Condvar,
}

impl TaskQueue {
    pub(crate) fn new() -> Self {
        TaskQueue {
            state: Mutex::new(State {
                tasks: VecDeque::new(),
                closing: false,
            }),
            available: Condvar::new(),
        }
    }

    // hands the task back once the queue is closing, nothing is accepted after the drain
    pub(crate) fn push(&self, task: Task) -> Result<(), Task> {
        let mut state = self.lock();
        if state.closing {
            return Err(task);
        }
        state.tasks.push_back(task);
        drop(state);
        self.available.notify_one();
        Ok(())
    }

    /// Block until a task is available, `None` once the queue is closing
    pub(crate) fn pop(&self) -> Option<Task> {
        let mut state = self.lock();
        while state.tasks.is_empty() && !state.closing {
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if state.closing {
            return None;
        }
        state.tasks.pop_front()
    }

    // returns true for the call that actually closed the queue
    pub(crate) fn close(&self) -> bool {
        let mut state = self.lock();
        let first = !state.closing;
        state.closing = true;
        drop(state);
        self.available.notify_all();
        first
    }

    pub(crate) fn drain(&self) -> Vec<Task> {
        self.lock().tasks.drain(..).collect()
    }

    pub(crate) fn is_closing(&self) -> bool {
        self.lock().closing
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::mpsc;
    use std::thread;

    fn tagged(tag: usize, log: mpsc::Sender<(usize, Disposition)>) -> Task {
        Task::new(move |disposition| {
            let _ = log.send((tag, disposition));
        })
    }

    #[test]
    fn pops_in_push_order() {
        let queue = TaskQueue::new();
        let (tx, rx) = mpsc::channel();
        for tag in 0..4 {
            assert!(queue.push(tagged(tag, tx.clone())).is_ok());
        }
        assert_eq!(queue.len(), 4);

        for _ in 0..4 {
            queue.pop().unwrap().run();
        }
        let order: Vec<_> = rx.try_iter().map(|(tag, _)| tag).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn blocked_pop_wakes_on_push() {
        let queue = Arc::new(TaskQueue::new());
        let (tx, rx) = mpsc::channel();

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop().map(Task::run).is_some())
        };
        assert!(queue.push(tagged(7, tx)).is_ok());

        assert!(consumer.join().unwrap());
        assert_eq!(rx.recv().unwrap(), (7, Disposition::Run));
    }

    #[test]
    fn close_cancels_blocked_poppers() {
        let queue = Arc::new(TaskQueue::new());
        let poppers: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || queue.pop().is_none())
            })
            .collect();

        assert!(queue.close());
        assert!(!queue.close());
        for popper in poppers {
            assert!(popper.join().unwrap());
        }
    }

    #[test]
    fn closed_queue_rejects_and_drains() {
        let queue = TaskQueue::new();
        let (tx, rx) = mpsc::channel();
        for tag in 1..=3 {
            assert!(queue.push(tagged(tag, tx.clone())).is_ok());
        }

        queue.close();
        assert!(queue.is_closing());
        assert!(queue.pop().is_none());

        let rejected = queue.push(tagged(4, tx)).unwrap_err();
        rejected.abandon();

        for task in queue.drain() {
            task.abandon();
        }
        let settled: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            settled,
            vec![
                (4, Disposition::Abandon),
                (1, Disposition::Abandon),
                (2, Disposition::Abandon),
                (3, Disposition::Abandon),
            ]
        );
    }
}
