use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::{ChunkFailure, Error, Result};

enum Slot<R> {
    Pending,
    Ready(R),
    Failed(ChunkFailure),
    Abandoned,
}

struct State<R> {
    slots: Vec<Slot<R>>,
    remaining: usize,
    retrieved: bool,
}

/// Collects one outcome per submitted task into position-indexed slots
///
/// A barrier is created for a single call and shared by the tasks of that
/// call and the one caller blocked in [`ResultBarrier::await_all`]. Every slot
/// is settled exactly once, either with a value, a caught panic, or as
/// abandoned during shutdown. The waiter is released when the last slot
/// settles, whatever the outcome.
pub(crate) struct ResultBarrier<R> {
    state: Mutex<State<R>>,
    done: Condvar,
}

impl<R> ResultBarrier<R> {
    pub(crate) fn new(size: usize) -> Self {
        let slots = std::iter::repeat_with(|| Slot::Pending)
            .take(size)
            .collect();
        ResultBarrier {
            state: Mutex::new(State {
                slots,
                remaining: size,
                retrieved: false,
            }),
            done: Condvar::new(),
        }
    }

    /// Number of slots that have not been settled yet
    pub(crate) fn remaining_count(&self) -> usize {
        self.lock().remaining
    }

    /// Store the result computed for position `index`
    pub(crate) fn record_at(&self, index: usize, value: R) {
        self.settle(index, Slot::Ready(value));
    }

    /// Store a caught panic for the position named by the failure
    pub(crate) fn record_failure(&self, failure: ChunkFailure) {
        self.settle(failure.index, Slot::Failed(failure));
    }

    /// Release position `index` without a value
    ///
    /// Used when a task is dropped by a closing pool. The slot still counts
    /// towards completion, so the waiter is never left blocked.
    pub(crate) fn record_abandoned(&self, index: usize) {
        self.settle(index, Slot::Abandoned);
    }

    /// Block until every slot is settled, then hand back the values in order
    ///
    /// Returns [`Error::Interrupted`] if any slot was abandoned, otherwise
    /// [`Error::AggregatedChunkFailure`] if any slot failed. The slots are
    /// moved out on return, so a later call reports [`Error::Interrupted`]
    /// instead of an empty result set.
    pub(crate) fn await_all(&self) -> Result<Vec<R>> {
        let mut state = self.lock();
        while state.remaining > 0 {
            state = self
                .done
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if state.retrieved {
            tracing::debug!("results already retrieved from this barrier");
            return Err(Error::Interrupted);
        }
        state.retrieved = true;
        let slots = std::mem::take(&mut state.slots);
        drop(state);

        let mut values = Vec::with_capacity(slots.len());
        let mut failures = Vec::new();
        let mut abandoned = 0usize;
        for slot in slots {
            match slot {
                Slot::Ready(value) => values.push(value),
                Slot::Failed(failure) => failures.push(failure),
                Slot::Abandoned | Slot::Pending => abandoned += 1,
            }
        }

        if abandoned > 0 {
            tracing::debug!(abandoned, "results abandoned by pool shutdown");
            return Err(Error::Interrupted);
        }
        Error::aggregate(failures)?;
        Ok(values)
    }

    fn settle(&self, index: usize, outcome: Slot<R>) {
        let mut state = self.lock();
        let Some(slot) = state.slots.get_mut(index) else {
            debug_assert!(false, "slot {index} out of range");
            return;
        };
        if !matches!(slot, Slot::Pending) {
            debug_assert!(false, "slot {index} settled twice");
            return;
        }
        *slot = outcome;
        state.remaining -= 1;

        // last slot, wake the retriever
        if state.remaining == 0 {
            self.done.notify_all();
        }
    }

    // no user code runs under this lock, so a poisoned guard still holds consistent state
    fn lock(&self) -> MutexGuard<'_, State<R>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
