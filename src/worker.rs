use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::queue::TaskQueue;

pub(crate) fn spawn_worker(
    id: usize,
    name_prefix: &str,
    stack_size: Option<usize>,
    queue: Arc<TaskQueue>,
) -> io::Result<JoinHandle<()>> {
    let mut builder = thread::Builder::new().name(format!("{name_prefix}{id}"));
    if let Some(bytes) = stack_size {
        builder = builder.stack_size(bytes);
    }

    builder.spawn(move || {
        tracing::trace!(worker = id, "worker started");
        let mut executed = 0usize;

        // pop reports None once the pool starts closing
        while let Some(task) = queue.pop() {
            if queue.is_closing() {
                task.abandon();
                break;
            }
            task.run();
            executed += 1;
        }

        tracing::trace!(worker = id, executed, "worker stopped");
    })
}
