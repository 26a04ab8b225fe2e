//! The single consumer of the schedule queue.
//!
//! One dispatcher thread per scheduler keeps hand-offs to the worker pool in
//! due-time order. The loop only ends when the queue reports it is closed.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tempo_core::{SchedulerError, TaskStatus};
use tracing::{debug, error, info, warn};

use crate::pool::WorkerPool;
use crate::queue::ScheduleQueue;
use crate::registry::TaskRegistry;

pub struct Dispatcher {
    handle: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Start the dispatcher thread.
    pub fn spawn(
        thread_name: String,
        queue: Arc<ScheduleQueue>,
        registry: Arc<TaskRegistry>,
        pool: Arc<WorkerPool>,
    ) -> Result<Self, SchedulerError> {
        let handle = thread::Builder::new()
            .name(thread_name)
            .spawn(move || run(&queue, &registry, &pool))
            .map_err(|e| SchedulerError::Spawn(e.to_string()))?;
        Ok(Self { handle: Some(handle) })
    }

    /// Wait for the loop to exit. Only returns once the queue has been closed.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("dispatcher thread panicked");
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }
}

fn run(queue: &ScheduleQueue, registry: &TaskRegistry, pool: &WorkerPool) {
    info!("Dispatcher started");
    loop {
        let task = match queue.take() {
            Ok(task) => task,
            Err(SchedulerError::QueueClosed) => break,
            Err(e) => {
                error!(error = %e, "schedule queue failed, stopping dispatcher");
                break;
            }
        };

        let id = task.id();
        if registry.is_cancelled(id) {
            debug!(task_id = %id, name = %task.name(), "dropping cancelled task");
            continue;
        }

        debug!(task_id = %id, name = %task.name(), "dispatching task");
        if let Err(e) = pool.submit(task) {
            warn!(task_id = %id, error = %e, "worker pool rejected task");
            // Nothing will run it now; don't leave it looking scheduled.
            let _ = registry.update_status(id, TaskStatus::Cancelled);
        }
    }
    info!("Dispatcher stopped");
}
