//! Fixed-size worker pool that runs task actions.
//!
//! Each execution goes through the registry first (Running, then the
//! terminal or rescheduled status) and only then touches the queue, so no
//! thread ever holds a registry entry lock and the queue lock together.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parking_lot::{Condvar, Mutex};
use tempo_core::{SchedulerError, TaskKind, TaskStatus};
use tracing::{debug, error, warn};

use crate::queue::ScheduleQueue;
use crate::registry::{RunDisposition, TaskRegistry};
use crate::task::{wall_clock, Task};

/// Count of submitted-but-unfinished executions, with a wakeup for drains.
#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    fn enter(self: &Arc<Self>) -> InFlightGuard {
        *self.count.lock() += 1;
        InFlightGuard(Arc::clone(self))
    }

    fn wait_idle(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.idle.wait(&mut count);
        }
    }
}

struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut count = self.0.count.lock();
        *count -= 1;
        if *count == 0 {
            self.0.idle.notify_all();
        }
    }
}

pub struct WorkerPool {
    pool: rayon::ThreadPool,
    registry: Arc<TaskRegistry>,
    queue: Arc<ScheduleQueue>,
    in_flight: Arc<InFlight>,
    accepting: AtomicBool,
    size: usize,
}

impl WorkerPool {
    /// Build a pool of `size` threads named `{name_prefix}-worker-{i}`.
    pub fn new(
        size: usize,
        name_prefix: &str,
        registry: Arc<TaskRegistry>,
        queue: Arc<ScheduleQueue>,
    ) -> Result<Self, SchedulerError> {
        if size == 0 {
            return Err(SchedulerError::InvalidArgument(
                "worker pool size must be positive".to_string(),
            ));
        }
        let prefix = name_prefix.to_string();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(move |i| format!("{prefix}-worker-{i}"))
            .panic_handler(|_| error!("worker thread panicked outside a task action"))
            .build()
            .map_err(|e| SchedulerError::Spawn(e.to_string()))?;

        Ok(Self {
            pool,
            registry,
            queue,
            in_flight: Arc::new(InFlight::default()),
            accepting: AtomicBool::new(true),
            size,
        })
    }

    /// Hand a dispatched task to a worker. Fails with
    /// [`SchedulerError::QueueClosed`] once the pool has been closed.
    pub fn submit(&self, task: Task) -> Result<(), SchedulerError> {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(SchedulerError::QueueClosed);
        }
        let guard = self.in_flight.enter();
        let registry = Arc::clone(&self.registry);
        let queue = Arc::clone(&self.queue);

        self.pool.spawn(move || {
            let _guard = guard;
            execute(&registry, &queue, task);
        });
        Ok(())
    }

    /// Stop accepting new submissions. Executions already submitted finish.
    pub fn close(&self) {
        self.accepting.store(false, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        !self.accepting.load(Ordering::Acquire)
    }

    /// Block until every submitted execution has finished.
    pub fn wait_idle(&self) {
        self.in_flight.wait_idle();
    }

    /// Executions submitted and not yet finished.
    pub fn in_flight(&self) -> usize {
        *self.in_flight.count.lock()
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

/// Run one task instance to completion and reschedule it if it recurs.
fn execute(registry: &TaskRegistry, queue: &ScheduleQueue, task: Task) {
    let id = task.id();
    if !registry.begin_run(id, Utc::now()) {
        debug!(task_id = %id, name = %task.name(), "skipping cancelled task");
        return;
    }

    debug!(task_id = %id, name = %task.name(), run = task.execution_count() + 1, "task started");
    let outcome = task.action().invoke();
    let completed_at = Instant::now();

    if let Err(e) = &outcome {
        warn!(task_id = %id, name = %task.name(), error = %e, "task failed");
    }

    let next_due = match *task.kind() {
        TaskKind::Recurring { interval, policy, .. } => {
            let due = policy.next_due(task.due(), completed_at, interval);
            if due.is_none() {
                warn!(
                    task_id = %id,
                    name = %task.name(),
                    "next run is out of clock range, not rescheduling"
                );
            }
            due
        }
        TaskKind::OneTime => None,
    };
    // One wall-clock reading shared by the registry and the queued instance.
    let next = next_due.map(|due| (due, wall_clock(due)));

    let disposition = match registry.finish_run(id, &outcome, next.map(|(_, at)| at)) {
        Ok(d) => d,
        Err(e) => {
            // Purged while running; nothing left to update.
            debug!(task_id = %id, error = %e, "task vanished from registry");
            return;
        }
    };

    match (disposition, next) {
        (RunDisposition::Rescheduled, Some((due, scheduled_at))) => {
            match queue.offer(task.next_instance(due, scheduled_at)) {
                Ok(()) => {
                    // A cancel may have slipped in between the registry
                    // update and the offer.
                    if registry.is_cancelled(id) {
                        queue.remove(id);
                    } else {
                        debug!(
                            task_id = %id,
                            name = %task.name(),
                            next = %scheduled_at,
                            "task rescheduled"
                        );
                    }
                }
                Err(e) => {
                    debug!(task_id = %id, error = %e, "could not reschedule task");
                    let _ = registry.update_status(id, TaskStatus::Cancelled);
                }
            }
        }
        (RunDisposition::Finished(status), _) => {
            debug!(task_id = %id, name = %task.name(), status = %status, "task finished");
        }
        (RunDisposition::Rescheduled, None) => {
            error!(task_id = %id, "one-time task marked for rescheduling");
        }
    }
}
