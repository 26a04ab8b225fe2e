use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use parking_lot::Mutex;
use tempo_core::{SchedulerConfig, SchedulerError};
use tracing::info;

use crate::dispatcher::Dispatcher;
use crate::observer::StatusObserver;
use crate::pool::WorkerPool;
use crate::queue::ScheduleQueue;
use crate::registry::TaskRegistry;

/// The delayed task scheduler. Tasks are queued by due time, handed off by a
/// single dispatcher thread, and executed on a fixed-size worker pool.
///
/// Dropping the scheduler shuts it down, draining running tasks when
/// `drain_on_shutdown` is set.
pub struct Scheduler {
    pub(super) config: SchedulerConfig,
    pub(super) queue: Arc<ScheduleQueue>,
    pub(super) registry: Arc<TaskRegistry>,
    pub(super) pool: Arc<WorkerPool>,
    /// Taken on shutdown.
    pub(super) dispatcher: Mutex<Option<Dispatcher>>,
    pub(super) shut_down: AtomicBool,
}

/// Configures observers before the scheduler threads start.
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    observers: Vec<Arc<dyn StatusObserver>>,
}

impl SchedulerBuilder {
    pub fn observer(mut self, observer: impl StatusObserver + 'static) -> Self {
        self.observers.push(Arc::new(observer));
        self
    }

    pub fn shared_observer(mut self, observer: Arc<dyn StatusObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Validate the config and start the dispatcher and worker threads.
    pub fn start(self) -> Result<Scheduler, SchedulerError> {
        let config = self.config;
        config.validate()?;

        let workers = config.resolved_worker_threads();
        let registry = Arc::new(TaskRegistry::with_observers(
            config.retain_history,
            self.observers,
        ));
        let queue = Arc::new(ScheduleQueue::new());
        let pool = Arc::new(WorkerPool::new(
            workers,
            &config.thread_name_prefix,
            Arc::clone(&registry),
            Arc::clone(&queue),
        )?);
        let dispatcher = Dispatcher::spawn(
            format!("{}-dispatcher", config.thread_name_prefix),
            Arc::clone(&queue),
            Arc::clone(&registry),
            Arc::clone(&pool),
        )?;

        info!(
            "Scheduler started with {} workers (policy: {}, overdue tolerance: {}ms)",
            workers, config.recurrence_policy, config.overdue_tolerance_ms
        );

        Ok(Scheduler {
            config,
            queue,
            registry,
            pool,
            dispatcher: Mutex::new(Some(dispatcher)),
            shut_down: AtomicBool::new(false),
        })
    }
}

impl Scheduler {
    pub fn builder(config: SchedulerConfig) -> SchedulerBuilder {
        SchedulerBuilder {
            config,
            observers: Vec::new(),
        }
    }

    /// Start a scheduler with no observers.
    pub fn start(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        Self::builder(config).start()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize {
        self.pool.size()
    }

    /// Tasks waiting in the queue.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Executions handed to the pool and not yet finished.
    pub fn running(&self) -> usize {
        self.pool.in_flight()
    }
}
