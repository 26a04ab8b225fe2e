use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tempo_core::{SchedulerError, TaskId, TaskKind, TaskSnapshot, TaskStatus};
use tracing::debug;

use crate::action::Action;
use crate::task::Task;

use super::request::TaskRequest;
use super::Scheduler;

impl Scheduler {
    /// Run `action` once at `execute_at`.
    ///
    /// An `execute_at` in the past runs immediately, unless it is older than
    /// the configured overdue tolerance, in which case it is rejected.
    pub fn schedule(
        &self,
        name: impl Into<String>,
        execute_at: DateTime<Utc>,
        action: Action,
    ) -> Result<TaskId, SchedulerError> {
        self.submit(TaskRequest::one_time(name, execute_at, action))
    }

    /// Run `action` once after `delay`.
    pub fn schedule_after(
        &self,
        name: impl Into<String>,
        delay: Duration,
        action: Action,
    ) -> Result<TaskId, SchedulerError> {
        let execute_at = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|delay| Utc::now().checked_add_signed(delay))
            .ok_or_else(|| {
                SchedulerError::InvalidArgument(format!("delay {delay:?} is out of range"))
            })?;
        self.schedule(name, execute_at, action)
    }

    /// Run `action` at `first_execute_at` and then every `interval`, up to
    /// `max_executions` times if given.
    pub fn schedule_recurring(
        &self,
        name: impl Into<String>,
        first_execute_at: DateTime<Utc>,
        interval: Duration,
        max_executions: Option<u64>,
        action: Action,
    ) -> Result<TaskId, SchedulerError> {
        let mut request = TaskRequest::recurring(name, first_execute_at, interval, action);
        if let Some(max) = max_executions {
            request = request.with_max_executions(max);
        }
        self.submit(request)
    }

    /// Validate and enqueue a task.
    pub fn submit(&self, request: TaskRequest) -> Result<TaskId, SchedulerError> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(SchedulerError::QueueClosed);
        }

        let now = Utc::now();
        let tolerance = chrono::Duration::milliseconds(
            i64::try_from(self.config.overdue_tolerance_ms).unwrap_or(i64::MAX),
        );
        let oldest_accepted = now.checked_sub_signed(tolerance);
        if oldest_accepted.is_some_and(|oldest| request.execute_at < oldest) {
            return Err(SchedulerError::InvalidArgument(format!(
                "execute_at {} is more than {}ms in the past",
                request.execute_at, self.config.overdue_tolerance_ms
            )));
        }

        let kind = match request.recurrence {
            None => TaskKind::OneTime,
            Some(r) => {
                if r.interval.is_zero() {
                    return Err(SchedulerError::InvalidArgument(
                        "recurring interval must be positive".to_string(),
                    ));
                }
                // The interval must fit both clocks used to reschedule.
                let representable = chrono::Duration::from_std(r.interval).is_ok()
                    && Instant::now().checked_add(r.interval).is_some();
                if !representable {
                    return Err(SchedulerError::InvalidArgument(format!(
                        "recurring interval {:?} is out of range",
                        r.interval
                    )));
                }
                if r.max_executions == Some(0) {
                    return Err(SchedulerError::InvalidArgument(
                        "max_executions must be at least 1".to_string(),
                    ));
                }
                TaskKind::Recurring {
                    interval: r.interval,
                    max_executions: r.max_executions,
                    policy: r.policy.unwrap_or(self.config.recurrence_policy),
                }
            }
        };

        let id = request.id.unwrap_or_default();
        // Overdue-but-tolerated tasks are due now.
        let scheduled_at = request.execute_at.max(now);
        let task = Task::new(id, request.name, kind, scheduled_at, request.action)?;

        self.registry
            .register(TaskSnapshot::scheduled(id, task.name(), kind, scheduled_at))?;
        if let Err(e) = self.queue.offer(task) {
            self.registry.remove(id);
            return Err(e);
        }
        // A concurrent cancel may have run before the offer landed.
        if self.registry.is_cancelled(id) {
            self.queue.remove(id);
        }

        debug!(
            task_id = %id,
            at = %scheduled_at,
            recurring = kind.is_recurring(),
            "task scheduled"
        );
        Ok(id)
    }

    /// Cancel a task. Returns `false` if it had already finished.
    ///
    /// A queued task is evicted and will never run. A running task is not
    /// interrupted, but a recurring one is not rescheduled.
    pub fn cancel(&self, id: TaskId) -> Result<bool, SchedulerError> {
        let cancelled = self.registry.cancel(id)?;
        if cancelled && self.queue.remove(id) {
            debug!(task_id = %id, "cancelled task evicted from queue");
        }
        Ok(cancelled)
    }

    pub fn status(&self, id: TaskId) -> Result<TaskStatus, SchedulerError> {
        self.registry.status(id)
    }

    pub fn snapshot(&self, id: TaskId) -> Result<TaskSnapshot, SchedulerError> {
        self.registry.get(id)
    }

    /// Snapshots of every tracked task, earliest due first.
    pub fn tasks(&self) -> Vec<TaskSnapshot> {
        let mut tasks = self.registry.list();
        tasks.sort_by_key(|t| t.scheduled_at);
        tasks
    }

    /// Forget every finished task. Returns how many were removed.
    pub fn purge_finished(&self) -> usize {
        self.registry.purge_finished()
    }
}
