//! Concurrent map from task id to the current task snapshot.
//!
//! The outer map lock is held only to look up or insert an entry; every
//! transition happens under that entry's own lock, so a check-then-act such
//! as [`TaskRegistry::begin_run`] is atomic against [`TaskRegistry::cancel`].

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tempo_core::{SchedulerError, StatusChange, TaskId, TaskSnapshot, TaskStatus};
use tracing::error;

use crate::observer::StatusObserver;

type Entry = Arc<Mutex<TaskSnapshot>>;

/// What happened to a task after one of its executions finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunDisposition {
    /// A recurring task was set back to Scheduled and must be re-queued.
    Rescheduled,
    /// The task reached a terminal status.
    Finished(TaskStatus),
}

pub struct TaskRegistry {
    entries: RwLock<HashMap<TaskId, Entry>>,
    observers: Vec<Arc<dyn StatusObserver>>,
    retain_history: bool,
}

impl TaskRegistry {
    pub fn new(retain_history: bool) -> Self {
        Self::with_observers(retain_history, Vec::new())
    }

    pub fn with_observers(retain_history: bool, observers: Vec<Arc<dyn StatusObserver>>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            observers,
            retain_history,
        }
    }

    fn entry(&self, id: TaskId) -> Option<Entry> {
        self.entries.read().get(&id).cloned()
    }

    /// Track a newly scheduled task. An id may be reused once its previous
    /// task has finished.
    pub fn register(&self, snapshot: TaskSnapshot) -> Result<(), SchedulerError> {
        let change = StatusChange::new(&snapshot, None);
        {
            let mut entries = self.entries.write();
            if let Some(existing) = entries.get(&snapshot.id) {
                if !existing.lock().status.is_terminal() {
                    return Err(SchedulerError::InvalidArgument(format!(
                        "task id {} is already in use",
                        snapshot.id
                    )));
                }
            }
            entries.insert(snapshot.id, Arc::new(Mutex::new(snapshot)));
        }
        self.notify(&change);
        Ok(())
    }

    pub fn get(&self, id: TaskId) -> Result<TaskSnapshot, SchedulerError> {
        self.entry(id)
            .map(|entry| entry.lock().clone())
            .ok_or(SchedulerError::TaskNotFound(id))
    }

    pub fn status(&self, id: TaskId) -> Result<TaskStatus, SchedulerError> {
        self.entry(id)
            .map(|entry| entry.lock().status)
            .ok_or(SchedulerError::TaskNotFound(id))
    }

    /// Unconditionally set a task's status.
    pub fn update_status(&self, id: TaskId, status: TaskStatus) -> Result<(), SchedulerError> {
        let entry = self.entry(id).ok_or(SchedulerError::TaskNotFound(id))?;
        let change = {
            let mut snap = entry.lock();
            let from = snap.status;
            if from == status {
                return Ok(());
            }
            snap.status = status;
            StatusChange::new(&snap, Some(from))
        };
        self.notify(&change);
        self.forget_if_finished(id, &entry, status);
        Ok(())
    }

    /// Cancel a task.
    ///
    /// A scheduled task becomes Cancelled. A running task only has the
    /// request recorded: the execution in flight is not interrupted, but no
    /// further recurrence follows. Returns `false` if the task had already
    /// finished.
    pub fn cancel(&self, id: TaskId) -> Result<bool, SchedulerError> {
        let entry = self.entry(id).ok_or(SchedulerError::TaskNotFound(id))?;
        let change = {
            let mut snap = entry.lock();
            match snap.status {
                TaskStatus::Scheduled => {
                    snap.status = TaskStatus::Cancelled;
                    snap.cancel_requested = true;
                    StatusChange::new(&snap, Some(TaskStatus::Scheduled))
                }
                TaskStatus::Running => {
                    snap.cancel_requested = true;
                    return Ok(true);
                }
                _ => return Ok(false),
            }
        };
        self.notify(&change);
        self.forget_if_finished(id, &entry, TaskStatus::Cancelled);
        Ok(true)
    }

    /// Whether the dispatcher should drop this task instead of running it.
    /// Unknown ids count as cancelled.
    pub fn is_cancelled(&self, id: TaskId) -> bool {
        match self.entry(id) {
            Some(entry) => {
                let snap = entry.lock();
                snap.status == TaskStatus::Cancelled || snap.cancel_requested
            }
            None => true,
        }
    }

    /// Move a scheduled task to Running. Returns `false`, leaving the entry
    /// untouched, if it was cancelled in the meantime.
    pub fn begin_run(&self, id: TaskId, started_at: DateTime<Utc>) -> bool {
        let Some(entry) = self.entry(id) else {
            return false;
        };
        let change = {
            let mut snap = entry.lock();
            if snap.status != TaskStatus::Scheduled || snap.cancel_requested {
                return false;
            }
            snap.status = TaskStatus::Running;
            snap.last_started_at = Some(started_at);
            StatusChange::new(&snap, Some(TaskStatus::Scheduled))
        };
        self.notify(&change);
        true
    }

    /// Record the outcome of an execution.
    ///
    /// When `next_at` is given, the task is recurring, was not cancelled
    /// while running, and is below its execution cap, the entry moves back to
    /// Scheduled at `next_at` and [`RunDisposition::Rescheduled`] is returned.
    pub fn finish_run(
        &self,
        id: TaskId,
        outcome: &Result<(), SchedulerError>,
        next_at: Option<DateTime<Utc>>,
    ) -> Result<RunDisposition, SchedulerError> {
        let entry = self.entry(id).ok_or(SchedulerError::TaskNotFound(id))?;
        let mut changes = Vec::with_capacity(2);
        let disposition = {
            let mut snap = entry.lock();
            snap.execution_count += 1;
            snap.last_finished_at = Some(Utc::now());
            let finished = match outcome {
                Ok(()) => TaskStatus::Completed,
                Err(e) => {
                    snap.last_error = Some(e.to_string());
                    TaskStatus::Failed
                }
            };
            let from = snap.status;
            snap.status = finished;
            changes.push(StatusChange::new(&snap, Some(from)));

            match next_at {
                Some(at)
                    if !snap.cancel_requested
                        && snap.kind.allows_another_run(snap.execution_count) =>
                {
                    snap.status = TaskStatus::Scheduled;
                    snap.scheduled_at = at;
                    changes.push(StatusChange::new(&snap, Some(finished)));
                    RunDisposition::Rescheduled
                }
                _ => RunDisposition::Finished(finished),
            }
        };
        for change in &changes {
            self.notify(change);
        }
        if let RunDisposition::Finished(status) = disposition {
            self.forget_if_finished(id, &entry, status);
        }
        Ok(disposition)
    }

    /// Drop an entry outright.
    pub fn remove(&self, id: TaskId) -> Option<TaskSnapshot> {
        self.entries
            .write()
            .remove(&id)
            .map(|entry| entry.lock().clone())
    }

    /// Remove every task in a terminal status. Returns how many were removed.
    pub fn purge_finished(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.lock().status.is_terminal());
        before - entries.len()
    }

    /// Snapshots of every tracked task.
    pub fn list(&self) -> Vec<TaskSnapshot> {
        self.entries
            .read()
            .values()
            .map(|entry| entry.lock().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop `entry` once it is terminal, unless history is retained. The id
    /// may already belong to a newly registered task, which is left alone.
    fn forget_if_finished(&self, id: TaskId, entry: &Entry, status: TaskStatus) {
        if self.retain_history || !status.is_terminal() {
            return;
        }
        let mut entries = self.entries.write();
        if entries.get(&id).is_some_and(|current| Arc::ptr_eq(current, entry)) {
            entries.remove(&id);
        }
    }

    fn notify(&self, change: &StatusChange) {
        for observer in &self.observers {
            let call = AssertUnwindSafe(|| observer.on_status_change(change));
            if panic::catch_unwind(call).is_err() {
                error!(task_id = %change.task_id, "status observer panicked");
            }
        }
    }
}
