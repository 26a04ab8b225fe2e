use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tempo_core::{SchedulerError, TaskId, TaskKind};

use crate::action::Action;

/// A queued instance of a task: what the dispatcher hands to the worker pool.
///
/// Status lives in the [`TaskRegistry`](crate::registry::TaskRegistry); this
/// carries only what is needed to order and run the instance.
#[derive(Debug, Clone)]
pub struct Task {
    id: TaskId,
    name: String,
    kind: TaskKind,
    due: Instant,
    scheduled_at: DateTime<Utc>,
    execution_count: u64,
    action: Action,
}

impl Task {
    /// Fails with `InvalidArgument` if `scheduled_at` is too far ahead to be
    /// represented on the monotonic clock.
    pub fn new(
        id: TaskId,
        name: impl Into<String>,
        kind: TaskKind,
        scheduled_at: DateTime<Utc>,
        action: Action,
    ) -> Result<Self, SchedulerError> {
        let due = monotonic_instant(scheduled_at).ok_or_else(|| {
            SchedulerError::InvalidArgument(format!("execute_at {scheduled_at} is too far ahead"))
        })?;
        Ok(Self {
            id,
            name: name.into(),
            kind,
            due,
            scheduled_at,
            execution_count: 0,
            action,
        })
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &TaskKind {
        &self.kind
    }

    /// Monotonic instant this instance becomes eligible.
    pub fn due(&self) -> Instant {
        self.due
    }

    pub fn scheduled_at(&self) -> DateTime<Utc> {
        self.scheduled_at
    }

    /// Executions completed before this instance.
    pub fn execution_count(&self) -> u64 {
        self.execution_count
    }

    /// Time left until the task is due; zero once it is.
    pub fn remaining_delay(&self) -> Duration {
        self.due.saturating_duration_since(Instant::now())
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    /// The follow-up instance of a recurring task, due at `due`, which the
    /// wall clock reads as `scheduled_at`.
    pub(crate) fn next_instance(&self, due: Instant, scheduled_at: DateTime<Utc>) -> Task {
        Task {
            id: self.id,
            name: self.name.clone(),
            kind: self.kind,
            due,
            scheduled_at,
            execution_count: self.execution_count + 1,
            action: self.action.clone(),
        }
    }
}

/// Map a wall-clock instant onto the monotonic clock. Past instants map to
/// now; `None` if the instant lies beyond the monotonic clock's range.
pub(crate) fn monotonic_instant(at: DateTime<Utc>) -> Option<Instant> {
    let now = Instant::now();
    match (at - Utc::now()).to_std() {
        Ok(ahead) => now.checked_add(ahead),
        Err(_) => Some(now),
    }
}

/// Map a monotonic instant onto the wall clock, saturating at the ends of
/// the calendar range.
pub(crate) fn wall_clock(at: Instant) -> DateTime<Utc> {
    let now = Instant::now();
    let wall_now = Utc::now();
    if at >= now {
        chrono::Duration::from_std(at - now)
            .ok()
            .and_then(|ahead| wall_now.checked_add_signed(ahead))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    } else {
        chrono::Duration::from_std(now - at)
            .ok()
            .and_then(|behind| wall_now.checked_sub_signed(behind))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}
