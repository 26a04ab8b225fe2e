use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique task identifier. System-assigned (UUID v4) unless the caller
/// supplies one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TaskId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Scheduled,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Whether no further transition can happen from this state.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Scheduled => write!(f, "Scheduled"),
            TaskStatus::Running => write!(f, "Running"),
            TaskStatus::Completed => write!(f, "Completed"),
            TaskStatus::Failed => write!(f, "Failed"),
            TaskStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// How the next due time of a recurring task is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrencePolicy {
    /// Next run is `interval` after the previous run *completed*.
    #[default]
    FixedDelay,
    /// Next run is `interval` after the previous run was *due*. An overrun
    /// makes the next run due immediately; missed slots are not replayed.
    FixedRate,
}

impl RecurrencePolicy {
    /// Compute the next due instant for a recurring task, or `None` if it
    /// falls beyond what the monotonic clock can represent.
    pub fn next_due(
        self,
        previous_due: Instant,
        completed_at: Instant,
        interval: Duration,
    ) -> Option<Instant> {
        match self {
            RecurrencePolicy::FixedDelay => completed_at.checked_add(interval),
            RecurrencePolicy::FixedRate => previous_due.checked_add(interval),
        }
    }
}

impl FromStr for RecurrencePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "fixed_delay" => Ok(RecurrencePolicy::FixedDelay),
            "fixed_rate" => Ok(RecurrencePolicy::FixedRate),
            other => Err(format!(
                "unknown recurrence policy '{other}', expected 'fixed_delay' or 'fixed_rate'"
            )),
        }
    }
}

impl fmt::Display for RecurrencePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecurrencePolicy::FixedDelay => write!(f, "fixed_delay"),
            RecurrencePolicy::FixedRate => write!(f, "fixed_rate"),
        }
    }
}

/// One-shot or recurring. Behaviour differs only after an execution finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskKind {
    OneTime,
    Recurring {
        interval: Duration,
        /// Cap on total executions; `None` runs until cancelled.
        max_executions: Option<u64>,
        policy: RecurrencePolicy,
    },
}

impl TaskKind {
    pub fn is_recurring(&self) -> bool {
        matches!(self, TaskKind::Recurring { .. })
    }

    /// Whether another execution may follow once `executions` runs are done.
    pub fn allows_another_run(&self, executions: u64) -> bool {
        match self {
            TaskKind::OneTime => false,
            TaskKind::Recurring { max_executions: Some(max), .. } => executions < *max,
            TaskKind::Recurring { max_executions: None, .. } => true,
        }
    }
}

/// Point-in-time view of a task as tracked by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub name: String,
    pub kind: TaskKind,
    pub status: TaskStatus,
    /// Wall-clock instant the current (or last) instance became eligible.
    pub scheduled_at: DateTime<Utc>,
    pub execution_count: u64,
    pub last_started_at: Option<DateTime<Utc>>,
    pub last_finished_at: Option<DateTime<Utc>>,
    /// Error text of the most recent failed execution.
    pub last_error: Option<String>,
    /// Set when a cancel arrived while the task was running.
    pub cancel_requested: bool,
}

impl TaskSnapshot {
    /// Fresh snapshot for a task that has just been scheduled.
    pub fn scheduled(
        id: TaskId,
        name: impl Into<String>,
        kind: TaskKind,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            status: TaskStatus::Scheduled,
            scheduled_at,
            execution_count: 0,
            last_started_at: None,
            last_finished_at: None,
            last_error: None,
            cancel_requested: false,
        }
    }

    /// Due time as milliseconds since the Unix epoch.
    pub fn scheduled_time_ms(&self) -> i64 {
        self.scheduled_at.timestamp_millis()
    }
}

/// A single status transition, published to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub task_id: TaskId,
    pub name: String,
    /// `None` when the task was just registered.
    pub from: Option<TaskStatus>,
    pub to: TaskStatus,
    pub scheduled_at: DateTime<Utc>,
    pub execution_count: u64,
    pub at: DateTime<Utc>,
}

impl StatusChange {
    pub fn new(snapshot: &TaskSnapshot, from: Option<TaskStatus>) -> Self {
        Self {
            task_id: snapshot.id,
            name: snapshot.name.clone(),
            from,
            to: snapshot.status,
            scheduled_at: snapshot.scheduled_at,
            execution_count: snapshot.execution_count,
            at: Utc::now(),
        }
    }
}
