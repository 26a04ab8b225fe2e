use std::time::Duration;

use chrono::{DateTime, Utc};
use tempo_core::{RecurrencePolicy, TaskId};

use crate::action::Action;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Recurrence {
    pub(crate) interval: Duration,
    pub(crate) max_executions: Option<u64>,
    /// `None` falls back to the scheduler's configured policy.
    pub(crate) policy: Option<RecurrencePolicy>,
}

/// Everything needed to schedule a task, for callers that want more control
/// than [`Scheduler::schedule`](crate::Scheduler::schedule) offers.
#[derive(Debug, Clone)]
pub struct TaskRequest {
    pub(crate) id: Option<TaskId>,
    pub(crate) name: String,
    pub(crate) execute_at: DateTime<Utc>,
    pub(crate) recurrence: Option<Recurrence>,
    pub(crate) action: Action,
}

impl TaskRequest {
    pub fn one_time(name: impl Into<String>, execute_at: DateTime<Utc>, action: Action) -> Self {
        Self {
            id: None,
            name: name.into(),
            execute_at,
            recurrence: None,
            action,
        }
    }

    /// A task first due at `first_execute_at`, then every `interval`.
    pub fn recurring(
        name: impl Into<String>,
        first_execute_at: DateTime<Utc>,
        interval: Duration,
        action: Action,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            execute_at: first_execute_at,
            recurrence: Some(Recurrence {
                interval,
                max_executions: None,
                policy: None,
            }),
            action,
        }
    }

    /// Use a caller-assigned id instead of a generated one.
    pub fn with_id(mut self, id: TaskId) -> Self {
        self.id = Some(id);
        self
    }

    /// Cap the number of executions. No effect on one-time tasks.
    pub fn with_max_executions(mut self, max: u64) -> Self {
        if let Some(r) = self.recurrence.as_mut() {
            r.max_executions = Some(max);
        }
        self
    }

    /// Override the configured recurrence policy. No effect on one-time tasks.
    pub fn with_policy(mut self, policy: RecurrencePolicy) -> Self {
        if let Some(r) = self.recurrence.as_mut() {
            r.policy = Some(policy);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn execute_at(&self) -> DateTime<Utc> {
        self.execute_at
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }
}
