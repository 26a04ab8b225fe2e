//! Status-change notifications for external collaborators (persistence,
//! audit logs). Observers run synchronously on the thread that made the
//! transition and must not block for long.

use tempo_core::StatusChange;
use tracing::debug;

pub trait StatusObserver: Send + Sync {
    fn on_status_change(&self, change: &StatusChange);
}

impl<F> StatusObserver for F
where
    F: Fn(&StatusChange) + Send + Sync,
{
    fn on_status_change(&self, change: &StatusChange) {
        self(change)
    }
}

/// Logs every transition at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl StatusObserver for TracingObserver {
    fn on_status_change(&self, change: &StatusChange) {
        debug!(
            task_id = %change.task_id,
            name = %change.name,
            from = ?change.from,
            to = %change.to,
            executions = change.execution_count,
            "task status changed"
        );
    }
}
