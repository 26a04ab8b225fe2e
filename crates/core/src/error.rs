use thiserror::Error;

use crate::task::TaskId;

#[derive(Error, Debug)]
pub enum SchedulerError {
    /// Misuse of the public API, rejected before anything is queued.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// An action returned an error or panicked. Recorded on the task, never
    /// propagated past the worker boundary.
    #[error("action failed: {0}")]
    ActionFailed(String),

    #[error("schedule queue is closed")]
    QueueClosed,

    #[error("config error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("failed to start scheduler threads: {0}")]
    Spawn(String),
}
