//! Shared data model, configuration, and error taxonomy for the tempo scheduler.

pub mod config;
pub mod error;
pub mod task;

pub use config::{SchedulerConfig, load_dotenv};
pub use error::SchedulerError;
pub use task::{RecurrencePolicy, StatusChange, TaskId, TaskKind, TaskSnapshot, TaskStatus};
