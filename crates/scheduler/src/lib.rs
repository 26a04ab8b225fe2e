//! In-process delayed task scheduler.
//!
//! Tasks wait in a [`ScheduleQueue`] ordered by due time. A single
//! [`Dispatcher`] thread blocks until the earliest task is due (no polling)
//! and hands it to a fixed-size [`WorkerPool`]. Recurring tasks reschedule
//! themselves after each run. Status is tracked in a [`TaskRegistry`] and can
//! be observed through [`StatusObserver`]s.
//!
//! Most callers only need the [`Scheduler`] facade:
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use chrono::Utc;
//! use tempo_core::SchedulerConfig;
//! use tempo_scheduler::{Action, Scheduler};
//!
//! let scheduler = Scheduler::start(SchedulerConfig::default()).unwrap();
//! let id = scheduler
//!     .schedule_recurring(
//!         "health-check",
//!         Utc::now(),
//!         Duration::from_millis(200),
//!         Some(3),
//!         Action::infallible(|| println!("ok")),
//!     )
//!     .unwrap();
//! std::thread::sleep(Duration::from_secs(1));
//! println!("{:?}", scheduler.status(id));
//! scheduler.shutdown(true);
//! ```

pub mod action;
pub mod dispatcher;
pub mod global;
pub mod observer;
pub mod pool;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod task;

pub use action::Action;
pub use dispatcher::Dispatcher;
pub use observer::{StatusObserver, TracingObserver};
pub use pool::WorkerPool;
pub use queue::ScheduleQueue;
pub use registry::{RunDisposition, TaskRegistry};
pub use scheduler::{Scheduler, SchedulerBuilder, TaskRequest};
pub use task::Task;

pub use tempo_core::{
    RecurrencePolicy, SchedulerConfig, SchedulerError, StatusChange, TaskId, TaskKind, TaskSnapshot,
    TaskStatus,
};
