//! Optional process-wide scheduler with an explicit start/stop lifecycle.
//!
//! ```no_run
//! use tempo_core::SchedulerConfig;
//! use tempo_scheduler::{Action, global};
//!
//! let scheduler = global::init(SchedulerConfig::default()).unwrap();
//! scheduler
//!     .schedule_after("warmup", std::time::Duration::from_secs(1), Action::infallible(|| {}))
//!     .unwrap();
//! global::shutdown(true);
//! ```

use std::sync::Arc;

use parking_lot::RwLock;
use tempo_core::{SchedulerConfig, SchedulerError};

use crate::scheduler::Scheduler;

static GLOBAL: RwLock<Option<Arc<Scheduler>>> = RwLock::new(None);

/// Start the process-wide scheduler. Fails if one is already running.
pub fn init(config: SchedulerConfig) -> Result<Arc<Scheduler>, SchedulerError> {
    let mut slot = GLOBAL.write();
    if slot.is_some() {
        return Err(SchedulerError::InvalidArgument(
            "global scheduler is already initialized".to_string(),
        ));
    }
    let scheduler = Arc::new(Scheduler::start(config)?);
    *slot = Some(Arc::clone(&scheduler));
    Ok(scheduler)
}

/// The running process-wide scheduler, if any.
pub fn get() -> Option<Arc<Scheduler>> {
    GLOBAL.read().clone()
}

/// Shut down and release the process-wide scheduler. Returns `false` if none
/// was running. A new one may be started with [`init`] afterwards.
pub fn shutdown(drain_pending: bool) -> bool {
    let scheduler = GLOBAL.write().take();
    match scheduler {
        Some(scheduler) => {
            scheduler.shutdown(drain_pending);
            true
        }
        None => false,
    }
}
