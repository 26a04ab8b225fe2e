use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tempo_core::SchedulerError;

/// The opaque unit of work a task runs.
///
/// Cloning is cheap; every instance of a recurring task shares one action.
#[derive(Clone)]
pub struct Action(Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>);

impl Action {
    /// Wrap a fallible closure. An `Err` marks the execution as failed.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Wrap a closure that cannot report failure (it can still panic).
    pub fn infallible<F>(f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self(Arc::new(move || {
            f();
            Ok(())
        }))
    }

    /// Run the action, turning both errors and panics into
    /// [`SchedulerError::ActionFailed`].
    pub fn invoke(&self) -> Result<(), SchedulerError> {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.0)())) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SchedulerError::ActionFailed(format!("{e:#}"))),
            Err(payload) => Err(SchedulerError::ActionFailed(format!(
                "panicked: {}",
                panic_message(payload.as_ref())
            ))),
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Action(..)")
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
