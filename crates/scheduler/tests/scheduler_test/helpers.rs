use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tempo_core::SchedulerConfig;
use tempo_scheduler::{Action, Scheduler};

/// Config with a fixed worker count and a generous overdue tolerance.
pub fn config(workers: usize) -> SchedulerConfig {
    SchedulerConfig {
        worker_threads: workers,
        overdue_tolerance_ms: 5_000,
        thread_name_prefix: "tempo-test".to_string(),
        ..Default::default()
    }
}

pub fn start(workers: usize) -> Scheduler {
    Scheduler::start(config(workers)).unwrap()
}

/// Shared log of `(label, when)` pairs appended by task actions.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<(String, Instant)>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// An action that appends `label` each time it runs.
    pub fn action(&self, label: &str) -> Action {
        let events = Arc::clone(&self.events);
        let label = label.to_string();
        Action::infallible(move || events.lock().push((label.clone(), Instant::now())))
    }

    /// Like [`Recorder::action`] but sleeps for `busy` after recording.
    pub fn slow_action(&self, label: &str, busy: Duration) -> Action {
        let events = Arc::clone(&self.events);
        let label = label.to_string();
        Action::infallible(move || {
            events.lock().push((label.clone(), Instant::now()));
            std::thread::sleep(busy);
        })
    }

    pub fn labels(&self) -> Vec<String> {
        self.events.lock().iter().map(|(l, _)| l.clone()).collect()
    }

    pub fn times(&self, label: &str) -> Vec<Instant> {
        self.events
            .lock()
            .iter()
            .filter(|(l, _)| l == label)
            .map(|(_, t)| *t)
            .collect()
    }

    pub fn count(&self, label: &str) -> usize {
        self.times(label).len()
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

pub fn ms(n: i64) -> chrono::Duration {
    chrono::Duration::milliseconds(n)
}
