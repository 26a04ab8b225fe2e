use std::env;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;
use crate::task::RecurrencePolicy;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

const ENV_PREFIX: &str = "TEMPO";

/// Upper bound on the worker pool; anything larger is almost certainly a typo.
const MAX_WORKER_THREADS: usize = 1024;

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Scheduler configuration, parsed from TOML and/or `TEMPO_*` env vars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Number of worker threads. 0 = available parallelism.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    /// How far in the past `execute_at` may be and still be accepted (run
    /// immediately). Older instants are rejected.
    #[serde(default = "default_overdue_tolerance")]
    pub overdue_tolerance_ms: u64,
    /// Whether dropping the scheduler waits for running tasks.
    #[serde(default = "default_drain_on_shutdown")]
    pub drain_on_shutdown: bool,
    /// Policy applied to recurring tasks that don't pick one explicitly.
    #[serde(default)]
    pub recurrence_policy: RecurrencePolicy,
    /// Keep finished tasks queryable until purged.
    #[serde(default = "default_retain_history")]
    pub retain_history: bool,
    /// Prefix for dispatcher and worker thread names.
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
}

fn default_worker_threads() -> usize { 0 }
fn default_overdue_tolerance() -> u64 { 60_000 }
fn default_drain_on_shutdown() -> bool { true }
fn default_retain_history() -> bool { true }
fn default_thread_name_prefix() -> String { "tempo".to_string() }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            overdue_tolerance_ms: default_overdue_tolerance(),
            drain_on_shutdown: default_drain_on_shutdown(),
            recurrence_policy: RecurrencePolicy::default(),
            retain_history: default_retain_history(),
            thread_name_prefix: default_thread_name_prefix(),
        }
    }
}

impl SchedulerConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Result<Self, SchedulerError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse config from a TOML string. Env vars still take precedence.
    pub fn from_toml(toml_str: &str) -> Result<Self, SchedulerError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchedulerError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Resolve worker thread count (0 means use available parallelism).
    pub fn resolved_worker_threads(&self) -> usize {
        if self.worker_threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.worker_threads
        }
    }

    pub fn overdue_tolerance(&self) -> Duration {
        Duration::from_millis(self.overdue_tolerance_ms)
    }

    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.worker_threads > MAX_WORKER_THREADS {
            return Err(SchedulerError::Config(format!(
                "worker_threads = {} exceeds the maximum of {MAX_WORKER_THREADS}",
                self.worker_threads
            )));
        }
        if self.thread_name_prefix.trim().is_empty() {
            return Err(SchedulerError::Config(
                "thread_name_prefix must not be empty".to_string(),
            ));
        }
        if self.thread_name_prefix.contains('\0') {
            return Err(SchedulerError::Config(
                "thread_name_prefix must not contain NUL bytes".to_string(),
            ));
        }
        Ok(())
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Scheduler config:");
        tracing::info!(
            "  workers:     {} (configured {})",
            self.resolved_worker_threads(),
            self.worker_threads
        );
        tracing::info!("  overdue:     tolerance={}ms", self.overdue_tolerance_ms);
        tracing::info!("  shutdown:    drain={}", self.drain_on_shutdown);
        tracing::info!("  recurrence:  policy={}", self.recurrence_policy);
        tracing::info!("  history:     retain={}", self.retain_history);
    }

    // ── Environment variable overrides ──────────────────────────────

    /// Apply environment variable overrides.
    ///
    /// Convention: `TEMPO_KEY` overrides `key`, e.g.
    /// - `TEMPO_WORKER_THREADS` -> `worker_threads`
    /// - `TEMPO_OVERDUE_TOLERANCE_MS` -> `overdue_tolerance_ms`
    /// - `TEMPO_DRAIN_ON_SHUTDOWN` -> `drain_on_shutdown`
    /// - `TEMPO_RECURRENCE_POLICY` -> `recurrence_policy`
    /// - `TEMPO_RETAIN_HISTORY` -> `retain_history`
    /// - `TEMPO_THREAD_NAME_PREFIX` -> `thread_name_prefix`
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| env::var(key).ok().filter(|s| !s.is_empty()));
    }

    /// Apply overrides from an arbitrary key lookup. Unparseable values are
    /// logged and ignored.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(&format!("{ENV_PREFIX}_{key}"));

        if let Some(v) = get("WORKER_THREADS") {
            match v.parse::<usize>() {
                Ok(n) => self.worker_threads = n,
                Err(_) => {
                    tracing::warn!(value = %v, "ignoring invalid {ENV_PREFIX}_WORKER_THREADS")
                }
            }
        }
        if let Some(v) = get("OVERDUE_TOLERANCE_MS") {
            match v.parse::<u64>() {
                Ok(ms) => self.overdue_tolerance_ms = ms,
                Err(_) => {
                    tracing::warn!(value = %v, "ignoring invalid {ENV_PREFIX}_OVERDUE_TOLERANCE_MS")
                }
            }
        }
        if let Some(v) = get("DRAIN_ON_SHUTDOWN") {
            match parse_bool(&v) {
                Some(b) => self.drain_on_shutdown = b,
                None => {
                    tracing::warn!(value = %v, "ignoring invalid {ENV_PREFIX}_DRAIN_ON_SHUTDOWN")
                }
            }
        }
        if let Some(v) = get("RECURRENCE_POLICY") {
            match v.parse::<RecurrencePolicy>() {
                Ok(p) => self.recurrence_policy = p,
                Err(e) => {
                    tracing::warn!(value = %v, "ignoring {ENV_PREFIX}_RECURRENCE_POLICY: {e}")
                }
            }
        }
        if let Some(v) = get("RETAIN_HISTORY") {
            match parse_bool(&v) {
                Some(b) => self.retain_history = b,
                None => tracing::warn!(value = %v, "ignoring invalid {ENV_PREFIX}_RETAIN_HISTORY"),
            }
        }
        if let Some(v) = get("THREAD_NAME_PREFIX") {
            self.thread_name_prefix = v;
        }
    }
}
