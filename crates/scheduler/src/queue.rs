//! Time-ordered blocking queue of scheduled tasks.
//!
//! Entries are keyed by `(due, seq)` where `seq` is assigned at [`offer`]
//! time, so equal due times leave in insertion order. A single mutex guards
//! the ordered map; consumers block on a condition variable until exactly the
//! head's due instant, or until a closer task arrives.
//!
//! [`offer`]: ScheduleQueue::offer

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tempo_core::{SchedulerError, TaskId};

use crate::task::Task;

type Key = (Instant, u64);

#[derive(Default)]
struct QueueState {
    entries: BTreeMap<Key, Task>,
    index: HashMap<TaskId, Key>,
    next_seq: u64,
    closed: bool,
}

impl QueueState {
    fn head_key(&self) -> Option<Key> {
        self.entries.first_key_value().map(|(k, _)| *k)
    }

    fn remove_key(&mut self, key: Key) -> Option<Task> {
        let task = self.entries.remove(&key)?;
        self.index.remove(&task.id());
        Some(task)
    }
}

pub struct ScheduleQueue {
    state: Mutex<QueueState>,
    available: Condvar,
    /// Times a consumer went back to sleep after waking without a due task.
    wait_cycles: AtomicU64,
}

impl ScheduleQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            available: Condvar::new(),
            wait_cycles: AtomicU64::new(0),
        }
    }

    /// Insert a task. Wakes a blocked consumer only if the task became the
    /// new head.
    pub fn offer(&self, task: Task) -> Result<(), SchedulerError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(SchedulerError::QueueClosed);
        }
        if state.index.contains_key(&task.id()) {
            return Err(SchedulerError::InvalidArgument(format!(
                "task {} is already queued",
                task.id()
            )));
        }

        let key = (task.due(), state.next_seq);
        state.next_seq += 1;
        let is_new_head = state.head_key().map_or(true, |head| key < head);

        state.index.insert(task.id(), key);
        state.entries.insert(key, task);

        if is_new_head {
            self.available.notify_one();
        }
        Ok(())
    }

    /// Block until the earliest task is due, then remove and return it.
    ///
    /// Fails with [`SchedulerError::QueueClosed`] once the queue is closed,
    /// even if tasks remain.
    pub fn take(&self) -> Result<Task, SchedulerError> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(SchedulerError::QueueClosed);
            }

            match state.head_key() {
                None => {
                    self.available.wait(&mut state);
                }
                Some(key) if key.0 <= Instant::now() => {
                    let Some(task) = state.remove_key(key) else {
                        continue;
                    };
                    // Hand the next head over to any other waiting consumer.
                    if !state.entries.is_empty() {
                        self.available.notify_one();
                    }
                    return Ok(task);
                }
                Some(key) => {
                    self.available.wait_until(&mut state, key.0);
                }
            }
            self.wait_cycles.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Remove and return the head if it is already due, without blocking.
    pub fn try_take(&self) -> Result<Option<Task>, SchedulerError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(SchedulerError::QueueClosed);
        }
        match state.head_key() {
            Some(key) if key.0 <= Instant::now() => Ok(state.remove_key(key)),
            _ => Ok(None),
        }
    }

    /// Best-effort removal of a task that has not been dequeued yet.
    pub fn remove(&self, id: TaskId) -> bool {
        let mut state = self.state.lock();
        match state.index.get(&id).copied() {
            Some(key) => state.remove_key(key).is_some(),
            None => false,
        }
    }

    /// Reject further offers and takes and wake every blocked consumer.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.available.notify_all();
    }

    /// Remove every remaining task, in dequeue order.
    pub fn drain(&self) -> Vec<Task> {
        let mut state = self.state.lock();
        state.index.clear();
        std::mem::take(&mut state.entries).into_values().collect()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.state.lock().index.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Due instant of the head, if any.
    pub fn next_due(&self) -> Option<Instant> {
        self.state.lock().head_key().map(|(due, _)| due)
    }

    /// Number of times a consumer re-slept without receiving a task.
    pub fn wait_cycles(&self) -> u64 {
        self.wait_cycles.load(Ordering::Relaxed)
    }
}

impl Default for ScheduleQueue {
    fn default() -> Self {
        Self::new()
    }
}
