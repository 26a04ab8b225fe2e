use std::time::Duration;

use chrono::Utc;
use tempo_core::TaskStatus;
use tempo_scheduler::Action;

use crate::helpers::{start, wait_for, Recorder};

#[test]
fn failing_action_is_isolated() {
    let scheduler = start(1);
    let recorder = Recorder::new();

    let bad = scheduler
        .schedule_after(
            "bad",
            Duration::from_millis(20),
            Action::new(|| anyhow::bail!("disk full")),
        )
        .unwrap();
    let good = scheduler
        .schedule_after("good", Duration::from_millis(40), recorder.action("good"))
        .unwrap();

    assert!(wait_for(Duration::from_secs(1), || {
        scheduler.status(good).unwrap() == TaskStatus::Completed
    }));
    let snap = scheduler.snapshot(bad).unwrap();
    assert_eq!(snap.status, TaskStatus::Failed);
    assert!(snap.last_error.unwrap().contains("disk full"));
    assert_eq!(recorder.count("good"), 1);
}

#[test]
fn panicking_action_does_not_take_down_the_pool() {
    let scheduler = start(1);
    let recorder = Recorder::new();

    let boom = scheduler
        .schedule_after(
            "boom",
            Duration::from_millis(10),
            Action::infallible(|| panic!("unexpected state")),
        )
        .unwrap();
    assert!(wait_for(Duration::from_secs(1), || {
        scheduler.status(boom).unwrap() == TaskStatus::Failed
    }));

    let after = scheduler
        .schedule_after("after", Duration::from_millis(10), recorder.action("after"))
        .unwrap();
    assert!(wait_for(Duration::from_secs(1), || {
        scheduler.status(after).unwrap() == TaskStatus::Completed
    }));
    assert!(scheduler
        .snapshot(boom)
        .unwrap()
        .last_error
        .unwrap()
        .contains("unexpected state"));
}

#[test]
fn failing_recurring_task_keeps_its_schedule() {
    let scheduler = start(2);

    let id = scheduler
        .schedule_recurring(
            "flaky",
            Utc::now(),
            Duration::from_millis(50),
            Some(3),
            Action::new(|| anyhow::bail!("connection refused")),
        )
        .unwrap();

    assert!(wait_for(Duration::from_secs(2), || {
        scheduler.snapshot(id).unwrap().execution_count == 3
    }));
    assert!(wait_for(Duration::from_millis(500), || {
        scheduler.status(id).unwrap() == TaskStatus::Failed
    }));
    assert_eq!(scheduler.pending(), 0);
}
