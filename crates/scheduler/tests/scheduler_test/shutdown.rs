use std::time::{Duration, Instant};

use tempo_core::{SchedulerError, TaskStatus};

use crate::helpers::{config, start, wait_for, Recorder};
use tempo_scheduler::Scheduler;

#[test]
fn drain_waits_for_running_tasks_and_cancels_queued_ones() {
    let scheduler = start(2);
    let recorder = Recorder::new();

    let running = scheduler
        .schedule_after(
            "running",
            Duration::from_millis(10),
            recorder.slow_action("running", Duration::from_millis(300)),
        )
        .unwrap();
    let queued = scheduler
        .schedule_after("queued", Duration::from_secs(10), recorder.action("queued"))
        .unwrap();
    assert!(wait_for(Duration::from_secs(1), || {
        scheduler.status(running).unwrap() == TaskStatus::Running
    }));

    scheduler.shutdown(true);

    assert_eq!(scheduler.status(running).unwrap(), TaskStatus::Completed);
    assert_eq!(scheduler.status(queued).unwrap(), TaskStatus::Cancelled);
    assert_eq!(recorder.count("queued"), 0);
    assert_eq!(scheduler.pending(), 0);
    assert_eq!(scheduler.running(), 0);
}

#[test]
fn shutdown_without_drain_returns_promptly() {
    let scheduler = start(1);
    let recorder = Recorder::new();

    let running = scheduler
        .schedule_after(
            "running",
            Duration::from_millis(10),
            recorder.slow_action("running", Duration::from_millis(500)),
        )
        .unwrap();
    let queued = scheduler
        .schedule_after("queued", Duration::from_secs(10), recorder.action("queued"))
        .unwrap();
    assert!(wait_for(Duration::from_secs(1), || {
        scheduler.status(running).unwrap() == TaskStatus::Running
    }));

    let started = Instant::now();
    scheduler.shutdown(false);
    assert!(started.elapsed() < Duration::from_millis(400));
    assert_eq!(scheduler.status(queued).unwrap(), TaskStatus::Cancelled);

    // The running task still finishes in the background.
    assert!(wait_for(Duration::from_secs(2), || {
        scheduler.status(running).unwrap() == TaskStatus::Completed
    }));
}

#[test]
fn recurring_task_in_flight_during_drain_is_not_rescheduled() {
    let scheduler = start(1);
    let recorder = Recorder::new();

    let id = scheduler
        .schedule_recurring(
            "tick",
            chrono::Utc::now(),
            Duration::from_millis(50),
            None,
            recorder.slow_action("tick", Duration::from_millis(150)),
        )
        .unwrap();
    assert!(wait_for(Duration::from_secs(1), || {
        scheduler.status(id).unwrap() == TaskStatus::Running
    }));

    scheduler.shutdown(true);
    assert_eq!(scheduler.status(id).unwrap(), TaskStatus::Cancelled);
    assert_eq!(recorder.count("tick"), 1);
}

#[test]
fn shutdown_is_idempotent_and_closes_submission() {
    let scheduler = start(1);
    scheduler.shutdown(true);
    scheduler.shutdown(false);
    assert!(scheduler.is_shut_down());

    let recorder = Recorder::new();
    assert!(matches!(
        scheduler.schedule_after("late", Duration::from_millis(1), recorder.action("late")),
        Err(SchedulerError::QueueClosed)
    ));
}

#[test]
fn dropping_the_scheduler_drains_by_default() {
    let recorder = Recorder::new();
    {
        let scheduler = Scheduler::start(config(1)).unwrap();
        scheduler
            .schedule_after(
                "work",
                Duration::from_millis(10),
                recorder.slow_action("work", Duration::from_millis(100)),
            )
            .unwrap();
        assert!(wait_for(Duration::from_secs(1), || recorder.count("work") == 1));
    }
    // Drop returned, so the run it waited on has fully finished.
    assert_eq!(recorder.count("work"), 1);
}
