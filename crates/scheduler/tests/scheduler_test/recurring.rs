use std::time::Duration;

use chrono::Utc;
use tempo_core::{RecurrencePolicy, TaskStatus};
use tempo_scheduler::{Scheduler, TaskRequest};

use crate::helpers::{config, start, wait_for, Recorder};

#[test]
fn bounded_recurring_task_stops_after_max_executions() {
    let scheduler = start(2);
    let recorder = Recorder::new();

    let id = scheduler
        .schedule_recurring(
            "health-check",
            Utc::now(),
            Duration::from_millis(200),
            Some(3),
            recorder.action("health-check"),
        )
        .unwrap();

    assert!(wait_for(Duration::from_secs(3), || {
        scheduler.status(id).unwrap() == TaskStatus::Completed
    }));
    // Give a would-be fourth run time to show up.
    std::thread::sleep(Duration::from_millis(400));

    assert_eq!(recorder.count("health-check"), 3);
    let snap = scheduler.snapshot(id).unwrap();
    assert_eq!(snap.execution_count, 3);
    assert_eq!(snap.status, TaskStatus::Completed);
    assert_eq!(scheduler.pending(), 0);
}

#[test]
fn fixed_delay_measures_from_completion() {
    let scheduler = start(2);
    let recorder = Recorder::new();

    let id = scheduler
        .schedule_recurring(
            "slow",
            Utc::now(),
            Duration::from_millis(300),
            Some(2),
            recorder.slow_action("slow", Duration::from_millis(450)),
        )
        .unwrap();

    assert!(wait_for(Duration::from_secs(4), || {
        scheduler.status(id).unwrap() == TaskStatus::Completed
    }));
    let starts = recorder.times("slow");
    assert_eq!(starts.len(), 2);
    // 450ms of work plus the 300ms delay.
    let gap = starts[1].duration_since(starts[0]);
    assert!(gap >= Duration::from_millis(750), "gap was {gap:?}");
}

#[test]
fn fixed_rate_measures_from_previous_due_time() {
    let scheduler = Scheduler::start(tempo_core::SchedulerConfig {
        recurrence_policy: RecurrencePolicy::FixedRate,
        ..config(2)
    })
    .unwrap();
    let recorder = Recorder::new();

    let id = scheduler
        .schedule_recurring(
            "rate",
            Utc::now(),
            Duration::from_millis(300),
            Some(3),
            recorder.slow_action("rate", Duration::from_millis(100)),
        )
        .unwrap();

    assert!(wait_for(Duration::from_secs(4), || {
        scheduler.status(id).unwrap() == TaskStatus::Completed
    }));
    let starts = recorder.times("rate");
    assert_eq!(starts.len(), 3);
    // Fixed delay would put the third run at least 800ms after the first.
    let span = starts[2].duration_since(starts[0]);
    assert!(span >= Duration::from_millis(590), "span was {span:?}");
    assert!(span < Duration::from_millis(790), "span was {span:?}");
}

#[test]
fn unbounded_recurring_task_runs_until_cancelled() {
    let scheduler = start(2);
    let recorder = Recorder::new();

    let request = TaskRequest::recurring(
        "poll",
        Utc::now(),
        Duration::from_millis(50),
        recorder.action("poll"),
    )
    .with_policy(RecurrencePolicy::FixedDelay);
    let id = scheduler.submit(request).unwrap();

    assert!(wait_for(Duration::from_secs(2), || recorder.count("poll") >= 3));
    assert!(scheduler.cancel(id).unwrap());
    assert!(wait_for(Duration::from_secs(1), || scheduler.status(id).unwrap().is_terminal()));

    let settled = recorder.count("poll");
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(recorder.count("poll"), settled);
    assert_eq!(scheduler.pending(), 0);
}
