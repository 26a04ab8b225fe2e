use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tempo_core::TaskStatus;

use crate::helpers::{ms, start, wait_for, Recorder};

#[test]
fn cancelled_task_never_runs() {
    let scheduler = start(2);
    let recorder = Recorder::new();

    let id = scheduler
        .schedule("doomed", Utc::now() + ms(200), recorder.action("doomed"))
        .unwrap();
    assert!(scheduler.cancel(id).unwrap());
    assert_eq!(scheduler.pending(), 0);

    std::thread::sleep(Duration::from_millis(400));
    assert_eq!(recorder.count("doomed"), 0);
    assert_eq!(scheduler.status(id).unwrap(), TaskStatus::Cancelled);
    // Already terminal.
    assert!(!scheduler.cancel(id).unwrap());
}

#[test]
fn cancelling_a_finished_task_returns_false() {
    let scheduler = start(1);
    let recorder = Recorder::new();

    let id = scheduler
        .schedule_after("quick", Duration::from_millis(10), recorder.action("quick"))
        .unwrap();
    assert!(wait_for(Duration::from_secs(1), || {
        scheduler.status(id).unwrap() == TaskStatus::Completed
    }));
    assert!(!scheduler.cancel(id).unwrap());
    assert_eq!(scheduler.status(id).unwrap(), TaskStatus::Completed);
}

#[test]
fn cancelling_a_running_recurring_task_stops_rescheduling() {
    let scheduler = start(2);
    let recorder = Recorder::new();

    let id = scheduler
        .schedule_recurring(
            "sweep",
            Utc::now(),
            Duration::from_millis(50),
            None,
            recorder.slow_action("sweep", Duration::from_millis(200)),
        )
        .unwrap();

    assert!(wait_for(Duration::from_secs(1), || {
        scheduler.status(id).unwrap() == TaskStatus::Running
    }));
    assert!(scheduler.cancel(id).unwrap());

    // The current run is not interrupted and reports its own outcome.
    assert!(wait_for(Duration::from_secs(1), || {
        scheduler.status(id).unwrap() == TaskStatus::Completed
    }));
    let snap = scheduler.snapshot(id).unwrap();
    assert!(snap.cancel_requested);
    assert_eq!(snap.execution_count, 1);

    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(recorder.count("sweep"), 1);
    assert_eq!(scheduler.pending(), 0);
}

#[test]
fn concurrent_cancel_and_dispatch_runs_each_task_at_most_once() {
    let scheduler = Arc::new(start(4));
    let recorder = Recorder::new();
    let at = Utc::now() + ms(30);

    let ids: HashMap<String, _> = (0..64)
        .map(|i| {
            let label = format!("task-{i}");
            let id = scheduler.schedule(label.clone(), at, recorder.action(&label)).unwrap();
            (label, id)
        })
        .collect();

    // Race cancellation of the even tasks against their dispatch.
    let canceller = {
        let scheduler = Arc::clone(&scheduler);
        let targets: Vec<_> = ids
            .iter()
            .filter(|(label, _)| label.trim_start_matches("task-").parse::<u32>().unwrap() % 2 == 0)
            .map(|(_, id)| *id)
            .collect();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(25));
            for id in targets {
                scheduler.cancel(id).unwrap();
            }
        })
    };
    canceller.join().unwrap();

    assert!(wait_for(Duration::from_secs(2), || {
        ids.values().all(|id| scheduler.status(*id).unwrap().is_terminal())
    }));

    for (label, id) in &ids {
        let runs = recorder.count(label);
        let snap = scheduler.snapshot(*id).unwrap();
        assert!(runs <= 1, "{label} ran {runs} times");
        match snap.status {
            TaskStatus::Cancelled => assert_eq!(runs, 0, "{label} ran after cancellation"),
            TaskStatus::Completed => assert_eq!(runs, 1),
            other => panic!("{label} ended as {other}"),
        }
    }
}
