//! Unit tests for the task manager.

use std::{
    sync::{Arc, Barrier},
    time::Duration,
};

use rstest::{fixture, rstest};

use super::*;

#[fixture]
fn single_worker() -> TaskManager { TaskManager::new(1).expect("spawn worker") }

/// Occupy the only worker until the returned barrier is released.
fn block_worker(tasks: &TaskManager) -> (Arc<Barrier>, TaskHandle) {
    let gate = Arc::new(Barrier::new(2));
    let held = Arc::clone(&gate);
    let handle = tasks
        .submit("block", 0, move |_| {
            held.wait();
            Ok("released".into())
        })
        .expect("submit");
    (gate, handle)
}

#[rstest]
fn new_task_is_pending_with_zero_progress(single_worker: TaskManager) {
    let (gate, blocker) = block_worker(&single_worker);
    let queued = single_worker
        .submit("report", 42, |_| Ok("done".into()))
        .expect("submit");

    let record = single_worker.status(queued.id()).expect("known task");
    assert_eq!(record.status, TaskStatus::Pending);
    assert_eq!(record.progress, 0);
    assert_eq!(record.owner_id, 42);
    assert_eq!(record.operation_type, "report");

    gate.wait();
    assert_eq!(
        blocker.blocking_outcome().expect("ran"),
        TaskOutcome::Completed("released".into())
    );
    assert_eq!(
        queued.blocking_outcome().expect("ran"),
        TaskOutcome::Completed("done".into())
    );
}

#[rstest]
fn successful_work_completes_with_full_progress(single_worker: TaskManager) {
    let handle = single_worker
        .submit("count", 1, |ctx| {
            ctx.report_progress(30, "counting");
            Ok("3".into())
        })
        .expect("submit");
    let id = handle.id().clone();

    assert_eq!(
        handle.blocking_outcome().expect("ran"),
        TaskOutcome::Completed("3".into())
    );
    let record = single_worker.status(&id).expect("known task");
    assert_eq!(record.status, TaskStatus::Completed);
    assert_eq!(record.progress, 100);
    assert_eq!(record.result.as_deref(), Some("3"));
    assert_eq!(record.message, "counting");
}

#[rstest]
fn failing_work_records_error(single_worker: TaskManager) {
    let handle = single_worker
        .submit("import", 1, |_| Err(TaskError::failed("bad input")))
        .expect("submit");
    let id = handle.id().clone();

    assert_eq!(
        handle.blocking_outcome().expect("ran"),
        TaskOutcome::Failed("bad input".into())
    );
    let record = single_worker.status(&id).expect("known task");
    assert_eq!(record.status, TaskStatus::Failed);
    assert_eq!(record.error.as_deref(), Some("bad input"));
}

#[rstest]
fn panicking_work_fails_and_worker_survives(single_worker: TaskManager) {
    let handle = single_worker
        .submit("explode", 1, |_| panic!("kaboom"))
        .expect("submit");
    let id = handle.id().clone();
    assert_eq!(
        handle.blocking_outcome().expect("ran"),
        TaskOutcome::Failed("task panicked: kaboom".into())
    );
    assert_eq!(
        single_worker.status(&id).expect("known").status,
        TaskStatus::Failed
    );

    let next = single_worker
        .submit("after", 1, |_| Ok("still alive".into()))
        .expect("submit");
    assert_eq!(
        next.blocking_outcome().expect("ran"),
        TaskOutcome::Completed("still alive".into())
    );
}

#[rstest]
fn pending_task_can_be_cancelled(single_worker: TaskManager) {
    let (gate, blocker) = block_worker(&single_worker);
    let queued = single_worker
        .submit("never", 1, |_| Ok("ran anyway".into()))
        .expect("submit");
    let id = queued.id().clone();

    assert!(single_worker.cancel(&id));
    assert!(!single_worker.cancel(&id));

    gate.wait();
    blocker.blocking_outcome().expect("ran");
    assert_eq!(queued.blocking_outcome().expect("resolved"), TaskOutcome::Cancelled);

    let record = single_worker.status(&id).expect("known task");
    assert_eq!(record.status, TaskStatus::Cancelled);
    assert_eq!(record.error.as_deref(), Some(CANCELLED_MESSAGE));
    assert!(record.result.is_none());
}

#[rstest]
fn running_task_cannot_be_cancelled(single_worker: TaskManager) {
    let (gate, blocker) = block_worker(&single_worker);
    let id = blocker.id().clone();
    while single_worker.status(&id).expect("known").status != TaskStatus::Running {
        std::thread::sleep(Duration::from_millis(1));
    }

    assert!(!single_worker.cancel(&id));
    gate.wait();
    assert_eq!(
        blocker.blocking_outcome().expect("ran"),
        TaskOutcome::Completed("released".into())
    );
}

#[rstest]
fn terminal_states_are_final(single_worker: TaskManager) {
    let handle = single_worker
        .submit("once", 1, |_| Ok("first".into()))
        .expect("submit");
    let id = handle.id().clone();
    handle.blocking_outcome().expect("ran");

    assert!(!single_worker.complete(&id, "second"));
    assert!(!single_worker.fail(&id, "late failure"));
    assert!(!single_worker.report_progress(&id, 10, "late"));

    let record = single_worker.status(&id).expect("known task");
    assert_eq!(record.status, TaskStatus::Completed);
    assert_eq!(record.result.as_deref(), Some("first"));
    assert_eq!(record.progress, 100);
}

#[rstest]
fn queued_task_completed_externally_reports_completion(single_worker: TaskManager) {
    let (gate, blocker) = block_worker(&single_worker);
    let queued = single_worker
        .submit("report", 1, |_| Ok("from worker".into()))
        .expect("submit");
    let id = queued.id().clone();

    assert!(single_worker.complete(&id, "external"));
    gate.wait();
    blocker.blocking_outcome().expect("ran");

    assert_eq!(
        queued.blocking_outcome().expect("settled"),
        TaskOutcome::Completed("external".into())
    );
    let record = single_worker.status(&id).expect("known task");
    assert_eq!(record.status, TaskStatus::Completed);
    assert_eq!(record.result.as_deref(), Some("external"));
}

#[rstest]
fn queued_task_failed_externally_reports_failure(single_worker: TaskManager) {
    let (gate, blocker) = block_worker(&single_worker);
    let queued = single_worker
        .submit("report", 1, |_| Ok("from worker".into()))
        .expect("submit");
    let id = queued.id().clone();

    assert!(single_worker.fail(&id, "aborted upstream"));
    gate.wait();
    blocker.blocking_outcome().expect("ran");

    assert_eq!(
        queued.blocking_outcome().expect("settled"),
        TaskOutcome::Failed("aborted upstream".into())
    );
    assert_eq!(
        single_worker.status(&id).expect("known task").status,
        TaskStatus::Failed
    );
}

#[rstest]
#[case(-20, 0)]
#[case(55, 55)]
#[case(900, 100)]
fn progress_reports_are_clamped(
    single_worker: TaskManager,
    #[case] reported: i64,
    #[case] stored: u8,
) {
    let (gate, blocker) = block_worker(&single_worker);
    let id = blocker.id().clone();

    assert!(single_worker.report_progress(&id, reported, "step"));
    assert_eq!(single_worker.status(&id).expect("known").progress, stored);

    gate.wait();
    blocker.blocking_outcome().expect("ran");
}

#[rstest]
fn unknown_ids_are_reported_as_absent(single_worker: TaskManager) {
    let missing = TaskId::from("0");
    assert!(single_worker.status(&missing).is_none());
    assert!(!single_worker.cancel(&missing));
    assert!(!single_worker.complete(&missing, "x"));
    assert!(!single_worker.fail(&missing, "x"));
    assert!(!single_worker.report_progress(&missing, 1, "x"));
}

#[rstest]
fn ids_are_unique(single_worker: TaskManager) {
    let handles: Vec<_> = (0..50)
        .map(|_| single_worker.submit("noop", 1, |_| Ok(String::new())).expect("submit"))
        .collect();
    let mut ids: Vec<_> = handles.iter().map(|h| h.id().clone()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 50);
    assert_eq!(single_worker.len(), 50);
}

#[rstest]
fn forget_removes_record(single_worker: TaskManager) {
    let handle = single_worker.submit("noop", 1, |_| Ok(String::new())).expect("submit");
    let id = handle.id().clone();
    handle.blocking_outcome().expect("ran");

    assert_eq!(single_worker.forget(&id).map(|r| r.task_id), Some(id.clone()));
    assert!(single_worker.status(&id).is_none());
    assert!(single_worker.is_empty());
}

#[rstest]
fn submit_after_shutdown_is_rejected(single_worker: TaskManager) {
    single_worker.shutdown();
    let err = single_worker
        .submit("late", 1, |_| Ok(String::new()))
        .expect_err("pool is closed");
    assert!(matches!(err, TaskError::PoolShutDown));
    assert!(single_worker.is_empty());
}

#[test]
fn shutdown_runs_queued_tasks() {
    let tasks = TaskManager::new(2).expect("spawn workers");
    let handles: Vec<_> = (0..8)
        .map(|i| tasks.submit("queued", 1, move |_| Ok(i.to_string())).expect("submit"))
        .collect();
    tasks.shutdown();
    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(
            handle.blocking_outcome().expect("ran"),
            TaskOutcome::Completed(i.to_string())
        );
    }
}

#[tokio::test]
async fn outcome_can_be_awaited() {
    let tasks = TaskManager::new(1).expect("spawn worker");
    let handle = tasks.submit("async", 3, |_| Ok("awaited".into())).expect("submit");
    assert_eq!(
        handle.outcome().await.expect("ran"),
        TaskOutcome::Completed("awaited".into())
    );
}
