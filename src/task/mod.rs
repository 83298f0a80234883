//! Background task execution with status tracking.
//!
//! [`TaskManager`] runs submitted work on a fixed [`WorkerPool`](pool) and
//! keeps a [`TaskRecord`] for every task it has accepted. Each submission
//! returns a [`TaskHandle`] whose outcome channel resolves when the task
//! completes, fails or is skipped after cancellation. Records stay in the
//! table until [`TaskManager::forget`] removes them.
//!
//! Status transitions:
//!
//! ```text
//! Pending -> Running -> Completed | Failed
//! Pending -> Cancelled
//! ```
//!
//! Terminal states are final: later `complete`, `fail` or progress reports
//! for the task are ignored.

mod error;
mod pool;
mod record;

use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use dashmap::{DashMap, mapref::entry::Entry};
use log::{debug, info, warn};
use tokio::sync::oneshot;

pub use self::{
    error::TaskError,
    record::{TaskId, TaskRecord, TaskStatus},
};
use self::{
    pool::WorkerPool,
    record::clamp_progress,
};
use crate::panic::format_panic;

/// Error text recorded for tasks cancelled before they started.
pub const CANCELLED_MESSAGE: &str = "Task cancelled by user";

/// Final result of a task as delivered to its [`TaskHandle`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The work returned this result.
    Completed(String),
    /// The work failed or panicked with this error text.
    Failed(String),
    /// The task was cancelled before a worker picked it up.
    Cancelled,
}

/// Receiver side of one submission.
#[derive(Debug)]
pub struct TaskHandle {
    id: TaskId,
    outcome: oneshot::Receiver<TaskOutcome>,
}

impl TaskHandle {
    /// Identifier of the submitted task.
    #[must_use]
    pub fn id(&self) -> &TaskId { &self.id }

    /// Wait for the task to finish.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Abandoned`] if the pool shut down without
    /// running the task.
    pub async fn outcome(self) -> Result<TaskOutcome, TaskError> {
        self.outcome.await.map_err(|_| TaskError::Abandoned)
    }

    /// Block the current thread until the task finishes.
    ///
    /// Must not be called from within an async runtime.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Abandoned`] if the pool shut down without
    /// running the task.
    pub fn blocking_outcome(self) -> Result<TaskOutcome, TaskError> {
        self.outcome.blocking_recv().map_err(|_| TaskError::Abandoned)
    }
}

/// View of its own task handed to running work.
#[derive(Debug)]
pub struct TaskContext {
    id: TaskId,
    tasks: Arc<TaskTable>,
}

impl TaskContext {
    /// Identifier of the running task.
    #[must_use]
    pub fn id(&self) -> &TaskId { &self.id }

    /// Record progress for the running task. Values outside `0..=100` are
    /// clamped.
    pub fn report_progress(&self, progress: i64, message: &str) {
        self.tasks.report_progress(&self.id, progress, message);
    }
}

#[derive(Debug, Default)]
struct TaskTable {
    records: DashMap<TaskId, TaskRecord>,
}

impl TaskTable {
    fn insert_pending(&self, operation: &str, owner: u64) -> TaskId {
        loop {
            let id = TaskId::generate();
            if let Entry::Vacant(slot) = self.records.entry(id.clone()) {
                slot.insert(TaskRecord::pending(id.clone(), operation.to_owned(), owner));
                return id;
            }
        }
    }

    /// Apply `update` if the task exists and is not yet terminal.
    fn update(&self, id: &TaskId, update: impl FnOnce(&mut TaskRecord)) -> bool {
        match self.records.get_mut(id) {
            Some(mut record) if !record.status.is_terminal() => {
                update(&mut record);
                true
            }
            _ => false,
        }
    }

    fn start(&self, id: &TaskId) -> bool {
        match self.records.get_mut(id) {
            Some(mut record) if record.status == TaskStatus::Pending => {
                record.status = TaskStatus::Running;
                true
            }
            _ => false,
        }
    }

    fn report_progress(&self, id: &TaskId, progress: i64, message: &str) -> bool {
        self.update(id, |record| {
            record.progress = clamp_progress(progress);
            message.clone_into(&mut record.message);
        })
    }

    fn complete(&self, id: &TaskId, result: String) -> bool {
        self.update(id, |record| {
            record.status = TaskStatus::Completed;
            record.progress = 100;
            record.result = Some(result);
        })
    }

    fn fail(&self, id: &TaskId, error: String) -> bool {
        self.update(id, |record| {
            record.status = TaskStatus::Failed;
            record.error = Some(error);
        })
    }

    /// Outcome matching the record's terminal state, if it has one.
    fn outcome(&self, id: &TaskId) -> Option<TaskOutcome> {
        let record = self.records.get(id)?;
        match record.status {
            TaskStatus::Completed => Some(TaskOutcome::Completed(
                record.result.clone().unwrap_or_default(),
            )),
            TaskStatus::Failed => Some(TaskOutcome::Failed(record.error.clone().unwrap_or_default())),
            TaskStatus::Cancelled => Some(TaskOutcome::Cancelled),
            TaskStatus::Pending | TaskStatus::Running => None,
        }
    }

    fn cancel(&self, id: &TaskId) -> bool {
        match self.records.get_mut(id) {
            Some(mut record) if record.status == TaskStatus::Pending => {
                record.status = TaskStatus::Cancelled;
                record.error = Some(CANCELLED_MESSAGE.to_owned());
                true
            }
            _ => false,
        }
    }
}

/// Runs background work on a worker pool and tracks its status.
///
/// # Examples
///
/// ```
/// use ackwire::task::{TaskManager, TaskOutcome};
///
/// let tasks = TaskManager::new(2).expect("spawn workers");
/// let handle = tasks
///     .submit("sum", 7, |ctx| {
///         ctx.report_progress(50, "halfway");
///         Ok((1..=10).sum::<u32>().to_string())
///     })
///     .expect("pool is running");
///
/// let id = handle.id().clone();
/// assert_eq!(
///     handle.blocking_outcome().expect("task ran"),
///     TaskOutcome::Completed("55".into())
/// );
/// assert_eq!(tasks.status(&id).expect("known task").progress, 100);
/// ```
#[derive(Debug)]
pub struct TaskManager {
    tasks: Arc<TaskTable>,
    pool: WorkerPool,
}

impl TaskManager {
    /// Start a manager backed by `workers` threads (at least one).
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Spawn`] if a worker thread cannot be started.
    pub fn new(workers: usize) -> Result<Self, TaskError> {
        Ok(Self {
            tasks: Arc::default(),
            pool: WorkerPool::new(workers)?,
        })
    }

    /// Number of worker threads.
    #[must_use]
    pub fn workers(&self) -> usize { self.pool.size() }

    /// Queue `work` as a new task of kind `operation` owned by `owner`.
    ///
    /// The record is created as `Pending` with progress 0. When a worker
    /// picks the task up it becomes `Running`; the work's `Ok` value
    /// completes it and an `Err` or panic fails it.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::PoolShutDown`] after [`shutdown`](Self::shutdown).
    /// No record is kept in that case.
    pub fn submit<F>(&self, operation: &str, owner: u64, work: F) -> Result<TaskHandle, TaskError>
    where
        F: FnOnce(&TaskContext) -> Result<String, TaskError> + Send + 'static,
    {
        let id = self.tasks.insert_pending(operation, owner);
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let tasks = Arc::clone(&self.tasks);
        let job_id = id.clone();

        let job = Box::new(move || {
            let outcome = run_task(&tasks, job_id, work);
            let _ = outcome_tx.send(outcome);
        });

        if let Err(err) = self.pool.execute(job) {
            self.tasks.records.remove(&id);
            return Err(err);
        }
        info!("task {id} submitted: operation={operation} owner={owner}");
        Ok(TaskHandle {
            id,
            outcome: outcome_rx,
        })
    }

    /// Snapshot of the task's record, or `None` for an unknown id.
    #[must_use]
    pub fn status(&self, id: &TaskId) -> Option<TaskRecord> {
        self.tasks.records.get(id).map(|record| record.clone())
    }

    /// Cancel a task that has not started yet.
    ///
    /// Returns `false` if the task is unknown or no longer `Pending`.
    pub fn cancel(&self, id: &TaskId) -> bool {
        let cancelled = self.tasks.cancel(id);
        if cancelled {
            info!("task {id} cancelled");
        }
        cancelled
    }

    /// Mark a task completed with `result`, setting progress to 100.
    ///
    /// Returns `false` if the task is unknown or already terminal.
    pub fn complete(&self, id: &TaskId, result: impl Into<String>) -> bool {
        self.tasks.complete(id, result.into())
    }

    /// Mark a task failed with `error`.
    ///
    /// Returns `false` if the task is unknown or already terminal.
    pub fn fail(&self, id: &TaskId, error: impl Into<String>) -> bool {
        self.tasks.fail(id, error.into())
    }

    /// Record progress for a task. Values outside `0..=100` are clamped.
    ///
    /// Returns `false` if the task is unknown or already terminal.
    pub fn report_progress(&self, id: &TaskId, progress: i64, message: &str) -> bool {
        self.tasks.report_progress(id, progress, message)
    }

    /// Remove a task's record, returning it.
    pub fn forget(&self, id: &TaskId) -> Option<TaskRecord> {
        self.tasks.records.remove(id).map(|(_, record)| record)
    }

    /// Number of tracked tasks.
    #[must_use]
    pub fn len(&self) -> usize { self.tasks.records.len() }

    /// Returns `true` if no tasks are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.tasks.records.is_empty() }

    /// Stop accepting work, run every queued task and join the workers.
    ///
    /// Idempotent. Must not be called from inside task work.
    pub fn shutdown(&self) {
        if !self.pool.is_shut_down() {
            debug!("task manager shutting down");
        }
        self.pool.shutdown();
    }
}

fn run_task<F>(tasks: &Arc<TaskTable>, id: TaskId, work: F) -> TaskOutcome
where
    F: FnOnce(&TaskContext) -> Result<String, TaskError>,
{
    if !tasks.start(&id) {
        debug!("task {id} skipped: no longer pending");
        return tasks.outcome(&id).unwrap_or(TaskOutcome::Cancelled);
    }

    let context = TaskContext {
        id,
        tasks: Arc::clone(tasks),
    };
    let id = &context.id;
    let result = panic::catch_unwind(AssertUnwindSafe(|| work(&context)));

    let outcome = match result {
        Ok(Ok(value)) => {
            tasks.complete(id, value.clone());
            debug!("task {id} completed");
            TaskOutcome::Completed(value)
        }
        Ok(Err(err)) => {
            let message = err.to_string();
            warn!("task {id} failed: {message}");
            tasks.fail(id, message.clone());
            TaskOutcome::Failed(message)
        }
        Err(payload) => {
            let message = TaskError::Panicked(format_panic(payload).to_string()).to_string();
            warn!("task {id} failed: {message}");
            tasks.fail(id, message.clone());
            TaskOutcome::Failed(message)
        }
    };
    // A record finished from outside the worker wins over the work's result.
    tasks.outcome(id).unwrap_or(outcome)
}

#[cfg(test)]
mod tests;
