//! Task records as stored and reported by the task manager.

use std::{
    fmt,
    time::{SystemTime, UNIX_EPOCH},
};

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Unique task identifier.
///
/// Rendered as the submission time in Unix seconds followed by eight random
/// digits.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub(crate) fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut id = unix_seconds().to_string();
        id.extend((0..8).map(|_| char::from(b'0' + rng.gen_range(0..10_u8))));
        Self(id)
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self { Self(value) }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self { Self(value.to_owned()) }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Lifecycle of a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Queued; no worker has picked it up.
    Pending,
    /// A worker is executing it.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error or panic.
    Failed,
    /// Cancelled before a worker started it.
    Cancelled,
}

impl TaskStatus {
    /// Returns `true` for states a task never leaves.
    #[must_use]
    pub fn is_terminal(self) -> bool { matches!(self, Self::Completed | Self::Failed | Self::Cancelled) }
}

/// Snapshot of a task's state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    /// Task identifier.
    pub task_id: TaskId,
    /// Kind of operation, chosen by the submitter.
    pub operation_type: String,
    /// Current status.
    pub status: TaskStatus,
    /// Progress from 0 to 100.
    pub progress: u8,
    /// Latest progress message.
    pub message: String,
    /// Result text once completed.
    pub result: Option<String>,
    /// Error text once failed or cancelled.
    pub error: Option<String>,
    /// User that submitted the task.
    pub owner_id: u64,
    /// Submission time in Unix seconds.
    pub start_time: u64,
}

impl TaskRecord {
    pub(crate) fn pending(task_id: TaskId, operation_type: String, owner_id: u64) -> Self {
        Self {
            task_id,
            operation_type,
            status: TaskStatus::Pending,
            progress: 0,
            message: String::new(),
            result: None,
            error: None,
            owner_id,
            start_time: unix_seconds(),
        }
    }
}

/// Clamp a reported progress value into `0..=100`.
pub(crate) fn clamp_progress(progress: i64) -> u8 {
    u8::try_from(progress.clamp(0, 100)).unwrap_or(100)
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}
