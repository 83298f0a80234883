//! Task status and cancellation exposed as routable services.
//!
//! Clients learn a task id from whichever service submitted the work and then
//! poll it here:
//!
//! | Service | Request body | Response body |
//! |---|---|---|
//! | [`TASK_STATUS_SERVICE`] | `{"taskId": "..."}` | `{"success": true, "task": {...}}` |
//! | [`TASK_CANCEL_SERVICE`] | `{"taskId": "..."}` | `{"success": bool, "taskId": "..."}` |

use std::sync::Arc;

use crate::{
    frame::{Body, Frame},
    router::{RouterError, ServiceError, ServiceRouter},
    task::{TaskId, TaskManager},
};

/// Service id answering task status queries.
pub const TASK_STATUS_SERVICE: u16 = 3001;
/// Service id cancelling pending tasks.
pub const TASK_CANCEL_SERVICE: u16 = 3002;

/// Handlers for the task services, sharing one [`TaskManager`].
#[derive(Clone, Debug)]
pub struct TaskServices {
    tasks: Arc<TaskManager>,
}

impl TaskServices {
    /// Serve status and cancel requests for tasks tracked by `tasks`.
    #[must_use]
    pub fn new(tasks: Arc<TaskManager>) -> Self { Self { tasks } }

    /// Register the status and cancel services on `router`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::DuplicateService`] if either id is taken.
    pub fn register(self, router: &mut ServiceRouter) -> Result<(), RouterError> {
        let status = self.clone();
        router.register(TASK_STATUS_SERVICE, move |_, frame: &Frame| status.status(frame))?;
        router.register(TASK_CANCEL_SERVICE, move |_, frame: &Frame| self.cancel(frame))
    }

    fn status(&self, frame: &Frame) -> Result<Body, ServiceError> {
        let id = task_id(frame)?;
        let record = self
            .tasks
            .status(&id)
            .ok_or_else(|| ServiceError::Failed(format!("task {id} not found")))?;
        let task = serde_json::to_value(record).map_err(|err| ServiceError::Failed(err.to_string()))?;
        Ok(Body::new().with("success", true).with("task", task))
    }

    fn cancel(&self, frame: &Frame) -> Result<Body, ServiceError> {
        let id = task_id(frame)?;
        let cancelled = self.tasks.cancel(&id);
        Ok(Body::new()
            .with("success", cancelled)
            .with("taskId", id.as_str()))
    }
}

fn task_id(frame: &Frame) -> Result<TaskId, ServiceError> {
    frame
        .body
        .get_str("taskId")
        .map(TaskId::from)
        .ok_or(ServiceError::MissingField("taskId"))
}
