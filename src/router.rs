//! Routing of data frames to service handlers.
//!
//! The reactor hands every inbound data frame to a [`Router`] after
//! acknowledging it. [`ServiceRouter`] is the stock implementation: a table
//! of handlers keyed by the frame's service id. A handler returns the body of
//! the response; the router wraps it with [`Frame::response_to`]. Handler
//! errors become a response with `success: false` and the error message.
//! Frames for unregistered services are logged and left unanswered.

use std::{collections::HashMap, fmt, sync::Arc};

use thiserror::Error;

use crate::{
    connection::ConnectionId,
    frame::{Body, Frame},
};

/// Turns an inbound data frame into an optional response.
pub trait Router {
    /// Handle `frame` received on `connection`.
    ///
    /// The returned frame is sent through the reliable send path, which
    /// assigns its sequence number.
    fn handle(&self, connection: ConnectionId, frame: &Frame) -> Option<Frame>;
}

impl<F> Router for F
where
    F: Fn(ConnectionId, &Frame) -> Option<Frame>,
{
    fn handle(&self, connection: ConnectionId, frame: &Frame) -> Option<Frame> {
        self(connection, frame)
    }
}

/// Failure reported by a service handler.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// A required body field is absent.
    #[error("missing field: {0}")]
    MissingField(&'static str),
    /// A body field has the wrong type or value.
    #[error("invalid field {field}: {reason}")]
    InvalidField {
        /// Offending field.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },
    /// The operation itself failed.
    #[error("{0}")]
    Failed(String),
}

/// Errors raised while building a [`ServiceRouter`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouterError {
    /// A handler is already registered for the service id.
    #[error("service {0} is already registered")]
    DuplicateService(u16),
}

/// Handler invoked for frames addressed to one service id.
pub type ServiceHandler =
    Arc<dyn Fn(ConnectionId, &Frame) -> Result<Body, ServiceError> + Send + Sync>;

/// Table of service handlers keyed by service id.
///
/// # Examples
///
/// ```
/// use ackwire::{
///     connection::ConnectionId,
///     frame::{Body, Frame},
///     router::{Router, ServiceRouter},
/// };
///
/// let router = ServiceRouter::new()
///     .route(1, |_, frame: &Frame| Ok(frame.body.clone()))
///     .expect("service 1 is free");
///
/// let request = Frame::data(1, Body::new().with("echo", "hi"));
/// let response = router.handle(ConnectionId::new(1), &request).expect("routed");
/// assert_eq!(response.body.get_str("echo"), Some("hi"));
/// ```
#[derive(Clone, Default)]
pub struct ServiceRouter {
    handlers: HashMap<u16, ServiceHandler>,
}

impl ServiceRouter {
    /// Create an empty router.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Register `handler` for `service_id`, builder style.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::DuplicateService`] if `service_id` is taken.
    pub fn route<H>(mut self, service_id: u16, handler: H) -> Result<Self, RouterError>
    where
        H: Fn(ConnectionId, &Frame) -> Result<Body, ServiceError> + Send + Sync + 'static,
    {
        self.register(service_id, handler)?;
        Ok(self)
    }

    /// Register `handler` for `service_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::DuplicateService`] if `service_id` is taken.
    pub fn register<H>(&mut self, service_id: u16, handler: H) -> Result<(), RouterError>
    where
        H: Fn(ConnectionId, &Frame) -> Result<Body, ServiceError> + Send + Sync + 'static,
    {
        if self.handlers.contains_key(&service_id) {
            return Err(RouterError::DuplicateService(service_id));
        }
        self.handlers.insert(service_id, Arc::new(handler));
        Ok(())
    }

    /// Remove the handler for `service_id`, returning whether one existed.
    pub fn remove(&mut self, service_id: u16) -> bool { self.handlers.remove(&service_id).is_some() }

    /// Returns `true` if a handler is registered for `service_id`.
    #[must_use]
    pub fn contains(&self, service_id: u16) -> bool { self.handlers.contains_key(&service_id) }

    /// Number of registered services.
    #[must_use]
    pub fn len(&self) -> usize { self.handlers.len() }

    /// Returns `true` if no services are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.handlers.is_empty() }
}

impl Router for ServiceRouter {
    fn handle(&self, connection: ConnectionId, frame: &Frame) -> Option<Frame> {
        let Some(handler) = self.handlers.get(&frame.service_id) else {
            tracing::warn!(
                connection = %connection,
                service_id = frame.service_id,
                sequence = frame.sequence,
                "no handler registered for service"
            );
            return None;
        };
        let body = handler(connection, frame).unwrap_or_else(|error| {
            tracing::warn!(
                connection = %connection,
                service_id = frame.service_id,
                %error,
                "service handler failed"
            );
            Body::new()
                .with("success", false)
                .with("message", error.to_string())
        });
        Some(Frame::response_to(frame, body))
    }
}

impl fmt::Debug for ServiceRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.handlers.keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("ServiceRouter").field("services", &ids).finish()
    }
}
