//! Fire-and-forget delivery of task change events.
//!
//! Handlers publish through [`NotificationSink`] after a write has committed.
//! The default sink is a bounded tokio channel drained by a background worker
//! that emits each event as a structured log record, standing in for a
//! message bus.

use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::{TASK_EVENTS_TOPIC, TaskEvent};

/// Errors that can occur while publishing an event.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum NotificationError {
    /// The delivery queue is at capacity.
    #[error("Notification queue is full")]
    QueueFull,

    /// The receiving side has shut down.
    #[error("Notification channel is closed")]
    Closed,
}

/// Destination for task change events.
///
/// `publish` must not block: callers are request handlers that have already
/// committed their write and treat delivery as best effort.
pub trait NotificationSink: Send + Sync {
    /// Hands `event` to the sink.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError` if the event could not be accepted.
    fn publish(&self, event: TaskEvent) -> Result<(), NotificationError>;
}

// =============================================================================
// Queue Sink
// =============================================================================

/// Default sink capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Bounded-channel sink. Fails fast with `QueueFull` instead of waiting.
#[derive(Debug, Clone)]
pub struct QueueNotificationSink {
    sender: mpsc::Sender<TaskEvent>,
}

impl QueueNotificationSink {
    /// Creates a sink and the receiver that must be drained by a worker.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<TaskEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Creates a sink and spawns [`run_notification_worker`] on the current runtime.
    ///
    /// The worker exits once every clone of the sink has been dropped and the
    /// queue is empty.
    #[must_use]
    pub fn spawn(capacity: usize) -> (Self, JoinHandle<u64>) {
        let (sink, receiver) = Self::channel(capacity);
        let handle = tokio::spawn(run_notification_worker(receiver));
        (sink, handle)
    }
}

impl NotificationSink for QueueNotificationSink {
    fn publish(&self, event: TaskEvent) -> Result<(), NotificationError> {
        self.sender.try_send(event).map_err(|error| match error {
            mpsc::error::TrySendError::Full(_) => NotificationError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => NotificationError::Closed,
        })
    }
}

/// Drains `receiver`, logging each event on the task events topic.
///
/// Returns the number of events delivered once the channel closes.
pub async fn run_notification_worker(mut receiver: mpsc::Receiver<TaskEvent>) -> u64 {
    let mut delivered = 0;
    while let Some(event) = receiver.recv().await {
        let payload = serde_json::to_string(&event).unwrap_or_default();
        tracing::info!(
            topic = TASK_EVENTS_TOPIC,
            event_id = %event.event_id,
            event_type = %event.kind,
            task_id = %event.task.id,
            version = event.task.version,
            user_id = %event.user_id,
            payload = %payload,
            "event emitted to queue"
        );
        delivered += 1;
    }
    tracing::debug!(delivered, "Notification worker stopped");
    delivered
}

// =============================================================================
// Recording Sink
// =============================================================================

/// In-process sink that keeps every accepted event.
///
/// Used by tests; `failing()` builds a sink that rejects everything.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotificationSink {
    events: Arc<Mutex<Vec<TaskEvent>>>,
    failure: Option<NotificationError>,
}

impl RecordingNotificationSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose `publish` always returns `QueueFull`.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            events: Arc::default(),
            failure: Some(NotificationError::QueueFull),
        }
    }

    /// Snapshot of the accepted events in publish order.
    #[must_use]
    pub fn events(&self) -> Vec<TaskEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl NotificationSink for RecordingNotificationSink {
    fn publish(&self, event: TaskEvent) -> Result<(), NotificationError> {
        if let Some(error) = self.failure {
            return Err(error);
        }
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        Ok(())
    }
}

/// Publishes `event`, logging and discarding any failure.
pub fn publish_best_effort(sink: &dyn NotificationSink, event: TaskEvent) {
    let event_id = event.event_id.clone();
    let kind = event.kind;
    if let Err(error) = sink.publish(event) {
        tracing::warn!(
            %event_id,
            event_type = %kind,
            error = %error,
            "Failed to publish task event"
        );
    }
}
