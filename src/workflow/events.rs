//! Fire-and-forget activity events for the notification collaborator.
//!
//! Timing travels with the invocation in [`ActivityContext`]; nothing is
//! kept per activity once the event is published.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tokio::sync::broadcast;

pub const EVENT_TYPE_ACTIVITY: &str = "ACTIVITY";
pub const EVENT_TYPE_NOTIFICATION: &str = "NOTIFICATION";
const NODE_TYPE_SERVICE_TASK: &str = "serviceTask";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub node_type: String,
    pub process_instance_id: String,
    pub activity_id: String,
    pub activity_name: String,
    pub status: ActivityStatus,
    pub message: String,
    pub result: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// Identity and start time of one activity invocation.
#[derive(Debug, Clone)]
pub struct ActivityContext {
    pub process_instance_id: String,
    pub activity_id: String,
    pub activity_name: String,
    started_at: Instant,
}

impl ActivityContext {
    pub fn start(
        process_instance_id: impl Into<String>,
        activity_id: impl Into<String>,
        activity_name: impl Into<String>,
    ) -> Self {
        Self {
            process_instance_id: process_instance_id.into(),
            activity_id: activity_id.into(),
            activity_name: activity_name.into(),
            started_at: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    pub fn finish(
        &self,
        event_type: &str,
        status: ActivityStatus,
        message: impl Into<String>,
        result: Value,
        error: Option<String>,
    ) -> ActivityEvent {
        ActivityEvent {
            event_type: event_type.to_string(),
            node_type: NODE_TYPE_SERVICE_TASK.to_string(),
            duration_ms: self.elapsed_ms(),
            process_instance_id: self.process_instance_id.clone(),
            activity_id: self.activity_id.clone(),
            activity_name: self.activity_name.clone(),
            status,
            message: message.into(),
            result,
            error,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Clone)]
pub struct EventPublisher {
    tx: broadcast::Sender<ActivityEvent>,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ActivityEvent> {
        self.tx.subscribe()
    }

    /// Returns the number of subscribers reached. Zero is not an error.
    pub fn publish(&self, event: ActivityEvent) -> usize {
        tracing::debug!(
            event_type = %event.event_type,
            activity_id = %event.activity_id,
            status = ?event.status,
            duration_ms = event.duration_ms,
            "Publishing activity event"
        );
        self.tx.send(event).unwrap_or(0)
    }
}
