//! Lifecycle events emitted while processes execute.
//!
//! Every state change of a process, and every group boundary inside an
//! orchestration, is published to the injected notifier as an immutable event.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::process::{ExecutionMode, ProcessStatus};

/// A single lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// Namespaced kind, e.g. "process.started"
    #[serde(rename = "type")]
    pub event_type: EventType,

    /// Process the event is about
    pub process_id: Uuid,

    /// Instance name of the process
    pub process_name: String,

    /// Concrete type name of the process
    pub process_class: String,

    /// When this event occurred (ISO 8601)
    pub timestamp: DateTime<Utc>,

    /// Status of the process at emission time
    pub status: ProcessStatus,

    /// Wall-clock execution time (completed events)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<f64>,

    /// Error message (failed events)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Position of the execution group (group events)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_index: Option<usize>,

    /// Number of processes in the group (group started)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_size: Option<usize>,

    /// How the group runs (group started)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_mode: Option<ExecutionMode>,
}

impl LifecycleEvent {
    /// Create a new event with the current timestamp
    pub fn new(
        event_type: EventType,
        process_id: Uuid,
        process_name: String,
        process_class: String,
        status: ProcessStatus,
    ) -> Self {
        Self {
            event_type,
            process_id,
            process_name,
            process_class,
            timestamp: Utc::now(),
            status,
            execution_time_ms: None,
            error: None,
            group_index: None,
            group_size: None,
            execution_mode: None,
        }
    }

    pub fn with_duration(mut self, execution_time_ms: f64) -> Self {
        self.execution_time_ms = Some(execution_time_ms);
        self
    }

    pub fn with_error(mut self, error: String) -> Self {
        self.error = Some(error);
        self
    }

    /// Attach group start information
    pub fn with_group(mut self, index: usize, size: usize, mode: ExecutionMode) -> Self {
        self.group_index = Some(index);
        self.group_size = Some(size);
        self.execution_mode = Some(mode);
        self
    }

    pub fn with_group_index(mut self, index: usize) -> Self {
        self.group_index = Some(index);
        self
    }
}

/// Kinds of lifecycle events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "process.started")]
    ProcessStarted,

    #[serde(rename = "process.completed")]
    ProcessCompleted,

    #[serde(rename = "process.failed")]
    ProcessFailed,

    #[serde(rename = "process.group_started")]
    GroupStarted,

    #[serde(rename = "process.group_completed")]
    GroupCompleted,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ProcessStarted => "process.started",
            EventType::ProcessCompleted => "process.completed",
            EventType::ProcessFailed => "process.failed",
            EventType::GroupStarted => "process.group_started",
            EventType::GroupCompleted => "process.group_completed",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
