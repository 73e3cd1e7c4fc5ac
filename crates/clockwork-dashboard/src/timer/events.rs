//! Timer events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event emitted by the timer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimerEvent {
    pub event_type: TimerEventType,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Types of timer events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimerEventType {
    /// Timer started from idle
    Started {
        description: String,
        project_id: Option<String>,
    },
    /// Timer resumed after a pause
    Resumed { elapsed_seconds: u64 },
    /// Timer paused
    Paused { elapsed_seconds: u64 },
    /// One second of running time was counted
    Tick { elapsed_seconds: u64 },
    /// Entry persisted and the timer reset
    Stopped {
        entry_id: String,
        duration_seconds: u64,
    },
    /// Persisting failed; the timer is paused with its time intact
    StopFailed { message: String },
    /// The timer went away with unsaved time
    Abandoned { elapsed_seconds: u64 },
}

impl TimerEvent {
    /// Create a new timer event
    pub fn new(event_type: TimerEventType, user_id: impl Into<String>) -> Self {
        Self {
            event_type,
            user_id: user_id.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn started(user_id: &str, description: String, project_id: Option<String>) -> Self {
        Self::new(
            TimerEventType::Started {
                description,
                project_id,
            },
            user_id,
        )
    }

    pub fn resumed(user_id: &str, elapsed_seconds: u64) -> Self {
        Self::new(TimerEventType::Resumed { elapsed_seconds }, user_id)
    }

    pub fn paused(user_id: &str, elapsed_seconds: u64) -> Self {
        Self::new(TimerEventType::Paused { elapsed_seconds }, user_id)
    }

    pub fn tick(user_id: &str, elapsed_seconds: u64) -> Self {
        Self::new(TimerEventType::Tick { elapsed_seconds }, user_id)
    }

    /// Create a stopped event
    pub fn stopped(user_id: &str, entry_id: String, duration_seconds: u64) -> Self {
        Self::new(
            TimerEventType::Stopped {
                entry_id,
                duration_seconds,
            },
            user_id,
        )
    }

    pub fn stop_failed(user_id: &str, message: String) -> Self {
        Self::new(TimerEventType::StopFailed { message }, user_id)
    }

    pub fn abandoned(user_id: &str, elapsed_seconds: u64) -> Self {
        Self::new(TimerEventType::Abandoned { elapsed_seconds }, user_id)
    }
}
