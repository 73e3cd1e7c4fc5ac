use chrono::{DateTime, Utc};
use clockwork_core::models::{EntryRange, TimeEntry};
use clockwork_store::ChannelHealth;
use serde::{Deserialize, Serialize};

use crate::timer::TimerEvent;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum DashboardEvent {
    Timer(TimerEvent),
    Entries(EntriesEvent),
    Notice(Notice),
    Realtime(RealtimeEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntriesEvent {
    pub event_type: EntriesEventType,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntriesEventType {
    /// The active range was (re)loaded by the view
    Loaded { range: EntryRange, count: usize },
    /// A realtime notification caused a refetch
    Refreshed { range: EntryRange, count: usize },
    Added { entry: TimeEntry },
    Removed { entry_id: String },
}

impl EntriesEvent {
    fn new(event_type: EntriesEventType, user_id: impl Into<String>) -> Self {
        Self {
            event_type,
            user_id: user_id.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn loaded(user_id: impl Into<String>, range: EntryRange, count: usize) -> Self {
        Self::new(EntriesEventType::Loaded { range, count }, user_id)
    }

    pub fn refreshed(user_id: impl Into<String>, range: EntryRange, count: usize) -> Self {
        Self::new(EntriesEventType::Refreshed { range, count }, user_id)
    }

    pub fn added(user_id: impl Into<String>, entry: TimeEntry) -> Self {
        Self::new(EntriesEventType::Added { entry }, user_id)
    }

    pub fn removed(user_id: impl Into<String>, entry_id: impl Into<String>) -> Self {
        Self::new(
            EntriesEventType::Removed {
                entry_id: entry_id.into(),
            },
            user_id,
        )
    }
}

/// A user-facing message, shown as a toast by whatever renders the dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeEvent {
    pub user_id: String,
    pub health: ChannelHealth,
    pub timestamp: DateTime<Utc>,
}

impl RealtimeEvent {
    pub fn new(user_id: impl Into<String>, health: ChannelHealth) -> Self {
        Self {
            user_id: user_id.into(),
            health,
            timestamp: Utc::now(),
        }
    }
}
