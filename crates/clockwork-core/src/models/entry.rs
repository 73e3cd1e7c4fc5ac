//! Time entry data model

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted record of a completed stretch of tracked work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeEntry {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "duration")]
    pub duration_seconds: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub project_id: Option<String>,
    /// Resolved from the project list for display, never stored.
    #[serde(skip)]
    pub project_name: Option<String>,
}

/// Insert payload for a time entry. The store assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewTimeEntry {
    pub user_id: String,
    pub description: String,
    #[serde(rename = "duration")]
    pub duration_seconds: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub project_id: Option<String>,
}

impl NewTimeEntry {
    /// Build the payload for a finished timer session.
    ///
    /// `duration_seconds` is the accumulated running time, which is shorter
    /// than `end_time - start_time` when the session was paused.
    pub fn completed(
        user_id: impl Into<String>,
        description: impl Into<String>,
        project_id: Option<String>,
        duration_seconds: u64,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Self> {
        let entry = Self {
            user_id: user_id.into(),
            description: description.into(),
            duration_seconds,
            start_time,
            end_time: Some(end_time),
            project_id,
        };
        entry.validate()?;
        Ok(entry)
    }

    /// Validate the entry data
    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(Error::Validation("User id cannot be empty".to_string()));
        }

        if self.duration_seconds == 0 {
            return Err(Error::Validation(
                "Duration must be greater than 0".to_string(),
            ));
        }

        if let Some(end_time) = self.end_time {
            if end_time < self.start_time {
                return Err(Error::Validation(
                    "End time must not be before start time".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Attach the id assigned by the store.
    pub fn into_entry(self, id: impl Into<String>) -> TimeEntry {
        TimeEntry {
            id: id.into(),
            user_id: self.user_id,
            description: self.description,
            duration_seconds: self.duration_seconds,
            start_time: self.start_time,
            end_time: self.end_time,
            project_id: self.project_id,
            project_name: None,
        }
    }
}

impl TimeEntry {
    /// Check if the entry is completed (has end time)
    pub fn is_completed(&self) -> bool {
        self.end_time.is_some()
    }

    /// Get the duration as a formatted string (HH:MM:SS)
    pub fn duration_formatted(&self) -> String {
        format_duration(self.duration_seconds)
    }

    /// Get the duration in hours (rounded to 2 decimal places)
    pub fn duration_hours(&self) -> f64 {
        (self.duration_seconds as f64 / 3600.0 * 100.0).round() / 100.0
    }

    /// Display label for the project, falling back to the raw id.
    pub fn project_label(&self) -> Option<&str> {
        self.project_name.as_deref().or(self.project_id.as_deref())
    }
}

/// Format seconds as HH:MM:SS
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let seconds = seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
