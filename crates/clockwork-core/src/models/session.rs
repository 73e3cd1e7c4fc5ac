//! In-memory timer session

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::NewTimeEntry;

/// The not-yet-persisted state of an active or paused timer.
///
/// Elapsed time is advanced by explicit ticks rather than derived from wall
/// clock differences, so time spent paused never counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TimerSession {
    pub description: String,
    pub project_id: Option<String>,
    pub elapsed_seconds: u64,
    pub session_start: Option<DateTime<Utc>>,
    pub state: TimerState,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    #[default]
    Idle,
    Running,
    Paused,
    /// Persistence of the finished session is in flight.
    Stopping,
}

impl TimerSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> Result<()> {
        self.ensure_editable()?;
        self.description = description.into();
        Ok(())
    }

    pub fn set_project(&mut self, project_id: Option<String>) -> Result<()> {
        self.ensure_editable()?;
        self.project_id = project_id;
        Ok(())
    }

    /// Start or resume. `session_start` is only captured on the first start.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<()> {
        match self.state {
            TimerState::Running => {
                return Err(Error::InvalidData("Timer is already running".to_string()));
            }
            TimerState::Stopping => {
                return Err(Error::InvalidData("Timer is being stopped".to_string()));
            }
            TimerState::Idle | TimerState::Paused => {}
        }

        if self.description.trim().is_empty() {
            return Err(Error::Validation(
                "Description cannot be empty".to_string(),
            ));
        }

        self.session_start.get_or_insert(now);
        self.state = TimerState::Running;
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        if self.state != TimerState::Running {
            return Err(Error::InvalidData("Timer is not running".to_string()));
        }

        self.state = TimerState::Paused;
        Ok(())
    }

    /// Advance by one second. Returns false (and does nothing) unless running.
    pub fn tick(&mut self) -> bool {
        if self.state != TimerState::Running {
            return false;
        }
        self.elapsed_seconds += 1;
        true
    }

    /// Enter `Stopping` and build the entry to insert.
    ///
    /// Leaves the session untouched when there is nothing to persist.
    pub fn begin_stop(&mut self, user_id: &str, now: DateTime<Utc>) -> Result<NewTimeEntry> {
        if !matches!(self.state, TimerState::Running | TimerState::Paused) {
            return Err(Error::InvalidData("Timer is not active".to_string()));
        }

        if self.elapsed_seconds == 0 {
            return Err(Error::Validation(
                "No time has been tracked yet".to_string(),
            ));
        }

        let start_time = self
            .session_start
            .ok_or_else(|| Error::InvalidData("Session has no start time".to_string()))?;

        let entry = NewTimeEntry::completed(
            user_id,
            self.description.clone(),
            self.project_id.clone(),
            self.elapsed_seconds,
            start_time,
            now,
        )?;

        self.state = TimerState::Stopping;
        Ok(entry)
    }

    /// The entry was persisted: reset everything to defaults.
    pub fn finish_stop(&mut self) {
        *self = Self::default();
    }

    /// Persisting failed: fall back to paused so no tracked time is lost.
    pub fn abort_stop(&mut self) {
        if self.state == TimerState::Stopping {
            self.state = TimerState::Paused;
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == TimerState::Idle
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    pub fn is_paused(&self) -> bool {
        self.state == TimerState::Paused
    }

    pub fn is_stopping(&self) -> bool {
        self.state == TimerState::Stopping
    }

    fn ensure_editable(&self) -> Result<()> {
        match self.state {
            TimerState::Idle | TimerState::Paused => Ok(()),
            TimerState::Running => Err(Error::InvalidData(
                "Cannot edit a running timer".to_string(),
            )),
            TimerState::Stopping => Err(Error::InvalidData(
                "Cannot edit a timer while it is being stopped".to_string(),
            )),
        }
    }
}

impl TimerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerState::Idle => "Idle",
            TimerState::Running => "Running",
            TimerState::Paused => "Paused",
            TimerState::Stopping => "Stopping",
        }
    }
}
