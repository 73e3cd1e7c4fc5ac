use clockwork_core::models::{TimeEntry, TimerConfig, TimerSession};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{interval_at, Duration, Instant};
use tokio_util::sync::{CancellationToken, DropGuard};

use super::clock::Clock;
use super::events::TimerEvent;
use crate::entry::{RepositoryError, TimeEntryRepository};
use crate::event_manager::EventManager;

#[derive(Debug, thiserror::Error)]
pub enum TimerEngineError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<clockwork_core::Error> for TimerEngineError {
    fn from(err: clockwork_core::Error) -> Self {
        match err {
            clockwork_core::Error::Validation(message) => Self::Validation(message),
            clockwork_core::Error::InvalidData(message) => Self::InvalidOperation(message),
            other => Self::InvalidOperation(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, TimerEngineError>;

struct EngineState {
    session: TimerSession,
    /// Cancels the running tick loop when dropped
    ticker: Option<DropGuard>,
}

/// Drives one user's timer session.
///
/// A tick loop counts one second per period while running. Stopping hands
/// the finished entry to the repository; on failure the session falls back
/// to paused with its elapsed time intact.
pub struct TimerEngine {
    user_id: String,
    state: Arc<RwLock<EngineState>>,
    repository: Arc<TimeEntryRepository>,
    events: Arc<EventManager>,
    tick_period: Duration,
    clock: Clock,
    shutdown: CancellationToken,
}

impl TimerEngine {
    pub fn new(
        user_id: impl Into<String>,
        repository: Arc<TimeEntryRepository>,
        events: Arc<EventManager>,
        config: &TimerConfig,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            state: Arc::new(RwLock::new(EngineState {
                session: TimerSession::new(),
                ticker: None,
            })),
            repository,
            events,
            tick_period: config.tick_period(),
            clock: Clock::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub async fn snapshot(&self) -> TimerSession {
        self.state.read().await.session.clone()
    }

    pub async fn set_description(&self, description: impl Into<String>) -> Result<()> {
        let mut state = self.state.write().await;
        state.session.set_description(description)?;
        Ok(())
    }

    pub async fn set_project(&self, project_id: Option<String>) -> Result<()> {
        let mut state = self.state.write().await;
        state.session.set_project(project_id)?;
        Ok(())
    }

    /// Start from idle or resume from paused
    pub async fn start(&self) -> Result<()> {
        let mut state = self.state.write().await;
        let resuming = state.session.is_paused();
        state.session.start(self.clock.now())?;

        let token = self.shutdown.child_token();
        tokio::spawn(tick_loop(
            self.state.clone(),
            token.clone(),
            self.tick_period,
            self.events.clone(),
            self.user_id.clone(),
        ));
        state.ticker = Some(token.drop_guard());

        let event = if resuming {
            TimerEvent::resumed(&self.user_id, state.session.elapsed_seconds)
        } else {
            TimerEvent::started(
                &self.user_id,
                state.session.description.clone(),
                state.session.project_id.clone(),
            )
        };
        drop(state);

        tracing::info!(
            "Timer {} for {}",
            if resuming { "resumed" } else { "started" },
            self.user_id
        );
        self.events.emit_timer(event);
        Ok(())
    }

    pub async fn pause(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.session.pause()?;
        state.ticker = None;
        let elapsed = state.session.elapsed_seconds;
        drop(state);

        tracing::info!("Timer paused for {} at {}s", self.user_id, elapsed);
        self.events.emit_timer(TimerEvent::paused(&self.user_id, elapsed));
        Ok(())
    }

    /// Persist the session as a time entry and reset.
    ///
    /// Returns `Validation` without touching the store when no time has been
    /// counted yet.
    pub async fn stop(&self) -> Result<TimeEntry> {
        let new_entry = {
            let mut state = self.state.write().await;
            let new_entry = state.session.begin_stop(&self.user_id, self.clock.now())?;
            state.ticker = None;
            new_entry
        };

        match self.repository.insert(&new_entry).await {
            Ok(entry_id) => {
                self.state.write().await.session.finish_stop();
                tracing::info!(
                    "Timer stopped for {}: {}s saved as {}",
                    self.user_id,
                    new_entry.duration_seconds,
                    entry_id
                );
                self.events.emit_timer(TimerEvent::stopped(
                    &self.user_id,
                    entry_id.clone(),
                    new_entry.duration_seconds,
                ));
                Ok(new_entry.into_entry(entry_id))
            }
            Err(err) => {
                self.state.write().await.session.abort_stop();
                tracing::error!("Failed to save timer for {}: {}", self.user_id, err);
                self.events
                    .emit_timer(TimerEvent::stop_failed(&self.user_id, err.to_string()));
                Err(err.into())
            }
        }
    }
}

impl Drop for TimerEngine {
    fn drop(&mut self) {
        self.shutdown.cancel();

        if let Ok(state) = self.state.try_read() {
            let elapsed = state.session.elapsed_seconds;
            if !state.session.is_idle() && elapsed > 0 {
                tracing::warn!(
                    "Discarding {}s of unsaved time for {}",
                    elapsed,
                    self.user_id
                );
                self.events
                    .emit_timer(TimerEvent::abandoned(&self.user_id, elapsed));
            }
        }
    }
}

async fn tick_loop(
    state: Arc<RwLock<EngineState>>,
    token: CancellationToken,
    period: Duration,
    events: Arc<EventManager>,
    user_id: String,
) {
    let mut ticks = interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticks.tick() => {
                let mut guard = state.write().await;
                // Pause or stop may have won the lock after this tick fired
                if token.is_cancelled() {
                    break;
                }
                if guard.session.tick() {
                    let elapsed = guard.session.elapsed_seconds;
                    drop(guard);
                    events.emit_timer(TimerEvent::tick(&user_id, elapsed));
                }
            }
        }
    }
}
