//! The dashboard for one signed-in user

use clockwork_core::models::{Config, EntryRange, Project, TimeEntry, User};
use clockwork_store::{ChannelHealth, EntryStore, RealtimeChannel};
use std::sync::Arc;
use tokio::sync::watch;

use crate::entry::{EntryList, RepositoryError, TimeEntryRepository};
use crate::event_manager::EventManager;
use crate::events::{EntriesEvent, Notice};
use crate::realtime::{ListenerContext, RefreshListener};
use crate::timer::{TimerEngine, TimerEngineError};

/// Collaborators a view is mounted with
#[derive(Clone)]
pub struct ViewDeps {
    pub store: Arc<dyn EntryStore>,
    pub channel: Arc<dyn RealtimeChannel>,
    pub events: Arc<EventManager>,
    pub config: Config,
}

/// Owns the repository, the timer, the realtime listener and the locally
/// held entry list for the active range.
///
/// Repository failures are raised as notices and then returned.
pub struct DashboardView {
    deps: ViewDeps,
    user: User,
    repository: Arc<TimeEntryRepository>,
    active_range: watch::Sender<EntryRange>,
    entries: Arc<EntryList>,
    timer: TimerEngine,
    listener: RefreshListener,
}

impl DashboardView {
    /// Start listening for changes and load the initial range.
    ///
    /// A failed initial load leaves the list empty; the notice has already
    /// been raised.
    pub async fn mount(deps: ViewDeps, user: User, range: EntryRange) -> Self {
        tracing::info!("Mounting dashboard for {}", user.id);

        let repository = Arc::new(TimeEntryRepository::new(deps.store.clone(), &deps.config));
        let (active_range, _) = watch::channel(range);
        let entries = Arc::new(EntryList::new());

        let timer = TimerEngine::new(
            user.id.as_str(),
            repository.clone(),
            deps.events.clone(),
            &deps.config.timer,
        );
        let listener = RefreshListener::spawn(ListenerContext {
            channel: deps.channel.clone(),
            repository: repository.clone(),
            events: deps.events.clone(),
            user_id: user.id.clone(),
            active_range: active_range.subscribe(),
            entries: entries.clone(),
        });

        let view = Self {
            deps,
            user,
            repository,
            active_range,
            entries,
            timer,
            listener,
        };

        if let Err(e) = view.load(range).await {
            tracing::warn!("Initial load failed for {}: {}", view.user.id, e);
        }
        view
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn timer(&self) -> &TimerEngine {
        &self.timer
    }

    pub fn repository(&self) -> &Arc<TimeEntryRepository> {
        &self.repository
    }

    pub fn active_range(&self) -> EntryRange {
        *self.active_range.borrow()
    }

    pub fn health(&self) -> ChannelHealth {
        self.listener.health()
    }

    pub fn health_watch(&self) -> watch::Receiver<ChannelHealth> {
        self.listener.health_watch()
    }

    /// The locally held entries for the active range, newest first
    pub async fn entries(&self) -> Vec<TimeEntry> {
        self.entries.snapshot().await
    }

    async fn load(&self, range: EntryRange) -> Result<Vec<TimeEntry>, RepositoryError> {
        let ticket = self.entries.begin_load().await;
        match self.repository.fetch_range(&self.user.id, range).await {
            Ok(entries) => {
                // A newer load or range may have taken over meanwhile
                let applied = self
                    .entries
                    .finish_load(ticket, range, self.active_range(), entries.clone())
                    .await;
                if applied {
                    self.deps.events.emit_entries(EntriesEvent::loaded(
                        self.user.id.as_str(),
                        range,
                        entries.len(),
                    ));
                }
                Ok(entries)
            }
            Err(e) => {
                self.deps.events.emit_notice(Notice::error(format!(
                    "Could not load entries: {}",
                    e.message()
                )));
                Err(e)
            }
        }
    }

    pub async fn set_range(&self, range: EntryRange) -> Result<Vec<TimeEntry>, RepositoryError> {
        self.active_range.send_replace(range);
        self.repository.invalidate_range();
        self.load(range).await
    }

    pub async fn refresh(&self) -> Result<Vec<TimeEntry>, RepositoryError> {
        self.repository.invalidate_range();
        self.load(self.active_range()).await
    }

    pub async fn projects(&self) -> Result<Vec<Project>, RepositoryError> {
        self.repository
            .fetch_projects(&self.user.id)
            .await
            .inspect_err(|e| {
                self.deps.events.emit_notice(Notice::error(format!(
                    "Could not load projects: {}",
                    e.message()
                )));
            })
    }

    pub async fn remove_entry(&self, entry_id: &str) -> Result<(), RepositoryError> {
        if let Err(e) = self.repository.remove(entry_id).await {
            self.deps.events.emit_notice(Notice::error(format!(
                "Could not delete entry: {}",
                e.message()
            )));
            return Err(e);
        }

        self.entries.remove(entry_id).await;
        self.deps
            .events
            .emit_entries(EntriesEvent::removed(self.user.id.as_str(), entry_id));
        Ok(())
    }

    /// Persist the running session and show the new entry at the top.
    pub async fn stop_timer(&self) -> Result<TimeEntry, TimerEngineError> {
        let mut entry = match self.timer.stop().await {
            Ok(entry) => entry,
            Err(e) => {
                let notice = match e {
                    TimerEngineError::Repository(ref err) => {
                        Notice::error(format!("Could not save time entry: {}", err.message()))
                    }
                    ref other => Notice::warning(other.to_string()),
                };
                self.deps.events.emit_notice(notice);
                return Err(e);
            }
        };

        if let Some(ref project_id) = entry.project_id {
            if let Ok(projects) = self.repository.fetch_projects(&self.user.id).await {
                entry.project_name = projects
                    .into_iter()
                    .find(|p| &p.id == project_id)
                    .map(|p| p.name);
            }
        }

        if self.active_range().contains(entry.start_time) {
            self.entries.prepend(entry.clone()).await;
        }
        self.deps
            .events
            .emit_entries(EntriesEvent::added(self.user.id.as_str(), entry.clone()));
        Ok(entry)
    }

    /// Tear down the current user's timer and subscription and mount the
    /// same range for `user`.
    pub async fn switch_user(&mut self, user: User) -> Result<Vec<TimeEntry>, RepositoryError> {
        tracing::info!("Switching dashboard from {} to {}", self.user.id, user.id);

        self.repository.invalidate_range();
        self.repository.clear_projects();
        self.entries = Arc::new(EntryList::new());

        self.timer = TimerEngine::new(
            user.id.as_str(),
            self.repository.clone(),
            self.deps.events.clone(),
            &self.deps.config.timer,
        );
        self.listener = RefreshListener::spawn(ListenerContext {
            channel: self.deps.channel.clone(),
            repository: self.repository.clone(),
            events: self.deps.events.clone(),
            user_id: user.id.clone(),
            active_range: self.active_range.subscribe(),
            entries: self.entries.clone(),
        });
        self.user = user;

        self.load(self.active_range()).await
    }

    /// Release the timer and the subscription
    pub fn unmount(self) {
        tracing::info!("Unmounting dashboard for {}", self.user.id);
    }
}
