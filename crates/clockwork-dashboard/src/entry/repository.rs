use clockwork_core::models::project::name_lookup;
use clockwork_core::models::{Config, EntryRange, NewTimeEntry, Project, TimeEntry};
use clockwork_store::EntryStore;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use super::cache::{ProjectCache, RangeCache};
use super::retry::{Exhausted, RetryPolicy};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Failed to {operation} after {attempts} attempts: {message}")]
    Exhausted {
        operation: &'static str,
        attempts: u32,
        message: String,
    },

    #[error("Failed to {operation}: {message}")]
    Store {
        operation: &'static str,
        message: String,
    },
}

impl RepositoryError {
    /// The underlying store message, without the operation prefix
    pub fn message(&self) -> &str {
        match self {
            Self::Exhausted { message, .. } | Self::Store { message, .. } => message,
        }
    }

    fn exhausted(operation: &'static str, err: Exhausted<clockwork_store::Error>) -> Self {
        Self::Exhausted {
            operation,
            attempts: err.attempts,
            message: err.last_error.to_string(),
        }
    }

    fn store(operation: &'static str, err: clockwork_store::Error) -> Self {
        Self::Store {
            operation,
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Reads and writes time entries through a store, with retry and caching.
///
/// Reads retry with linear backoff; writes are attempted once. The last
/// fetched range is cached for a short window and project lists are cached
/// until cleared. Each fetch takes a generation from the range cache and
/// only the newest generation may populate it, so a slow stale fetch never
/// overwrites fresher data.
pub struct TimeEntryRepository {
    store: Arc<dyn EntryStore>,
    retry: RetryPolicy,
    ranges: Mutex<RangeCache>,
    projects: Mutex<ProjectCache>,
}

impl TimeEntryRepository {
    pub fn new(store: Arc<dyn EntryStore>, config: &Config) -> Self {
        Self::with_policy(
            store,
            RetryPolicy::from_config(&config.retry),
            config.cache.range_freshness(),
        )
    }

    pub fn with_policy(store: Arc<dyn EntryStore>, retry: RetryPolicy, freshness: Duration) -> Self {
        Self {
            store,
            retry,
            ranges: Mutex::new(RangeCache::new(freshness)),
            projects: Mutex::new(ProjectCache::default()),
        }
    }

    fn ranges(&self) -> MutexGuard<'_, RangeCache> {
        self.ranges.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn project_cache(&self) -> MutexGuard<'_, ProjectCache> {
        self.projects.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Entries of `user_id` starting inside `range`, newest first, with
    /// project names filled in where the project is known.
    pub async fn fetch_range(&self, user_id: &str, range: EntryRange) -> Result<Vec<TimeEntry>> {
        let generation = {
            let mut ranges = self.ranges();
            if let Some(entries) = ranges.get(user_id, range, Instant::now()) {
                tracing::debug!("Range cache hit for {} ({} entries)", user_id, entries.len());
                return Ok(entries);
            }
            ranges.begin_fetch()
        };

        let mut entries = self
            .retry
            .run("fetch time entries", || self.store.select_entries(user_id, range))
            .await
            .map_err(|e| RepositoryError::exhausted("fetch time entries", e))?;

        match self.fetch_projects(user_id).await {
            Ok(projects) => {
                let names = name_lookup(&projects);
                for entry in entries.iter_mut() {
                    entry.project_name = entry
                        .project_id
                        .as_deref()
                        .and_then(|id| names.get(id))
                        .map(|name| name.to_string());
                }
            }
            Err(e) => {
                tracing::warn!("Showing entries without project names: {}", e);
            }
        }

        let stored = self
            .ranges()
            .store(generation, user_id, range, entries.clone(), Instant::now());
        if !stored {
            tracing::debug!("Discarding superseded fetch (generation {})", generation);
        }

        tracing::info!("Loaded {} entries for {}", entries.len(), user_id);
        Ok(entries)
    }

    pub async fn fetch_projects(&self, user_id: &str) -> Result<Vec<Project>> {
        let cached = self.project_cache().get(user_id);
        if let Some(projects) = cached {
            return Ok(projects);
        }

        let projects = self
            .retry
            .run("fetch projects", || self.store.select_projects(user_id))
            .await
            .map_err(|e| RepositoryError::exhausted("fetch projects", e))?;

        self.project_cache().store(user_id, projects.clone());
        Ok(projects)
    }

    /// Persist a completed entry, returning the id the store assigned.
    pub async fn insert(&self, entry: &NewTimeEntry) -> Result<String> {
        let id = self
            .store
            .insert_entry(entry)
            .await
            .map_err(|e| RepositoryError::store("save time entry", e))?;
        tracing::info!("Saved time entry {} ({}s)", id, entry.duration_seconds);
        Ok(id)
    }

    /// Delete an entry. The range cache is left alone; the realtime refresh
    /// invalidates it when the deletion is echoed back.
    pub async fn remove(&self, entry_id: &str) -> Result<()> {
        self.store
            .delete_entry(entry_id)
            .await
            .map_err(|e| RepositoryError::store("delete time entry", e))?;
        tracing::info!("Deleted time entry {}", entry_id);
        Ok(())
    }

    /// Drop the cached range and fence off any fetch still in flight.
    pub fn invalidate_range(&self) {
        self.ranges().invalidate();
    }

    pub fn clear_projects(&self) {
        self.project_cache().clear();
    }

    pub fn cached_range(&self) -> Option<EntryRange> {
        self.ranges().cached_range()
    }
}
