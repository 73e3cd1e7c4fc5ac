use async_trait::async_trait;
use clockwork_core::models::{EntryRange, NewTimeEntry, Project, TimeEntry};

use crate::Result;

/// Row-store operations the dashboard needs.
///
/// Implementations return entries ordered by start time, newest first, and
/// keep the store's own order for equal start times.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Entries owned by `user_id` whose start time falls in `range`
    async fn select_entries(&self, user_id: &str, range: EntryRange) -> Result<Vec<TimeEntry>>;

    async fn select_projects(&self, user_id: &str) -> Result<Vec<Project>>;

    /// Insert a single entry and return the id the store assigned
    async fn insert_entry(&self, entry: &NewTimeEntry) -> Result<String>;

    async fn delete_entry(&self, entry_id: &str) -> Result<()>;
}
