//! The entry list a view shows for its active range

use clockwork_core::models::{EntryRange, TimeEntry};
use tokio::sync::RwLock;

#[derive(Default)]
struct ListState {
    entries: Vec<TimeEntry>,
    loads: u64,
}

/// Locally held entries, replaced by loads and edited in place by the
/// view's own writes.
///
/// Every load takes a ticket from [`EntryList::begin_load`]. Only the most
/// recently started load may replace the list, and only while the range it
/// fetched is still the active one.
#[derive(Default)]
pub struct EntryList {
    state: RwLock<ListState>,
}

impl EntryList {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn begin_load(&self) -> u64 {
        let mut state = self.state.write().await;
        state.loads += 1;
        state.loads
    }

    /// Replace the list with the result of load `ticket` for `range`.
    /// Returns false when a newer load started or `active` has moved on.
    pub async fn finish_load(
        &self,
        ticket: u64,
        range: EntryRange,
        active: EntryRange,
        entries: Vec<TimeEntry>,
    ) -> bool {
        let mut state = self.state.write().await;
        if ticket != state.loads || range != active {
            return false;
        }
        state.entries = entries;
        true
    }

    pub async fn snapshot(&self) -> Vec<TimeEntry> {
        self.state.read().await.entries.clone()
    }

    pub async fn prepend(&self, entry: TimeEntry) {
        self.state.write().await.entries.insert(0, entry);
    }

    pub async fn remove(&self, entry_id: &str) {
        self.state
            .write()
            .await
            .entries
            .retain(|entry| entry.id != entry_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{at, entry, week};

    fn day() -> EntryRange {
        EntryRange::new(at("2024-03-04T00:00:00Z"), at("2024-03-05T00:00:00Z")).unwrap()
    }

    #[tokio::test]
    async fn test_only_newest_load_applies() {
        let list = EntryList::new();
        let older = list.begin_load().await;
        let newer = list.begin_load().await;

        let fresh = vec![entry("fresh", "user-1", "2024-03-04T10:00:00Z", 60, None)];
        let stale = vec![entry("stale", "user-1", "2024-03-04T09:00:00Z", 60, None)];

        assert!(list.finish_load(newer, week(), week(), fresh).await);
        assert!(!list.finish_load(older, week(), week(), stale).await);

        let entries = list.snapshot().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "fresh");
    }

    #[tokio::test]
    async fn test_load_for_inactive_range_ignored() {
        let list = EntryList::new();
        let ticket = list.begin_load().await;

        let rows = vec![entry("e1", "user-1", "2024-03-06T09:00:00Z", 60, None)];
        assert!(!list.finish_load(ticket, week(), day(), rows).await);
        assert!(list.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_local_edits() {
        let list = EntryList::new();
        let ticket = list.begin_load().await;
        let rows = vec![entry("e1", "user-1", "2024-03-04T09:00:00Z", 60, None)];
        list.finish_load(ticket, week(), week(), rows).await;

        list.prepend(entry("e2", "user-1", "2024-03-05T09:00:00Z", 60, None))
            .await;
        list.remove("e1").await;

        let ids: Vec<String> = list.snapshot().await.into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["e2".to_string()]);
    }
}
