//! In-process store with realtime notifications
//!
//! The store double for tests and for driving a view without a backend.
//! Every successful write is pushed to matching subscribers, the way the
//! hosted realtime channel would.

use async_trait::async_trait;
use clockwork_core::models::{EntryRange, NewTimeEntry, Project, TimeEntry};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::realtime::{
    ChangeFilter, ChangeKind, ChangeNotification, ChannelHealth, RealtimeChannel, Subscription,
    TIME_ENTRIES_TABLE,
};
use crate::store::EntryStore;
use crate::{Error, Result};

const SUBSCRIBER_BUFFER: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub select_entries: usize,
    pub select_projects: usize,
    pub insert_entry: usize,
    pub delete_entry: usize,
}

struct Subscriber {
    filter: ChangeFilter,
    sender: mpsc::Sender<ChangeNotification>,
    health: watch::Sender<ChannelHealth>,
}

#[derive(Default)]
struct Inner {
    entries: Vec<TimeEntry>,
    projects: Vec<Project>,
    subscribers: HashMap<u64, Subscriber>,
    next_subscriber: u64,
    unavailable: bool,
    realtime_down: bool,
    calls: CallCounts,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_project(&self, project: Project) {
        self.lock().projects.push(project);
    }

    /// Insert a row as if another client wrote it, notifying subscribers.
    pub fn insert_external(&self, entry: NewTimeEntry) -> String {
        let mut inner = self.lock();
        Self::insert_locked(&mut inner, entry)
    }

    /// Edit a row as if another client changed it, notifying subscribers.
    /// Returns false when no row has this id.
    pub fn update_external<F>(&self, entry_id: &str, edit: F) -> bool
    where
        F: FnOnce(&mut TimeEntry),
    {
        let mut inner = self.lock();
        let Some(entry) = inner.entries.iter_mut().find(|e| e.id == entry_id) else {
            return false;
        };
        edit(entry);
        let user_id = entry.user_id.clone();
        Self::notify(&mut inner, ChangeKind::Update, entry_id, &user_id);
        true
    }

    /// Delete a row as if another client removed it, notifying subscribers.
    pub fn delete_external(&self, entry_id: &str) -> bool {
        let mut inner = self.lock();
        let Some(position) = inner.entries.iter().position(|e| e.id == entry_id) else {
            return false;
        };
        let removed = inner.entries.remove(position);
        Self::notify(&mut inner, ChangeKind::Delete, &removed.id, &removed.user_id);
        true
    }

    /// Make every store call fail until switched back
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Refuse new realtime subscriptions
    pub fn set_realtime_down(&self, down: bool) {
        self.lock().realtime_down = down;
    }

    /// Drop every live subscription as a lost connection would
    pub fn disconnect_all(&self) {
        let mut inner = self.lock();
        for (_, subscriber) in inner.subscribers.drain() {
            let _ = subscriber.health.send(ChannelHealth::Disconnected);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }

    pub fn entries(&self) -> Vec<TimeEntry> {
        self.lock().entries.clone()
    }

    fn check_available(inner: &Inner) -> Result<()> {
        if inner.unavailable {
            return Err(Error::Unavailable("memory store switched off".to_string()));
        }
        Ok(())
    }

    fn insert_locked(inner: &mut Inner, entry: NewTimeEntry) -> String {
        let id = Uuid::new_v4().to_string();
        let user_id = entry.user_id.clone();
        inner.entries.push(entry.into_entry(id.clone()));
        Self::notify(inner, ChangeKind::Insert, &id, &user_id);
        id
    }

    fn notify(inner: &mut Inner, kind: ChangeKind, record_id: &str, user_id: &str) {
        let notification = ChangeNotification::new(
            TIME_ENTRIES_TABLE,
            kind,
            Some(record_id.to_string()),
            Some(user_id.to_string()),
        );

        inner.subscribers.retain(|id, subscriber| {
            if !subscriber.filter.matches(&notification) {
                return true;
            }
            match subscriber.sender.try_send(notification.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!("Subscriber {} is lagging, dropping notification", id);
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }
}

#[async_trait]
impl EntryStore for MemoryStore {
    async fn select_entries(&self, user_id: &str, range: EntryRange) -> Result<Vec<TimeEntry>> {
        let mut inner = self.lock();
        inner.calls.select_entries += 1;
        Self::check_available(&inner)?;

        let mut entries: Vec<TimeEntry> = inner
            .entries
            .iter()
            .filter(|e| e.user_id == user_id && range.contains(e.start_time))
            .cloned()
            .collect();
        // Stable sort: equal start times keep insertion order
        entries.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(entries)
    }

    async fn select_projects(&self, user_id: &str) -> Result<Vec<Project>> {
        let mut inner = self.lock();
        inner.calls.select_projects += 1;
        Self::check_available(&inner)?;

        Ok(inner
            .projects
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert_entry(&self, entry: &NewTimeEntry) -> Result<String> {
        let mut inner = self.lock();
        inner.calls.insert_entry += 1;
        Self::check_available(&inner)?;
        entry.validate()?;

        if let Some(ref project_id) = entry.project_id {
            let owned = inner
                .projects
                .iter()
                .any(|p| &p.id == project_id && p.user_id == entry.user_id);
            if !owned {
                return Err(Error::NotFound(format!("project {}", project_id)));
            }
        }

        Ok(Self::insert_locked(&mut inner, entry.clone()))
    }

    async fn delete_entry(&self, entry_id: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.calls.delete_entry += 1;
        Self::check_available(&inner)?;

        let position = inner
            .entries
            .iter()
            .position(|e| e.id == entry_id)
            .ok_or_else(|| Error::NotFound(format!("time entry {}", entry_id)))?;
        let removed = inner.entries.remove(position);
        Self::notify(&mut inner, ChangeKind::Delete, &removed.id, &removed.user_id);
        Ok(())
    }
}

#[async_trait]
impl RealtimeChannel for MemoryStore {
    async fn subscribe(&self, filter: ChangeFilter) -> Result<Subscription> {
        let mut inner = self.lock();
        if inner.realtime_down {
            return Err(Error::Subscription("realtime channel unavailable".to_string()));
        }

        let id = inner.next_subscriber;
        inner.next_subscriber += 1;

        let (sender, receiver) = mpsc::channel(SUBSCRIBER_BUFFER);
        let (health_tx, health_rx) = watch::channel(ChannelHealth::Connected);
        inner.subscribers.insert(
            id,
            Subscriber {
                filter,
                sender,
                health: health_tx,
            },
        );

        let store = Arc::downgrade(&self.inner);
        Ok(Subscription::new(receiver, health_rx, move || {
            if let Some(inner) = store.upgrade() {
                let mut inner = inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                inner.subscribers.remove(&id);
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};

    fn at(rfc3339: &str) -> DateTime<Utc> {
        rfc3339.parse().unwrap()
    }

    fn new_entry(user: &str, start: &str, seconds: u64) -> NewTimeEntry {
        let start = at(start);
        NewTimeEntry::completed(
            user,
            "work",
            None,
            seconds,
            start,
            start + Duration::seconds(seconds as i64),
        )
        .unwrap()
    }

    fn week() -> EntryRange {
        EntryRange::new(at("2024-03-04T00:00:00Z"), at("2024-03-11T00:00:00Z")).unwrap()
    }

    #[tokio::test]
    async fn test_select_filters_and_orders() {
        let store = MemoryStore::new();
        let first = store.insert_external(new_entry("user-1", "2024-03-04T09:00:00Z", 60));
        let tie_a = store.insert_external(new_entry("user-1", "2024-03-05T09:00:00Z", 60));
        let tie_b = store.insert_external(new_entry("user-1", "2024-03-05T09:00:00Z", 30));
        store.insert_external(new_entry("user-2", "2024-03-05T09:00:00Z", 60));
        store.insert_external(new_entry("user-1", "2024-03-12T09:00:00Z", 60));

        let entries = store.select_entries("user-1", week()).await.unwrap();
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec![tie_a.as_str(), tie_b.as_str(), first.as_str()]);
        assert_eq!(store.calls().select_entries, 1);
    }

    #[tokio::test]
    async fn test_unavailable_fails_every_call() {
        let store = MemoryStore::new();
        store.set_unavailable(true);

        assert!(matches!(
            store.select_entries("user-1", week()).await,
            Err(Error::Unavailable(_))
        ));
        assert!(store
            .insert_entry(&new_entry("user-1", "2024-03-04T09:00:00Z", 60))
            .await
            .is_err());
        assert!(store.entries().is_empty());

        store.set_unavailable(false);
        assert!(store.select_entries("user-1", week()).await.is_ok());
    }

    #[tokio::test]
    async fn test_insert_checks_project_owner() {
        let store = MemoryStore::new();
        store.add_project(Project::new("p1", "user-2", "Not yours"));

        let mut entry = new_entry("user-1", "2024-03-04T09:00:00Z", 60);
        entry.project_id = Some("p1".to_string());
        assert!(matches!(
            store.insert_entry(&entry).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_missing_entry() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.delete_entry("nope").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_subscription_receives_own_changes() {
        let store = MemoryStore::new();
        let mut subscription = store
            .subscribe(ChangeFilter::time_entries_for("user-1"))
            .await
            .unwrap();

        store.insert_external(new_entry("user-2", "2024-03-04T09:00:00Z", 60));
        let id = store
            .insert_entry(&new_entry("user-1", "2024-03-04T10:00:00Z", 60))
            .await
            .unwrap();
        store.delete_entry(&id).await.unwrap();

        let inserted = subscription.recv().await.unwrap();
        assert_eq!(inserted.kind, ChangeKind::Insert);
        assert_eq!(inserted.record_id, Some(id.clone()));

        let deleted = subscription.recv().await.unwrap();
        assert_eq!(deleted.kind, ChangeKind::Delete);
    }

    #[tokio::test]
    async fn test_external_edits_notify() {
        let store = MemoryStore::new();
        let id = store.insert_external(new_entry("user-1", "2024-03-04T09:00:00Z", 60));
        let mut subscription = store
            .subscribe(ChangeFilter::time_entries_for("user-1"))
            .await
            .unwrap();

        assert!(store.update_external(&id, |entry| entry.description = "renamed".to_string()));
        assert!(!store.update_external("nope", |_| {}));
        assert!(store.delete_external(&id));
        assert!(!store.delete_external(&id));

        let updated = subscription.recv().await.unwrap();
        assert_eq!(updated.kind, ChangeKind::Update);
        assert_eq!(updated.record_id, Some(id.clone()));

        let deleted = subscription.recv().await.unwrap();
        assert_eq!(deleted.kind, ChangeKind::Delete);
        assert!(store.entries().is_empty());
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let store = MemoryStore::new();
        let subscription = store
            .subscribe(ChangeFilter::time_entries_for("user-1"))
            .await
            .unwrap();
        assert_eq!(store.subscriber_count(), 1);

        drop(subscription);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_reports_health() {
        let store = MemoryStore::new();
        let mut subscription = store
            .subscribe(ChangeFilter::time_entries_for("user-1"))
            .await
            .unwrap();
        let health = subscription.health();
        assert_eq!(*health.borrow(), ChannelHealth::Connected);

        store.disconnect_all();
        assert_eq!(*health.borrow(), ChannelHealth::Disconnected);
        assert!(subscription.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_realtime_down() {
        let store = MemoryStore::new();
        store.set_realtime_down(true);
        assert!(matches!(
            store.subscribe(ChangeFilter::time_entries_for("user-1")).await,
            Err(Error::Subscription(_))
        ));
    }
}
