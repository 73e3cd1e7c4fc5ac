//! Realtime change notifications

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};

use crate::Result;

pub const TIME_ENTRIES_TABLE: &str = "time_entries";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A row changed in the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeNotification {
    pub table: String,
    pub kind: ChangeKind,
    pub record_id: Option<String>,
    pub user_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ChangeNotification {
    pub fn new(
        table: impl Into<String>,
        kind: ChangeKind,
        record_id: Option<String>,
        user_id: Option<String>,
    ) -> Self {
        Self {
            table: table.into(),
            kind,
            record_id,
            user_id,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFilter {
    pub table: String,
    /// Empty means every kind
    pub kinds: Vec<ChangeKind>,
    pub user_id: String,
}

impl ChangeFilter {
    /// Inserts, updates and deletes on the user's time entries
    pub fn time_entries_for(user_id: impl Into<String>) -> Self {
        Self {
            table: TIME_ENTRIES_TABLE.to_string(),
            kinds: Vec::new(),
            user_id: user_id.into(),
        }
    }

    pub fn matches(&self, notification: &ChangeNotification) -> bool {
        notification.table == self.table
            && (self.kinds.is_empty() || self.kinds.contains(&notification.kind))
            && notification.user_id.as_deref() == Some(self.user_id.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelHealth {
    Connecting,
    Connected,
    Disconnected,
}

/// A live subscription. Dropping it unsubscribes.
pub struct Subscription {
    receiver: mpsc::Receiver<ChangeNotification>,
    health: watch::Receiver<ChannelHealth>,
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(
        receiver: mpsc::Receiver<ChangeNotification>,
        health: watch::Receiver<ChannelHealth>,
        release: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self {
            receiver,
            health,
            release: Some(Box::new(release)),
        }
    }

    /// Next notification, or `None` once the channel has closed
    pub async fn recv(&mut self) -> Option<ChangeNotification> {
        self.receiver.recv().await
    }

    pub fn health(&self) -> watch::Receiver<ChannelHealth> {
        self.health.clone()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("health", &*self.health.borrow())
            .finish()
    }
}

/// The hosted realtime channel
#[async_trait]
pub trait RealtimeChannel: Send + Sync {
    /// Whether this channel can deliver notifications at all. Listeners
    /// skip channels without a transport instead of reporting a failure.
    fn has_transport(&self) -> bool {
        true
    }

    async fn subscribe(&self, filter: ChangeFilter) -> Result<Subscription>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_filter_matches_user_and_table() {
        let filter = ChangeFilter::time_entries_for("user-1");

        let own = ChangeNotification::new(
            TIME_ENTRIES_TABLE,
            ChangeKind::Insert,
            Some("e1".to_string()),
            Some("user-1".to_string()),
        );
        let other_user = ChangeNotification {
            user_id: Some("user-2".to_string()),
            ..own.clone()
        };
        let other_table = ChangeNotification {
            table: "projects".to_string(),
            ..own.clone()
        };

        assert!(filter.matches(&own));
        assert!(!filter.matches(&other_user));
        assert!(!filter.matches(&other_table));
    }

    #[test]
    fn test_filter_kinds() {
        let filter = ChangeFilter {
            kinds: vec![ChangeKind::Delete],
            ..ChangeFilter::time_entries_for("user-1")
        };
        let insert = ChangeNotification::new(
            TIME_ENTRIES_TABLE,
            ChangeKind::Insert,
            None,
            Some("user-1".to_string()),
        );
        let delete = ChangeNotification {
            kind: ChangeKind::Delete,
            ..insert.clone()
        };

        assert!(!filter.matches(&insert));
        assert!(filter.matches(&delete));
    }

    #[tokio::test]
    async fn test_drop_releases_subscription() {
        let released = Arc::new(AtomicBool::new(false));
        let flag = released.clone();

        let (tx, rx) = mpsc::channel(4);
        let (_health_tx, health_rx) = watch::channel(ChannelHealth::Connected);
        let mut subscription = Subscription::new(rx, health_rx, move || {
            flag.store(true, Ordering::SeqCst);
        });

        tx.send(ChangeNotification::new(
            TIME_ENTRIES_TABLE,
            ChangeKind::Update,
            None,
            Some("user-1".to_string()),
        ))
        .await
        .unwrap();
        assert_eq!(subscription.recv().await.unwrap().kind, ChangeKind::Update);
        assert!(!released.load(Ordering::SeqCst));

        drop(subscription);
        assert!(released.load(Ordering::SeqCst));
    }
}
