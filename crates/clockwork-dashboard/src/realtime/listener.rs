use clockwork_core::models::EntryRange;
use clockwork_store::{ChangeFilter, ChannelHealth, RealtimeChannel};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::entry::{EntryList, TimeEntryRepository};
use crate::event_manager::EventManager;
use crate::events::{EntriesEvent, Notice};

/// Everything the listener needs to refetch the visible range
pub struct ListenerContext {
    pub channel: Arc<dyn RealtimeChannel>,
    pub repository: Arc<TimeEntryRepository>,
    pub events: Arc<EventManager>,
    pub user_id: String,
    pub active_range: watch::Receiver<EntryRange>,
    pub entries: Arc<EntryList>,
}

/// Keeps the visible entry list in step with changes made elsewhere.
///
/// Every change notification for the user's time entries invalidates the
/// range cache and refetches the active range. Dropping the listener ends
/// the subscription.
pub struct RefreshListener {
    health: watch::Receiver<ChannelHealth>,
    task: JoinHandle<()>,
}

impl RefreshListener {
    pub fn spawn(context: ListenerContext) -> Self {
        let (health_tx, health) = watch::channel(ChannelHealth::Connecting);
        let task = tokio::spawn(run(context, health_tx));
        Self { health, task }
    }

    pub fn health(&self) -> ChannelHealth {
        *self.health.borrow()
    }

    /// Follow health transitions
    pub fn health_watch(&self) -> watch::Receiver<ChannelHealth> {
        self.health.clone()
    }
}

impl Drop for RefreshListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn report_health(context: &ListenerContext, health_tx: &watch::Sender<ChannelHealth>, health: ChannelHealth) {
    if health_tx.send_replace(health) != health {
        tracing::info!("Realtime channel for {} is {:?}", context.user_id, health);
        context.events.emit_health(&context.user_id, health);
    }
}

async fn run(context: ListenerContext, health_tx: watch::Sender<ChannelHealth>) {
    if !context.channel.has_transport() {
        tracing::debug!("No realtime transport for {}, refresh is manual", context.user_id);
        report_health(&context, &health_tx, ChannelHealth::Disconnected);
        return;
    }

    let filter = ChangeFilter::time_entries_for(context.user_id.as_str());
    let mut subscription = match context.channel.subscribe(filter).await {
        Ok(subscription) => subscription,
        Err(e) => {
            tracing::warn!("Realtime subscription failed for {}: {}", context.user_id, e);
            report_health(&context, &health_tx, ChannelHealth::Disconnected);
            context
                .events
                .emit_notice(Notice::warning("Live updates are unavailable"));
            return;
        }
    };

    let mut upstream = subscription.health();
    let initial = *upstream.borrow_and_update();
    report_health(&context, &health_tx, initial);
    let mut upstream_open = true;

    loop {
        tokio::select! {
            notification = subscription.recv() => match notification {
                Some(notification) => {
                    tracing::debug!(
                        "{:?} on {} ({:?}), refreshing",
                        notification.kind,
                        notification.table,
                        notification.record_id
                    );
                    refresh(&context).await;
                }
                None => {
                    tracing::warn!("Realtime channel closed for {}", context.user_id);
                    report_health(&context, &health_tx, ChannelHealth::Disconnected);
                    break;
                }
            },
            changed = upstream.changed(), if upstream_open => match changed {
                Ok(()) => {
                    let health = *upstream.borrow_and_update();
                    report_health(&context, &health_tx, health);
                }
                Err(_) => upstream_open = false,
            },
        }
    }
}

async fn refresh(context: &ListenerContext) {
    let range = *context.active_range.borrow();
    let ticket = context.entries.begin_load().await;
    context.repository.invalidate_range();

    match context.repository.fetch_range(&context.user_id, range).await {
        Ok(entries) => {
            let count = entries.len();
            let active = *context.active_range.borrow();
            if !context.entries.finish_load(ticket, range, active, entries).await {
                tracing::debug!("Dropping refresh of a superseded range for {}", context.user_id);
                return;
            }
            context
                .events
                .emit_entries(EntriesEvent::refreshed(context.user_id.as_str(), range, count));
        }
        Err(e) => {
            tracing::warn!("Realtime refresh failed for {}: {}", context.user_id, e);
            context
                .events
                .emit_notice(Notice::error(format!("Could not refresh entries: {}", e.message())));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::RetryPolicy;
    use crate::events::{DashboardEvent, NoticeLevel};
    use crate::testing::{week, MockStore};
    use async_trait::async_trait;
    use clockwork_store::{MemoryStore, Subscription};
    use std::time::Duration;
    use tokio::sync::broadcast;

    struct NoTransport;

    #[async_trait]
    impl RealtimeChannel for NoTransport {
        fn has_transport(&self) -> bool {
            false
        }

        async fn subscribe(&self, _filter: ChangeFilter) -> clockwork_store::Result<Subscription> {
            unreachable!()
        }
    }

    fn context(channel: Arc<dyn RealtimeChannel>, events: &Arc<EventManager>) -> ListenerContext {
        let repository = TimeEntryRepository::with_policy(
            Arc::new(MockStore::new()),
            RetryPolicy::new(1, Duration::ZERO),
            Duration::from_secs(120),
        );
        let (_, active_range) = watch::channel(week());
        ListenerContext {
            channel,
            repository: Arc::new(repository),
            events: events.clone(),
            user_id: "user-1".to_string(),
            active_range,
            entries: Arc::new(EntryList::new()),
        }
    }

    fn notices(receiver: &mut broadcast::Receiver<DashboardEvent>) -> Vec<NoticeLevel> {
        let mut levels = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            if let DashboardEvent::Notice(notice) = event {
                levels.push(notice.level);
            }
        }
        levels
    }

    async fn wait_disconnected(listener: &RefreshListener) {
        let mut health = listener.health_watch();
        health
            .wait_for(|h| *h == ChannelHealth::Disconnected)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_channel_without_transport_is_skipped_quietly() {
        let events = Arc::new(EventManager::new());
        let mut receiver = events.subscribe();

        let listener = RefreshListener::spawn(context(Arc::new(NoTransport), &events));
        wait_disconnected(&listener).await;

        assert!(notices(&mut receiver).is_empty());
    }

    #[tokio::test]
    async fn test_failed_subscription_warns() {
        let store = MemoryStore::new();
        store.set_realtime_down(true);
        let events = Arc::new(EventManager::new());
        let mut receiver = events.subscribe();

        let listener = RefreshListener::spawn(context(Arc::new(store), &events));
        wait_disconnected(&listener).await;
        tokio::task::yield_now().await;

        assert_eq!(notices(&mut receiver), vec![NoticeLevel::Warning]);
    }
}
