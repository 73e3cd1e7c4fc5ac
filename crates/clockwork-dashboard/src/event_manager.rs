//! Central event management and broadcasting

use clockwork_store::ChannelHealth;
use tokio::sync::broadcast;

use crate::events::{DashboardEvent, EntriesEvent, Notice, RealtimeEvent};
use crate::timer::TimerEvent;

/// Fans dashboard events out to every subscriber (renderers, loggers, tests)
pub struct EventManager {
    event_tx: broadcast::Sender<DashboardEvent>,
}

impl EventManager {
    /// Create a new event manager with a broadcast channel
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(1000);
        Self { event_tx }
    }

    /// Subscribe to all dashboard events
    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.event_tx.subscribe()
    }

    pub fn emit_timer(&self, event: TimerEvent) {
        let _ = self.event_tx.send(DashboardEvent::Timer(event));
    }

    pub fn emit_entries(&self, event: EntriesEvent) {
        tracing::debug!("Broadcasting entries event: {:?}", event.event_type);
        let _ = self.event_tx.send(DashboardEvent::Entries(event));
    }

    /// Raise a user-facing notice
    pub fn emit_notice(&self, notice: Notice) {
        tracing::info!("Notice ({:?}): {}", notice.level, notice.message);
        let _ = self.event_tx.send(DashboardEvent::Notice(notice));
    }

    pub fn emit_health(&self, user_id: &str, health: ChannelHealth) {
        let _ = self
            .event_tx
            .send(DashboardEvent::Realtime(RealtimeEvent::new(user_id, health)));
    }
}

impl Default for EventManager {
    fn default() -> Self {
        Self::new()
    }
}
