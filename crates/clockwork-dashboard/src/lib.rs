//! Clockwork Dashboard
//!
//! Timer, cached time-entry repository and realtime refresh for one
//! signed-in user, exposed as a library for the CLI and for testing.

pub mod config;
pub mod entry;
pub mod event_manager;
pub mod events;
pub mod realtime;
pub mod timer;
pub mod view;

#[cfg(test)]
pub(crate) mod testing;

pub use config::ConfigManager;
pub use entry::{RepositoryError, RetryPolicy, TimeEntryRepository};
pub use event_manager::EventManager;
pub use events::{DashboardEvent, EntriesEvent, EntriesEventType, Notice, NoticeLevel};
pub use realtime::RefreshListener;
pub use timer::{TimerEngine, TimerEngineError, TimerEvent, TimerEventType};
pub use view::{DashboardView, ViewDeps};
