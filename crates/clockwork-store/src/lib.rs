//! Clockwork Store
//!
//! Contracts for the hosted backend (row store, realtime channel, auth) and
//! the adapters that implement them.

pub mod auth;
pub mod error;
pub mod memory;
pub mod realtime;
pub mod rest;
pub mod store;
pub mod types;

pub use auth::{AuthClient, SignUpOutcome};
pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use realtime::{
    ChangeFilter, ChangeKind, ChangeNotification, ChannelHealth, RealtimeChannel, Subscription,
};
pub use rest::RestStore;
pub use store::EntryStore;
