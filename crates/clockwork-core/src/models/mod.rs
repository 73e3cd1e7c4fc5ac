pub mod config;
pub mod entry;
pub mod project;
pub mod range;
pub mod session;
pub mod user;

pub use config::{CacheConfig, Config, LogConfig, RetryConfig, StoreConfig, TimerConfig};
pub use entry::{NewTimeEntry, TimeEntry};
pub use project::Project;
pub use range::EntryRange;
pub use session::{TimerSession, TimerState};
pub use user::{AuthSession, User};
