pub mod cache;
pub mod list;
pub mod repository;
pub mod retry;

pub use list::EntryList;
pub use repository::{RepositoryError, TimeEntryRepository};
pub use retry::RetryPolicy;
