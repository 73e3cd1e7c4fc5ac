//! Clockwork Core
//!
//! Data model, configuration and reporting shared by the store adapters and
//! the dashboard.

pub mod error;
pub mod models;
pub mod report;
pub mod storage;

pub use error::{Error, Result};
