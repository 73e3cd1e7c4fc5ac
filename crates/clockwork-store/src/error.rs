//! Error types for the hosted store integration

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Store API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Subscription error: {0}")]
    Subscription(String),

    #[error("Core error: {0}")]
    Core(#[from] clockwork_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
