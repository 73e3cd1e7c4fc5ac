//! Wire types for the hosted REST APIs

use clockwork_core::models::User;
use serde::{Deserialize, Serialize};

/// Error body returned by the row store and the auth service
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(alias = "msg", alias = "error_description")]
    pub message: Option<String>,
    pub error: Option<String>,
    pub code: Option<serde_json::Value>,
}

impl ApiErrorBody {
    pub fn describe(&self) -> Option<String> {
        self.message.clone().or_else(|| self.error.clone())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Credentials<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

impl From<AuthUser> for User {
    fn from(user: AuthUser) -> Self {
        Self {
            id: user.id,
            email: user.email,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub user: AuthUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InsertedRow {
    pub id: String,
}
