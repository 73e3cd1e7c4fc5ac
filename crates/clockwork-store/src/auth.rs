//! Hosted authentication provider

use chrono::{Duration, Utc};
use clockwork_core::models::{AuthSession, StoreConfig, User};
use reqwest::{header::CONTENT_TYPE, Client};
use tracing::info;

use crate::rest::check;
use crate::types::{AuthUser, Credentials, TokenResponse};
use crate::{Error, Result};

/// Result of a sign-up: either an immediate session or a pending
/// email confirmation.
#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    SignedIn(AuthSession),
    ConfirmationRequired(User),
}

pub struct AuthClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AuthClient {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let response = self
            .client
            .post(self.url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .json(&Credentials { email, password })
            .send()
            .await?;

        let token = check(response)
            .await
            .map_err(auth_error)?
            .json::<TokenResponse>()
            .await?;

        info!("Signed in as {}", token.user.id);
        Ok(into_session(token))
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome> {
        let response = self
            .client
            .post(self.url("signup"))
            .header("apikey", &self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .json(&Credentials { email, password })
            .send()
            .await?;

        let body = check(response)
            .await
            .map_err(auth_error)?
            .json::<serde_json::Value>()
            .await?;

        if body.get("access_token").is_some() {
            let token: TokenResponse = serde_json::from_value(body)?;
            return Ok(SignUpOutcome::SignedIn(into_session(token)));
        }

        let user: AuthUser = serde_json::from_value(body)?;
        Ok(SignUpOutcome::ConfirmationRequired(user.into()))
    }

    pub async fn sign_out(&self, access_token: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url("logout"))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        check(response).await.map_err(auth_error)?;
        Ok(())
    }

    pub async fn current_user(&self, access_token: &str) -> Result<User> {
        let response = self
            .client
            .get(self.url("user"))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        let user = check(response)
            .await
            .map_err(auth_error)?
            .json::<AuthUser>()
            .await?;
        Ok(user.into())
    }
}

fn into_session(token: TokenResponse) -> AuthSession {
    AuthSession {
        access_token: token.access_token,
        refresh_token: token.refresh_token,
        expires_at: token.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
        user: token.user.into(),
    }
}

fn auth_error(err: Error) -> Error {
    match err {
        Error::Api { message, .. } => Error::Auth(message),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client(url: &str) -> AuthClient {
        AuthClient::new(&StoreConfig {
            url: url.to_string(),
            api_key: "anon-key".to_string(),
        })
    }

    #[tokio::test]
    async fn test_sign_in() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/v1/token")
            .match_query(Matcher::UrlEncoded("grant_type".into(), "password".into()))
            .match_header("apikey", "anon-key")
            .match_body(Matcher::Json(serde_json::json!({
                "email": "me@example.com",
                "password": "hunter22"
            })))
            .with_status(200)
            .with_body(
                r#"{"access_token":"at","refresh_token":"rt","expires_in":3600,
                    "token_type":"bearer","user":{"id":"user-1","email":"me@example.com"}}"#,
            )
            .create_async()
            .await;

        let session = client(&server.url())
            .sign_in("me@example.com", "hunter22")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(session.access_token, "at");
        assert_eq!(session.user.id, "user-1");
        assert!(!session.is_expired());
    }

    #[tokio::test]
    async fn test_sign_in_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/auth/v1/token")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#)
            .create_async()
            .await;

        let err = client(&server.url())
            .sign_in("me@example.com", "wrong")
            .await
            .unwrap_err();

        match err {
            Error::Auth(message) => assert_eq!(message, "Invalid login credentials"),
            other => panic!("Expected Auth error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sign_up_requires_confirmation() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/auth/v1/signup")
            .with_status(200)
            .with_body(r#"{"id":"user-2","email":"new@example.com","confirmation_sent_at":"2024-03-04T09:00:00Z"}"#)
            .create_async()
            .await;

        let outcome = client(&server.url())
            .sign_up("new@example.com", "secret123")
            .await
            .unwrap();

        assert_eq!(
            outcome,
            SignUpOutcome::ConfirmationRequired(User {
                id: "user-2".to_string(),
                email: Some("new@example.com".to_string()),
            })
        );
    }

    #[tokio::test]
    async fn test_current_user_and_sign_out() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/auth/v1/user")
            .match_header("authorization", "Bearer at")
            .with_status(200)
            .with_body(r#"{"id":"user-1","email":"me@example.com","role":"authenticated"}"#)
            .create_async()
            .await;
        let logout = server
            .mock("POST", "/auth/v1/logout")
            .match_header("authorization", "Bearer at")
            .with_status(204)
            .create_async()
            .await;

        let auth = client(&server.url());
        let user = auth.current_user("at").await.unwrap();
        assert_eq!(user.id, "user-1");

        auth.sign_out("at").await.unwrap();
        logout.assert_async().await;
    }
}
