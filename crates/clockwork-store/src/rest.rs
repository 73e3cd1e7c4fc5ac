//! Row store adapter speaking the hosted REST dialect

use async_trait::async_trait;
use clockwork_core::models::{EntryRange, NewTimeEntry, Project, StoreConfig, TimeEntry};
use reqwest::{header::CONTENT_TYPE, Client, Method, RequestBuilder, Response};
use tracing::debug;

use crate::realtime::{ChangeFilter, RealtimeChannel, Subscription};
use crate::store::EntryStore;
use crate::types::{ApiErrorBody, InsertedRow};
use crate::{Error, Result};

/// Client for the `/rest/v1` endpoints, scoped to one signed-in user's token.
///
/// Row level security on the store side limits what the token can see; the
/// explicit `user_id` predicates keep queries narrow anyway.
pub struct RestStore {
    client: Client,
    base_url: String,
    api_key: String,
    access_token: String,
}

impl RestStore {
    pub fn new(config: &StoreConfig, access_token: impl Into<String>) -> Self {
        Self::with_client(Client::new(), config, access_token)
    }

    pub fn with_client(client: Client, config: &StoreConfig, access_token: impl Into<String>) -> Self {
        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            access_token: access_token.into(),
        }
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/rest/v1/{}", self.base_url, table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.access_token)
            .header(CONTENT_TYPE, "application/json")
    }
}

/// Turn a non-success response into `Error::Api` with the best message available
pub(crate) async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .ok()
        .and_then(|b| b.describe())
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body
            }
        });

    Err(Error::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl EntryStore for RestStore {
    async fn select_entries(&self, user_id: &str, range: EntryRange) -> Result<Vec<TimeEntry>> {
        let response = self
            .request(Method::GET, "time_entries")
            .query(&[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{}", user_id)),
                ("start_time", format!("gte.{}", range.start.to_rfc3339())),
                ("start_time", format!("lt.{}", range.end.to_rfc3339())),
                ("order", "start_time.desc".to_string()),
            ])
            .send()
            .await?;

        let entries = check(response).await?.json::<Vec<TimeEntry>>().await?;
        debug!("Fetched {} time entries for {}", entries.len(), user_id);
        Ok(entries)
    }

    async fn select_projects(&self, user_id: &str) -> Result<Vec<Project>> {
        let response = self
            .request(Method::GET, "projects")
            .query(&[
                ("select", "id,user_id,name".to_string()),
                ("user_id", format!("eq.{}", user_id)),
            ])
            .send()
            .await?;

        let projects = check(response).await?.json::<Vec<Project>>().await?;
        Ok(projects)
    }

    async fn insert_entry(&self, entry: &NewTimeEntry) -> Result<String> {
        let response = self
            .request(Method::POST, "time_entries")
            .header("Prefer", "return=representation")
            .json(entry)
            .send()
            .await?;

        let rows = check(response).await?.json::<Vec<InsertedRow>>().await?;
        rows.into_iter()
            .next()
            .map(|row| row.id)
            .ok_or_else(|| Error::Api {
                status: 200,
                message: "Insert returned no rows".to_string(),
            })
    }

    async fn delete_entry(&self, entry_id: &str) -> Result<()> {
        let response = self
            .request(Method::DELETE, "time_entries")
            .query(&[("id", format!("eq.{}", entry_id))])
            .send()
            .await?;

        check(response).await?;
        Ok(())
    }
}

/// No websocket transport is wired up for the hosted backend, so callers
/// fall back to manual refresh.
#[async_trait]
impl RealtimeChannel for RestStore {
    fn has_transport(&self) -> bool {
        false
    }

    async fn subscribe(&self, filter: ChangeFilter) -> Result<Subscription> {
        Err(Error::Subscription(format!(
            "no realtime transport for {} at {}",
            filter.table, self.base_url
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use mockito::Matcher;

    fn config(url: &str) -> StoreConfig {
        StoreConfig {
            url: format!("{}/", url),
            api_key: "anon-key".to_string(),
        }
    }

    fn range() -> EntryRange {
        let start: DateTime<Utc> = "2024-03-04T00:00:00Z".parse().unwrap();
        let end: DateTime<Utc> = "2024-03-11T00:00:00Z".parse().unwrap();
        EntryRange::new(start, end).unwrap()
    }

    #[tokio::test]
    async fn test_select_entries() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/v1/time_entries")
            .match_header("apikey", "anon-key")
            .match_header("authorization", "Bearer token-1")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("user_id".into(), "eq.user-1".into()),
                Matcher::UrlEncoded("order".into(), "start_time.desc".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {"id":"e2","user_id":"user-1","description":"Review","duration":600,
                     "start_time":"2024-03-05T10:00:00Z","end_time":"2024-03-05T10:10:00Z","project_id":"p1"},
                    {"id":"e1","user_id":"user-1","description":"Standup","duration":900,
                     "start_time":"2024-03-04T09:00:00Z","end_time":"2024-03-04T09:15:00Z","project_id":null}
                ]"#,
            )
            .create_async()
            .await;

        let store = RestStore::new(&config(&server.url()), "token-1");
        let entries = store.select_entries("user-1", range()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "e2");
        assert_eq!(entries[0].project_id, Some("p1".to_string()));
        assert_eq!(entries[1].duration_seconds, 900);
    }

    #[tokio::test]
    async fn test_error_status_maps_to_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/v1/projects")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"message":"JWT expired","code":"PGRST301"}"#)
            .create_async()
            .await;

        let store = RestStore::new(&config(&server.url()), "stale");
        let err = store.select_projects("user-1").await.unwrap_err();

        match err {
            Error::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "JWT expired");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_insert_returns_assigned_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/v1/time_entries")
            .match_header("prefer", "return=representation")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "user_id": "user-1",
                "description": "Design review",
                "duration": 125
            })))
            .with_status(201)
            .with_body(r#"[{"id":"new-id","user_id":"user-1"}]"#)
            .create_async()
            .await;

        let start: DateTime<Utc> = "2024-03-04T09:00:00Z".parse().unwrap();
        let entry = NewTimeEntry::completed(
            "user-1",
            "Design review",
            None,
            125,
            start,
            start + chrono::Duration::seconds(125),
        )
        .unwrap();

        let store = RestStore::new(&config(&server.url()), "token-1");
        let id = store.insert_entry(&entry).await.unwrap();

        mock.assert_async().await;
        assert_eq!(id, "new-id");
    }

    #[tokio::test]
    async fn test_realtime_unsupported() {
        let store = RestStore::new(&config("http://localhost:54321"), "token-1");
        let result = store
            .subscribe(ChangeFilter::time_entries_for("user-1"))
            .await;
        assert!(matches!(result, Err(Error::Subscription(_))));
        assert!(!store.has_transport());
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/rest/v1/time_entries")
            .match_query(Matcher::UrlEncoded("id".into(), "eq.e1".into()))
            .with_status(204)
            .create_async()
            .await;

        let store = RestStore::new(&config(&server.url()), "token-1");
        store.delete_entry("e1").await.unwrap();
        mock.assert_async().await;
    }
}
