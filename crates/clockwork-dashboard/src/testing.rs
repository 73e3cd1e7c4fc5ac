//! Shared fixtures for unit tests

use chrono::{DateTime, Duration, Utc};
use clockwork_core::models::{EntryRange, NewTimeEntry, Project, TimeEntry};
use clockwork_store::EntryStore;

mockall::mock! {
    pub Store {}

    #[async_trait::async_trait]
    impl EntryStore for Store {
        async fn select_entries(&self, user_id: &str, range: EntryRange) -> clockwork_store::Result<Vec<TimeEntry>>;
        async fn select_projects(&self, user_id: &str) -> clockwork_store::Result<Vec<Project>>;
        async fn insert_entry(&self, entry: &NewTimeEntry) -> clockwork_store::Result<String>;
        async fn delete_entry(&self, entry_id: &str) -> clockwork_store::Result<()>;
    }
}

pub fn at(rfc3339: &str) -> DateTime<Utc> {
    rfc3339.parse().unwrap()
}

pub fn week() -> EntryRange {
    EntryRange::new(at("2024-03-04T00:00:00Z"), at("2024-03-11T00:00:00Z")).unwrap()
}

pub fn entry(id: &str, user_id: &str, start: &str, seconds: u64, project_id: Option<&str>) -> TimeEntry {
    let mut new_entry = new_entry(user_id, start, seconds);
    new_entry.project_id = project_id.map(str::to_string);
    new_entry.into_entry(id)
}

pub fn new_entry(user_id: &str, start: &str, seconds: u64) -> NewTimeEntry {
    let start = at(start);
    NewTimeEntry::completed(
        user_id,
        "work",
        None,
        seconds,
        start,
        start + Duration::seconds(seconds as i64),
    )
    .unwrap()
}

pub fn project(id: &str, user_id: &str, name: &str) -> Project {
    Project::new(id, user_id, name)
}
