//! Project data model

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub id: String,
    pub user_id: String,
    pub name: String,
}

impl Project {
    pub fn new(id: impl Into<String>, user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            name: name.into(),
        }
    }
}

/// Build an id -> name lookup for enriching entries.
pub fn name_lookup(projects: &[Project]) -> HashMap<&str, &str> {
    projects
        .iter()
        .map(|p| (p.id.as_str(), p.name.as_str()))
        .collect()
}
