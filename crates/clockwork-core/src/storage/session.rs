//! Persisted auth session, so separate CLI invocations stay signed in

use crate::{models::AuthSession, Result};
use std::path::PathBuf;

pub struct SessionStorage {
    data_dir: PathBuf,
}

impl SessionStorage {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    fn path(&self) -> PathBuf {
        self.data_dir.join("session.json")
    }

    pub fn load(&self) -> Result<Option<AuthSession>> {
        let session_path = self.path();
        if !session_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(session_path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        let session: AuthSession = serde_json::from_str(&content)?;
        Ok(Some(session))
    }

    pub fn save(&self, session: &AuthSession) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;

        let content = serde_json::to_string_pretty(session)?;
        std::fs::write(self.path(), content)?;

        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        let session_path = self.path();
        if session_path.exists() {
            std::fs::remove_file(session_path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use tempfile::TempDir;

    fn sample_session() -> AuthSession {
        AuthSession {
            access_token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at: None,
            user: User {
                id: "user-1".to_string(),
                email: Some("me@example.com".to_string()),
            },
        }
    }

    #[test]
    fn test_missing_session() {
        let temp_dir = TempDir::new().unwrap();
        let storage = SessionStorage::new(temp_dir.path().to_path_buf());
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn test_save_load_clear() {
        let temp_dir = TempDir::new().unwrap();
        let storage = SessionStorage::new(temp_dir.path().join("data"));

        storage.save(&sample_session()).unwrap();
        let loaded = storage.load().unwrap().unwrap();
        assert_eq!(loaded.user.id, "user-1");

        storage.clear().unwrap();
        assert!(storage.load().unwrap().is_none());
        // Clearing twice is fine
        storage.clear().unwrap();
    }
}
