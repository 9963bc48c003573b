//! Event store seam.
//!
//! The statistics engine never persists events; it asks an [`EventStore`]
//! for full snapshots of each dataset. Snapshots may arrive in any order.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::types::Event;

/// Source of raw event snapshots.
///
/// Implementations own retries; the engine reports the first failure.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Every bot input ever recorded.
    async fn fetch_all_input_events(&self) -> Result<Vec<Event>>;

    /// One record per created user.
    async fn fetch_all_user_creation_events(&self) -> Result<Vec<Event>>;
}

#[async_trait]
impl<T: EventStore + ?Sized> EventStore for Arc<T> {
    async fn fetch_all_input_events(&self) -> Result<Vec<Event>> {
        (**self).fetch_all_input_events().await
    }

    async fn fetch_all_user_creation_events(&self) -> Result<Vec<Event>> {
        (**self).fetch_all_user_creation_events().await
    }
}

/// Store backed by two JSON array files.
///
/// ```json
/// [{"userId": 42, "createdAt": "2021-01-01T10:00:00.000Z"}]
/// ```
///
/// Either path may be left unset. Reading an unset dataset fails with
/// [`Error::Store`], so a request that never needs it still succeeds.
#[derive(Debug, Clone, Default)]
pub struct JsonFileStore {
    inputs_path: Option<PathBuf>,
    users_path: Option<PathBuf>,
}

impl JsonFileStore {
    pub fn new(inputs_path: impl Into<PathBuf>, users_path: impl Into<PathBuf>) -> Self {
        Self {
            inputs_path: Some(inputs_path.into()),
            users_path: Some(users_path.into()),
        }
    }

    /// Build from the `[store]` config section.
    pub fn from_config(config: &StoreConfig) -> Self {
        Self {
            inputs_path: config.inputs_path.clone(),
            users_path: config.users_path.clone(),
        }
    }

    async fn read_events(path: Option<&Path>, setting: &str) -> Result<Vec<Event>> {
        let path = path.ok_or_else(|| Error::Store(format!("store.{} is not set", setting)))?;
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Store(format!("failed to read {}: {}", path.display(), e)))?;
        let events: Vec<Event> = serde_json::from_str(&content)?;
        tracing::debug!(path = %path.display(), events = events.len(), "loaded snapshot");
        Ok(events)
    }
}

#[async_trait]
impl EventStore for JsonFileStore {
    async fn fetch_all_input_events(&self) -> Result<Vec<Event>> {
        Self::read_events(self.inputs_path.as_deref(), "inputs_path").await
    }

    async fn fetch_all_user_creation_events(&self) -> Result<Vec<Event>> {
        Self::read_events(self.users_path.as_deref(), "users_path").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_json_file_store_reads_both_datasets() {
        let dir = TempDir::new().unwrap();
        let inputs = dir.path().join("inputs.json");
        let users = dir.path().join("users.json");
        std::fs::write(
            &inputs,
            r#"[{"userId": 1, "createdAt": "2021-01-02T00:00:00Z"},
                {"userId": 1, "createdAt": "2021-01-01T00:00:00Z"}]"#,
        )
        .unwrap();
        std::fs::write(
            &users,
            r#"[{"userId": 1, "createdAt": "2021-01-01T00:00:00Z", "hasFavourites": true}]"#,
        )
        .unwrap();

        let store = JsonFileStore::new(&inputs, &users);

        assert_eq!(store.fetch_all_input_events().await.unwrap().len(), 2);
        let users = store.fetch_all_user_creation_events().await.unwrap();
        assert_eq!(users.len(), 1);
        assert!(users[0].has_favourites);
    }

    #[tokio::test]
    async fn test_missing_file_is_store_error() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("nope.json"), dir.path().join("nope.json"));

        let result = store.fetch_all_input_events().await;
        assert!(matches!(result, Err(Error::Store(_))));
    }

    #[tokio::test]
    async fn test_unset_path_fails_only_when_read() {
        let dir = TempDir::new().unwrap();
        let inputs = dir.path().join("inputs.json");
        std::fs::write(&inputs, "[]").unwrap();
        let store = JsonFileStore::from_config(&StoreConfig {
            inputs_path: Some(inputs),
            users_path: None,
        });

        assert!(store.fetch_all_input_events().await.unwrap().is_empty());
        let result = store.fetch_all_user_creation_events().await;
        assert!(matches!(result, Err(Error::Store(message)) if message.contains("users_path")));
    }
}
