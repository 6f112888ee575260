//! In-process preference store holding raw stored payloads.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::application::ports::{PreferenceError, PreferenceStore};
use crate::domain::preferences::StoredPreferences;

/// Payloads are kept exactly as stored and only decoded when read, so every
/// historical shape goes through the same migration.
#[derive(Debug, Default, Clone)]
pub struct InMemoryPreferenceStore {
    payloads: HashMap<i64, Value>,
}

impl InMemoryPreferenceStore {
    pub fn new(payloads: HashMap<i64, Value>) -> Self {
        Self { payloads }
    }
}

#[async_trait]
impl PreferenceStore for InMemoryPreferenceStore {
    async fn load_preferences(
        &self,
        user_id: i64,
    ) -> Result<Option<StoredPreferences>, PreferenceError> {
        let Some(payload) = self.payloads.get(&user_id) else {
            return Ok(None);
        };
        serde_json::from_value(payload.clone())
            .map(Some)
            .map_err(|err| {
                PreferenceError::Unavailable(format!(
                    "stored preferences for user {user_id} are unreadable: {err}"
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn legacy_payload_is_migrated_on_read() {
        let store = InMemoryPreferenceStore::new(HashMap::from([(
            7,
            json!({"difficulty": {"anidle": 2, "poster_zoomed": 3}}),
        )]));
        let stored = store
            .load_preferences(7)
            .await
            .expect("load")
            .expect("present");
        assert_eq!(stored.migrate().difficulty_level, Some(3));
        assert!(store.load_preferences(8).await.expect("load").is_none());
    }

    #[tokio::test]
    async fn scalar_payload_is_an_error() {
        let store = InMemoryPreferenceStore::new(HashMap::from([(7, json!("hard"))]));
        assert!(store.load_preferences(7).await.is_err());
    }
}
