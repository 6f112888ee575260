//! Catalog and theme-clip adapters backed by a JSON snapshot file.
//!
//! The snapshot carries everything a run needs: the popular pool, extra
//! media details, the opening pool, per-user watch lists and preference
//! payloads, and known opening clips keyed by title.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use time::Date;
use tracing::{debug, info};

use super::error::InfraError;
use super::preferences::InMemoryPreferenceStore;
use crate::application::ports::{CatalogClient, CatalogError, ClipError, ThemeClipClient};
use crate::domain::media::{MediaItem, MediaListCollection, ThemeClip};
use crate::domain::types::{MediaId, UserContext};

const SOURCE: &str = "infra::snapshot";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogSnapshot {
    pub popular: Vec<MediaItem>,
    /// Details for media outside the pools, or richer copies of pool entries.
    pub media: Vec<MediaItem>,
    pub opening_pool: Vec<MediaItem>,
    pub user_lists: HashMap<i64, MediaListCollection>,
    pub preferences: HashMap<i64, Value>,
    pub clips: Vec<SnapshotClip>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SnapshotClip {
    pub titles: Vec<String>,
    pub clip: ThemeClip,
}

#[derive(Clone)]
pub struct SnapshotCatalog {
    snapshot: Arc<CatalogSnapshot>,
    details: Arc<HashMap<MediaId, MediaItem>>,
    clips_by_title: Arc<HashMap<String, ThemeClip>>,
}

fn title_key(title: &str) -> String {
    title.trim().to_lowercase()
}

impl SnapshotCatalog {
    pub async fn load(path: &Path) -> Result<Self, InfraError> {
        let bytes = tokio::fs::read(path).await?;
        let snapshot: CatalogSnapshot = serde_json::from_slice(&bytes)
            .map_err(|err| InfraError::snapshot(path, err.to_string()))?;
        info!(
            target = SOURCE,
            op = "load",
            path = %path.display(),
            popular = snapshot.popular.len(),
            opening_pool = snapshot.opening_pool.len(),
            clips = snapshot.clips.len(),
            "Loaded catalog snapshot"
        );
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Self {
        // Explicit details win over pool copies of the same media.
        let details = snapshot
            .popular
            .iter()
            .chain(snapshot.opening_pool.iter())
            .chain(snapshot.media.iter())
            .map(|media| (media.id, media.clone()))
            .collect();

        let mut clips_by_title = HashMap::new();
        for entry in &snapshot.clips {
            for title in &entry.titles {
                clips_by_title
                    .entry(title_key(title))
                    .or_insert_with(|| entry.clip.clone());
            }
        }

        Self {
            snapshot: Arc::new(snapshot),
            details: Arc::new(details),
            clips_by_title: Arc::new(clips_by_title),
        }
    }

    pub fn preference_store(&self) -> InMemoryPreferenceStore {
        InMemoryPreferenceStore::new(self.snapshot.preferences.clone())
    }
}

#[async_trait]
impl CatalogClient for SnapshotCatalog {
    async fn fetch_popular_pool(&self) -> Result<Vec<MediaItem>, CatalogError> {
        Ok(self.snapshot.popular.clone())
    }

    async fn fetch_media_details(&self, media_id: MediaId) -> Result<MediaItem, CatalogError> {
        self.details
            .get(&media_id)
            .cloned()
            .ok_or(CatalogError::NotFound { media_id })
    }

    async fn fetch_user_media_lists(
        &self,
        user: &UserContext,
    ) -> Result<MediaListCollection, CatalogError> {
        Ok(self
            .snapshot
            .user_lists
            .get(&user.user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_opening_pool(&self, day: Date) -> Result<Vec<MediaItem>, CatalogError> {
        debug!(
            target = SOURCE,
            op = "fetch_opening_pool",
            day = %day,
            size = self.snapshot.opening_pool.len()
        );
        Ok(self.snapshot.opening_pool.clone())
    }
}

#[async_trait]
impl ThemeClipClient for SnapshotCatalog {
    async fn find_opening_clip(&self, titles: &[String]) -> Result<Option<ThemeClip>, ClipError> {
        Ok(titles
            .iter()
            .find_map(|title| self.clips_by_title.get(&title_key(title)))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use time::macros::date;

    use super::*;

    const SNAPSHOT: &str = r#"{
        "popular": [
            {"id": 1, "title": {"romaji": "Alpha"}},
            {"id": 2, "title": {"romaji": "Beta"}}
        ],
        "media": [
            {"id": 2, "title": {"romaji": "Beta"}, "description": "Full details."},
            {"id": 9, "title": {"romaji": "Hidden"}}
        ],
        "openingPool": [{"id": 3, "title": {"english": "Gamma"}}],
        "userLists": {"42": {"lists": [{"name": "Completed", "entries": [{"mediaId": 1}]}]}},
        "preferences": {"42": {"difficulty": 2}},
        "clips": [{"titles": ["Gamma", "Gamma TV"], "clip": {"audioUrl": "https://clips/g.mp3"}}]
    }"#;

    #[tokio::test]
    async fn loads_snapshot_from_disk() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(SNAPSHOT.as_bytes()).expect("write snapshot");
        let catalog = SnapshotCatalog::load(file.path()).await.expect("load");

        assert_eq!(catalog.fetch_popular_pool().await.expect("pool").len(), 2);
        assert_eq!(
            catalog
                .fetch_opening_pool(date!(2024 - 01 - 05))
                .await
                .expect("opening pool")
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn explicit_details_override_pool_copies() {
        let snapshot: CatalogSnapshot = serde_json::from_str(SNAPSHOT).expect("parse");
        let catalog = SnapshotCatalog::from_snapshot(snapshot);

        let beta = catalog.fetch_media_details(MediaId(2)).await.expect("beta");
        assert_eq!(beta.description.as_deref(), Some("Full details."));
        assert!(catalog.fetch_media_details(MediaId(9)).await.is_ok());
        assert!(matches!(
            catalog.fetch_media_details(MediaId(77)).await,
            Err(CatalogError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn user_lists_default_to_empty() {
        let snapshot: CatalogSnapshot = serde_json::from_str(SNAPSHOT).expect("parse");
        let catalog = SnapshotCatalog::from_snapshot(snapshot);
        let known = UserContext {
            user_id: 42,
            access_token: "t".to_string(),
        };
        let unknown = UserContext {
            user_id: 7,
            access_token: "t".to_string(),
        };
        assert_eq!(
            catalog
                .fetch_user_media_lists(&known)
                .await
                .expect("lists")
                .lists
                .len(),
            1
        );
        assert!(
            catalog
                .fetch_user_media_lists(&unknown)
                .await
                .expect("lists")
                .lists
                .is_empty()
        );
    }

    #[tokio::test]
    async fn clips_match_titles_case_insensitively() {
        let snapshot: CatalogSnapshot = serde_json::from_str(SNAPSHOT).expect("parse");
        let catalog = SnapshotCatalog::from_snapshot(snapshot);
        let found = catalog
            .find_opening_clip(&["Unknown".to_string(), "gamma tv".to_string()])
            .await
            .expect("lookup");
        assert_eq!(
            found.and_then(|clip| clip.audio_url).as_deref(),
            Some("https://clips/g.mp3")
        );
        assert!(
            catalog
                .find_opening_clip(&["Nothing".to_string()])
                .await
                .expect("lookup")
                .is_none()
        );
    }

    #[tokio::test]
    async fn invalid_snapshot_is_reported_with_its_path() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"{not json").expect("write");
        let err = SnapshotCatalog::load(file.path())
            .await
            .err()
            .expect("invalid snapshot");
        assert!(matches!(err, InfraError::Snapshot { .. }));
    }
}
