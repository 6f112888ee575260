//! Collaborator traits the engine consumes but does not implement.
//!
//! Catalog, theme-clip, history, preference and image adapters live in
//! `infra`; tests substitute in-memory fakes.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use time::Date;

use crate::domain::media::{MediaItem, MediaListCollection, ThemeClip};
use crate::domain::preferences::StoredPreferences;
use crate::domain::types::{MediaId, UserContext};

#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("media {media_id} not found in catalog")]
    NotFound { media_id: MediaId },
    #[error("catalog request failed: {0}")]
    Upstream(String),
    #[error("catalog response could not be decoded: {0}")]
    Decode(String),
}

impl CatalogError {
    pub fn upstream(err: impl std::fmt::Display) -> Self {
        Self::Upstream(err.to_string())
    }
}

#[derive(Debug, Clone, Error)]
#[error("theme clip lookup failed: {0}")]
pub struct ClipError(pub String);

#[derive(Debug, Clone, Error)]
pub enum HistoryError {
    #[error("history store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Error)]
pub enum PreferenceError {
    #[error("preference store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Error)]
pub enum ImageFetchError {
    #[error("invalid image url `{url}`")]
    InvalidUrl { url: String },
    #[error("image request failed: {0}")]
    Request(String),
    #[error("image request returned status {status}")]
    Status { status: u16 },
}

#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Popularity-ranked candidates, most popular first.
    async fn fetch_popular_pool(&self) -> Result<Vec<MediaItem>, CatalogError>;

    async fn fetch_media_details(&self, media_id: MediaId) -> Result<MediaItem, CatalogError>;

    async fn fetch_user_media_lists(
        &self,
        user: &UserContext,
    ) -> Result<MediaListCollection, CatalogError>;

    /// Wider pool for the opening game (top rated, top popular and the
    /// current season). An empty pool means the main pool is used instead.
    async fn fetch_opening_pool(&self, day: Date) -> Result<Vec<MediaItem>, CatalogError>;
}

#[async_trait]
pub trait ThemeClipClient: Send + Sync {
    async fn find_opening_clip(&self, titles: &[String]) -> Result<Option<ThemeClip>, ClipError>;
}

/// Anti-repeat history, most recent first.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn list_recent(&self, user_id: i64, window_days: u32) -> Result<Vec<MediaId>, HistoryError>;

    /// Record `media_id` as seen now, prune entries older than the window and
    /// return what remains. A zero window clears the user's history.
    async fn record_seen(
        &self,
        user_id: i64,
        media_id: MediaId,
        window_days: u32,
    ) -> Result<Vec<MediaId>, HistoryError>;
}

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn load_preferences(
        &self,
        user_id: i64,
    ) -> Result<Option<StoredPreferences>, PreferenceError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, ImageFetchError>;
}
