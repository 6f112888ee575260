//! Cached access to the catalog and theme-clip collaborators.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use time::Date;
use tracing::{debug, warn};

use super::ports::{CatalogClient, CatalogError, ClipError, ThemeClipClient};
use crate::cache::{CacheAside, CacheConfig, CacheKey};
use crate::domain::media::{MediaItem, MediaListCollection, ThemeClip};
use crate::domain::types::{MediaId, UserContext};

const SOURCE: &str = "application::catalog";

/// Clip lookups are cached whether or not a clip exists, so a title without
/// an opening is not looked up again until the entry expires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum ClipLookup {
    Found { clip: ThemeClip },
    Missing,
}

#[derive(Clone)]
pub struct CatalogGateway {
    catalog: Arc<dyn CatalogClient>,
    clips: Arc<dyn ThemeClipClient>,
    cache: CacheAside,
    ttls: CacheConfig,
}

impl CatalogGateway {
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        clips: Arc<dyn ThemeClipClient>,
        cache: CacheAside,
        ttls: CacheConfig,
    ) -> Self {
        Self {
            catalog,
            clips,
            cache,
            ttls,
        }
    }

    pub async fn popular_pool(&self, day: Date) -> Result<Vec<MediaItem>, CatalogError> {
        let catalog = &self.catalog;
        self.cache
            .remember(&CacheKey::PopularPool(day), self.ttls.catalog_ttl, move || async move {
                let started_at = Instant::now();
                let pool = catalog.fetch_popular_pool().await?;
                debug!(
                    target = SOURCE,
                    op = "fetch_popular_pool",
                    result = "ok",
                    size = pool.len(),
                    elapsed_ms = started_at.elapsed().as_millis() as u64
                );
                Ok::<_, CatalogError>(pool)
            })
            .await
    }

    pub async fn opening_pool(&self, day: Date) -> Result<Vec<MediaItem>, CatalogError> {
        let catalog = &self.catalog;
        self.cache
            .remember(&CacheKey::OpeningPool(day), self.ttls.catalog_ttl, move || async move {
                let started_at = Instant::now();
                let pool = catalog.fetch_opening_pool(day).await?;
                debug!(
                    target = SOURCE,
                    op = "fetch_opening_pool",
                    result = "ok",
                    size = pool.len(),
                    elapsed_ms = started_at.elapsed().as_millis() as u64
                );
                Ok::<_, CatalogError>(pool)
            })
            .await
    }

    pub async fn media_details(&self, media_id: MediaId) -> Result<MediaItem, CatalogError> {
        let catalog = &self.catalog;
        self.cache
            .remember(&CacheKey::MediaDetails(media_id), self.ttls.catalog_ttl, move || async move {
                let started_at = Instant::now();
                let media = catalog.fetch_media_details(media_id).await?;
                debug!(
                    target = SOURCE,
                    op = "fetch_media_details",
                    media_id = %media_id,
                    result = "ok",
                    elapsed_ms = started_at.elapsed().as_millis() as u64
                );
                Ok::<_, CatalogError>(media)
            })
            .await
    }

    pub async fn user_lists(&self, user: &UserContext) -> Result<MediaListCollection, CatalogError> {
        let catalog = &self.catalog;
        self.cache
            .remember(
                &CacheKey::UserLists(user.user_id),
                self.ttls.user_lists_ttl,
                move || catalog.fetch_user_media_lists(user),
            )
            .await
    }

    /// Opening clip for `media`, or `None` when the theme catalog has none.
    pub async fn opening_clip(&self, media: &MediaItem) -> Result<Option<ThemeClip>, ClipError> {
        let clips = &self.clips;
        let lookup = self
            .cache
            .remember(&CacheKey::OpeningClip(media.id), self.ttls.catalog_ttl, move || async move {
                let titles: Vec<String> = media
                    .title_variants()
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                let started_at = Instant::now();
                let found = clips.find_opening_clip(&titles).await;
                let elapsed_ms = started_at.elapsed().as_millis() as u64;
                match &found {
                    Ok(clip) => {
                        let result = if clip.is_some() { "found" } else { "missing" };
                        debug!(
                            target = SOURCE,
                            op = "find_opening_clip",
                            media_id = %media.id,
                            result,
                            elapsed_ms
                        );
                    }
                    Err(err) => warn!(
                        target = SOURCE,
                        op = "find_opening_clip",
                        media_id = %media.id,
                        result = "error",
                        elapsed_ms,
                        error = %err,
                        "Theme clip lookup failed"
                    ),
                }
                Ok::<_, ClipError>(match found? {
                    Some(clip) => ClipLookup::Found { clip },
                    None => ClipLookup::Missing,
                })
            })
            .await?;

        Ok(match lookup {
            ClipLookup::Found { clip } => Some(clip),
            ClipLookup::Missing => None,
        })
    }
}
