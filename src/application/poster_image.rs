//! Degraded poster variants, cached per media and hint bucket.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::catalog::CatalogGateway;
use super::error::PosterImageError;
use super::games::poster::poster_rounds;
use super::imaging::{EncodedImage, RenderJob, RenderPool};
use super::ports::ImageFetcher;
use crate::cache::{CacheAside, CacheKey};
use crate::domain::media::MediaItem;
use crate::domain::poster::{CROP_SCALES, crop_stages, hint_bucket, hint_round};
use crate::domain::types::MediaId;

const SOURCE: &str = "application::poster_image";
const FALLBACK_SOURCE_MIME: &str = "image/jpeg";

pub struct PosterImageService {
    catalog: CatalogGateway,
    fetcher: Arc<dyn ImageFetcher>,
    cache: CacheAside,
    pool: RenderPool,
    ttl: Duration,
}

impl PosterImageService {
    pub fn new(
        catalog: CatalogGateway,
        fetcher: Arc<dyn ImageFetcher>,
        cache: CacheAside,
        pool: RenderPool,
        ttl: Duration,
    ) -> Self {
        Self {
            catalog,
            fetcher,
            cache,
            pool,
            ttl,
        }
    }

    fn total_rounds() -> usize {
        CROP_SCALES.len().max(poster_rounds().len()).max(1)
    }

    /// The poster of `media_id` as shown after `requested_hints` hints.
    ///
    /// Requests are clamped into a bucket first, so every out-of-range hint
    /// count shares the cache entry of the nearest valid one.
    pub async fn poster_image(
        &self,
        media_id: MediaId,
        requested_hints: i64,
    ) -> Result<EncodedImage, PosterImageError> {
        let total_rounds = Self::total_rounds();
        let bucket = hint_bucket(requested_hints, total_rounds);
        let key = CacheKey::PosterVariant { media_id, bucket };

        self.cache
            .remember(&key, self.ttl, move || async move {
                let media = self.catalog.media_details(media_id).await?;
                let stages = crop_stages(&media);
                let round = hint_round(bucket, total_rounds);
                let crop = stages.get(round.min(stages.len()).saturating_sub(1)).copied();

                let source = self.source_image(&media).await?;
                let rendered = self
                    .pool
                    .render(
                        source.bytes,
                        RenderJob {
                            hint_round: round,
                            total_rounds,
                            crop,
                        },
                    )
                    .await?;
                debug!(
                    target = SOURCE,
                    op = "poster_image",
                    media_id = %media_id,
                    bucket,
                    result = "rendered"
                );
                Ok::<_, PosterImageError>(rendered)
            })
            .await
    }

    /// Original cover bytes, fetched once and shared by every bucket.
    async fn source_image(&self, media: &MediaItem) -> Result<EncodedImage, PosterImageError> {
        let media_id = media.id;
        let url = media
            .best_image_url()
            .ok_or(PosterImageError::NotFound { media_id })?;
        let fetcher = &self.fetcher;

        self.cache
            .remember(&CacheKey::PosterSource(media_id), self.ttl, move || async move {
                let started_at = Instant::now();
                let fetched = fetcher.fetch(url).await.inspect_err(|err| {
                    warn!(
                        target = SOURCE,
                        op = "fetch_source",
                        media_id = %media_id,
                        result = "error",
                        error = %err,
                        "Poster source could not be fetched"
                    );
                })?;
                debug!(
                    target = SOURCE,
                    op = "fetch_source",
                    media_id = %media_id,
                    bytes = fetched.bytes.len(),
                    elapsed_ms = started_at.elapsed().as_millis() as u64
                );
                Ok::<_, PosterImageError>(EncodedImage {
                    bytes: fetched.bytes,
                    mime: fetched
                        .content_type
                        .unwrap_or_else(|| FALLBACK_SOURCE_MIME.to_string()),
                })
            })
            .await
    }
}
