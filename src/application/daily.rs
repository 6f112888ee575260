//! Cache-aside front for the daily assembler.

use std::time::{Duration, Instant};

use guesssenpai_api_types::DailyPuzzleResponse;
use metrics::{counter, histogram};
use time::Date;
use tracing::{info, warn};

use super::assembler::{AssemblyRequest, DailyAssembler};
use super::error::AssemblyError;
use crate::cache::{CacheAside, CacheKey};
use crate::domain::types::{MediaId, UserContext};

const SOURCE: &str = "application::daily";

pub(crate) const METRIC_PUZZLE_CACHE_HIT: &str = "guesssenpai_puzzle_cache_hit_total";
pub(crate) const METRIC_PUZZLE_CACHE_MISS: &str = "guesssenpai_puzzle_cache_miss_total";
pub(crate) const METRIC_ASSEMBLY_MS: &str = "guesssenpai_assembly_ms";
pub(crate) const METRIC_ASSEMBLY_FAILURE: &str = "guesssenpai_assembly_failure_total";
pub(crate) const METRIC_HISTORY_RECORD_FAILURE: &str = "guesssenpai_history_record_failure_total";

pub struct DailyPuzzleService {
    assembler: DailyAssembler,
    cache: CacheAside,
    puzzle_ttl: Duration,
    opening_enabled: bool,
}

impl DailyPuzzleService {
    pub fn new(
        assembler: DailyAssembler,
        cache: CacheAside,
        puzzle_ttl: Duration,
        opening_enabled: bool,
    ) -> Self {
        Self {
            assembler,
            cache,
            puzzle_ttl,
            opening_enabled,
        }
    }

    /// The puzzle for `day`, assembled on the first request for each
    /// day/audience/opening combination and served from cache afterwards.
    ///
    /// The opening game is only attempted when both the caller asks for it
    /// and the feature is enabled. Seen media are recorded only after a fresh
    /// assembly, never on a cache hit.
    pub async fn daily_puzzle(
        &self,
        day: Date,
        user: Option<&UserContext>,
        include_opening: bool,
    ) -> Result<DailyPuzzleResponse, AssemblyError> {
        let include_opening = include_opening && self.opening_enabled;
        let key = CacheKey::DailyPuzzle {
            day,
            user_id: user.map(|user| user.user_id),
            include_opening,
        };

        let mut assembled: Option<Vec<MediaId>> = None;
        let started_at = Instant::now();
        let result = {
            let assembled = &mut assembled;
            let assembler = &self.assembler;
            self.cache
                .remember(&key, self.puzzle_ttl, move || async move {
                    let assembly = assembler
                        .assemble(AssemblyRequest {
                            day,
                            user,
                            include_opening,
                        })
                        .await?;
                    *assembled = Some(assembly.media_ids);
                    Ok::<_, AssemblyError>(assembly.response)
                })
                .await
        };

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                counter!(METRIC_ASSEMBLY_FAILURE).increment(1);
                warn!(
                    target = SOURCE,
                    op = "daily_puzzle",
                    key = %key,
                    result = "error",
                    error = %err,
                    "Daily puzzle could not be assembled"
                );
                return Err(err);
            }
        };

        let Some(media_ids) = assembled else {
            counter!(METRIC_PUZZLE_CACHE_HIT).increment(1);
            return Ok(response);
        };

        counter!(METRIC_PUZZLE_CACHE_MISS).increment(1);
        let elapsed = started_at.elapsed();
        histogram!(METRIC_ASSEMBLY_MS).record(elapsed.as_secs_f64() * 1000.0);
        info!(
            target = SOURCE,
            op = "daily_puzzle",
            key = %key,
            result = "assembled",
            elapsed_ms = elapsed.as_millis() as u64
        );

        if let Some(user) = user {
            self.record_seen(user.user_id, &media_ids).await;
        }
        Ok(response)
    }

    /// One history write per distinct media id. Failures are logged and
    /// counted; the response is already final.
    async fn record_seen(&self, user_id: i64, media_ids: &[MediaId]) {
        let history = self.assembler.history();
        for media_id in media_ids {
            if let Err(err) = history.record(user_id, *media_id).await {
                counter!(METRIC_HISTORY_RECORD_FAILURE).increment(1);
                warn!(
                    target = SOURCE,
                    op = "record_seen",
                    user_id,
                    media_id = %media_id,
                    result = "error",
                    error = %err,
                    "Recent media could not be recorded"
                );
            }
        }
    }
}
