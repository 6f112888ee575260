//! Recent-media history with a cache mirror in front of the store.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::ports::{HistoryError, HistoryStore};
use crate::cache::{CacheAside, CacheKey};
use crate::domain::types::MediaId;

const SOURCE: &str = "application::history";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct HistoryMirror {
    ids: Vec<MediaId>,
}

#[derive(Clone)]
pub struct RecentHistory {
    store: Arc<dyn HistoryStore>,
    cache: CacheAside,
    window_days: u32,
    mirror_ttl: Duration,
}

impl RecentHistory {
    pub fn new(
        store: Arc<dyn HistoryStore>,
        cache: CacheAside,
        window_days: u32,
        mirror_ttl: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            window_days,
            mirror_ttl,
        }
    }

    pub fn window_days(&self) -> u32 {
        self.window_days
    }

    /// Media the user saw inside the window. A zero window never consults the
    /// store.
    pub async fn recent(&self, user_id: i64) -> Result<HashSet<MediaId>, HistoryError> {
        let key = CacheKey::UserHistory(user_id);
        if let Some(mirror) = self.cache.get_json::<HistoryMirror>(&key).await {
            return Ok(mirror.ids.into_iter().collect());
        }

        let ids = if self.window_days == 0 {
            Vec::new()
        } else {
            self.store.list_recent(user_id, self.window_days).await?
        };
        self.write_mirror(&key, ids.clone()).await;
        Ok(ids.into_iter().collect())
    }

    pub async fn record(&self, user_id: i64, media_id: MediaId) -> Result<(), HistoryError> {
        let ids = self
            .store
            .record_seen(user_id, media_id, self.window_days)
            .await?;
        self.write_mirror(&CacheKey::UserHistory(user_id), ids).await;
        Ok(())
    }

    async fn write_mirror(&self, key: &CacheKey, ids: Vec<MediaId>) {
        if let Err(err) = self
            .cache
            .set_json(key, &HistoryMirror { ids }, self.mirror_ttl)
            .await
        {
            warn!(
                target = SOURCE,
                op = "write_mirror",
                key = %key,
                result = "error",
                error = %err,
                "History mirror could not be cached"
            );
        }
    }
}
