//! In-process anti-repeat history.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};

use crate::application::ports::{HistoryError, HistoryStore};
use crate::cache::mutex_lock;
use crate::domain::types::MediaId;

const SOURCE: &str = "infra::history";

#[derive(Debug, Clone, Copy)]
struct SeenEntry {
    media_id: MediaId,
    seen_at: OffsetDateTime,
}

/// Per-user seen media, newest first, at most one entry per media.
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    users: Mutex<HashMap<i64, Vec<SeenEntry>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn cutoff(now: OffsetDateTime, window_days: u32) -> OffsetDateTime {
        now - Duration::days(i64::from(window_days))
    }

    pub(crate) fn list_recent_at(
        &self,
        user_id: i64,
        window_days: u32,
        now: OffsetDateTime,
    ) -> Vec<MediaId> {
        if window_days == 0 {
            return Vec::new();
        }
        let cutoff = Self::cutoff(now, window_days);
        let users = mutex_lock(&self.users, SOURCE, "list_recent");
        users
            .get(&user_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|entry| entry.seen_at >= cutoff)
                    .map(|entry| entry.media_id)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn record_seen_at(
        &self,
        user_id: i64,
        media_id: MediaId,
        window_days: u32,
        now: OffsetDateTime,
    ) -> Vec<MediaId> {
        let mut users = mutex_lock(&self.users, SOURCE, "record_seen");
        if window_days == 0 {
            users.remove(&user_id);
            return Vec::new();
        }

        let cutoff = Self::cutoff(now, window_days);
        let entries = users.entry(user_id).or_default();
        entries.retain(|entry| entry.media_id != media_id && entry.seen_at >= cutoff);
        entries.insert(
            0,
            SeenEntry {
                media_id,
                seen_at: now,
            },
        );
        entries.iter().map(|entry| entry.media_id).collect()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn list_recent(&self, user_id: i64, window_days: u32) -> Result<Vec<MediaId>, HistoryError> {
        Ok(self.list_recent_at(user_id, window_days, OffsetDateTime::now_utc()))
    }

    async fn record_seen(
        &self,
        user_id: i64,
        media_id: MediaId,
        window_days: u32,
    ) -> Result<Vec<MediaId>, HistoryError> {
        Ok(self.record_seen_at(user_id, media_id, window_days, OffsetDateTime::now_utc()))
    }
}
