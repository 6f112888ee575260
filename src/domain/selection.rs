//! Deterministic media selection and candidate pool construction.
//!
//! Selection is a pure function of the seed string and the pool order, which
//! is what keeps every replica agreeing on today's puzzle without any shared
//! state.

use std::collections::HashSet;

use sha2::{Digest, Sha256};
use time::Date;

use super::error::DomainError;
use super::media::{MediaItem, MediaListCollection};
use super::types::{GameKey, MediaId, format_day};

const COMPLETED_STATUSES: [&str; 2] = ["COMPLETED", "REPEATING"];
const WATCHING_STATUSES: [&str; 3] = ["CURRENT", "REPEATING", "WATCHING"];

/// Pick one element by hashing `seed`.
///
/// The first four digest bytes, read big-endian, are reduced modulo the pool
/// length. Returns `None` only for an empty pool.
pub fn select<'a, T>(seed: &str, pool: &'a [T]) -> Option<&'a T> {
    if pool.is_empty() {
        return None;
    }
    let digest = Sha256::digest(seed.as_bytes());
    let prefix = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    let index = (prefix as usize) % pool.len();
    pool.get(index)
}

/// `{day}[:{user}]` prefix shared by every draw of one assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSeed {
    base: String,
}

impl SelectionSeed {
    pub fn new(day: Date, user_id: Option<i64>) -> Self {
        let day = format_day(day);
        let base = match user_id {
            Some(user_id) => format!("{day}:{user_id}"),
            None => day,
        };
        Self { base }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Full seed for one draw: `{base}:{game}:{attempt}`.
    pub fn for_draw(&self, game: GameKey, attempt: usize) -> String {
        format!("{}:{game}:{attempt}", self.base)
    }
}

/// Media ids a user has finished or is currently watching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchClassification {
    pub completed: HashSet<MediaId>,
    pub watching: HashSet<MediaId>,
}

impl WatchClassification {
    /// Lists are classified by their status, or by their name when the
    /// catalog omits the status. `REPEATING` counts as both.
    pub fn from_lists(lists: &MediaListCollection) -> Self {
        let mut classification = Self::default();
        for list in &lists.lists {
            let status = list
                .status
                .as_deref()
                .or(list.name.as_deref())
                .unwrap_or_default()
                .to_uppercase();
            let completed = COMPLETED_STATUSES.contains(&status.as_str());
            let watching = WATCHING_STATUSES.contains(&status.as_str());
            for entry in &list.entries {
                if completed {
                    classification.completed.insert(entry.media_id);
                }
                if watching {
                    classification.watching.insert(entry.media_id);
                }
            }
        }
        classification
    }
}

/// Narrow the popularity pool to what this user has not seen, relaxing one
/// filter at a time until something survives.
///
/// The fallback chain is: skip watching, completed and recent; then skip
/// completed and recent; then skip recent only; then the whole pool.
pub fn build_candidate_pool<'a>(
    popular: &'a [MediaItem],
    watch: Option<&WatchClassification>,
    recent: &HashSet<MediaId>,
) -> Vec<&'a MediaItem> {
    let not_recent = |media: &&MediaItem| !recent.contains(&media.id);

    if let Some(watch) = watch {
        let novelty: Vec<&MediaItem> = popular
            .iter()
            .filter(not_recent)
            .filter(|media| {
                !watch.completed.contains(&media.id) && !watch.watching.contains(&media.id)
            })
            .collect();
        if !novelty.is_empty() {
            return novelty;
        }

        let unfinished: Vec<&MediaItem> = popular
            .iter()
            .filter(not_recent)
            .filter(|media| !watch.completed.contains(&media.id))
            .collect();
        if !unfinished.is_empty() {
            return unfinished;
        }
    }

    let fresh: Vec<&MediaItem> = popular.iter().filter(not_recent).collect();
    if !fresh.is_empty() {
        return fresh;
    }
    popular.iter().collect()
}

/// One selection request against a candidate pool.
#[derive(Debug, Clone, Copy)]
pub struct Draw<'s> {
    pub game: GameKey,
    pub attempt: usize,
    /// Media already chosen for other games today.
    pub excluded: &'s HashSet<MediaId>,
    /// Media already tried and rejected for this game.
    pub attempted: &'s HashSet<MediaId>,
}

/// Deterministically choose a candidate for `draw`.
///
/// Exclusions relax in order when they would empty the pool: first both sets
/// apply, then only `attempted`, then only `excluded`, then nothing.
pub fn choose_from_pool<'a>(
    seed: &SelectionSeed,
    pool: &[&'a MediaItem],
    draw: Draw<'_>,
) -> Result<&'a MediaItem, DomainError> {
    if pool.is_empty() {
        return Err(DomainError::empty_pool(draw.game.to_string()));
    }

    let keep = |predicate: &dyn Fn(&MediaItem) -> bool| -> Vec<&'a MediaItem> {
        pool.iter().copied().filter(|media| predicate(media)).collect()
    };

    let mut filtered = keep(&|media| {
        !draw.excluded.contains(&media.id) && !draw.attempted.contains(&media.id)
    });
    if filtered.is_empty() && !draw.attempted.is_empty() {
        filtered = keep(&|media| !draw.attempted.contains(&media.id));
    }
    if filtered.is_empty() {
        filtered = keep(&|media| !draw.excluded.contains(&media.id));
    }
    if filtered.is_empty() {
        filtered = pool.to_vec();
    }

    let seed = seed.for_draw(draw.game, draw.attempt);
    select(&seed, &filtered)
        .copied()
        .ok_or_else(|| DomainError::empty_pool(draw.game.to_string()))
}
