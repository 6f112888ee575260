//! Cache configuration.
//!
//! TTLs and capacity for the in-process backend, derived from the `[cache]`
//! settings section.

use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_PUZZLE_TTL_SECONDS: u64 = 172_800;
const DEFAULT_CATALOG_TTL_SECONDS: u64 = 86_400;
const DEFAULT_USER_LISTS_TTL_SECONDS: u64 = 3_600;
const DEFAULT_CAPACITY: usize = 2_048;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Lifetime of an assembled daily response and of poster imagery.
    pub puzzle_ttl: Duration,
    /// Lifetime of catalog snapshots and clip lookups.
    pub catalog_ttl: Duration,
    /// Lifetime of a user's watch lists and history mirror.
    pub user_lists_ttl: Duration,
    /// Maximum entries held by the in-process backend.
    pub capacity: usize,
    /// Coalesce concurrent misses for the same key into one producer call.
    pub single_flight: bool,
}

impl CacheConfig {
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            puzzle_ttl: Duration::from_secs(DEFAULT_PUZZLE_TTL_SECONDS),
            catalog_ttl: Duration::from_secs(DEFAULT_CATALOG_TTL_SECONDS),
            user_lists_ttl: Duration::from_secs(DEFAULT_USER_LISTS_TTL_SECONDS),
            capacity: DEFAULT_CAPACITY,
            single_flight: true,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            puzzle_ttl: Duration::from_secs(settings.puzzle_ttl_seconds.get()),
            catalog_ttl: Duration::from_secs(settings.catalog_ttl_seconds.get()),
            user_lists_ttl: Duration::from_secs(settings.user_lists_ttl_seconds.get()),
            capacity: settings.capacity.get(),
            single_flight: settings.single_flight,
        }
    }
}
