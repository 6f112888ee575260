//! Cache system.
//!
//! Every expensive or remote call in the crate goes through [`CacheAside`]:
//! catalog snapshots, clip lookups, poster imagery and the assembled daily
//! response itself.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! ttl_puzzle_seconds = 172800
//! ttl_catalog_seconds = 86400
//! ttl_user_lists_seconds = 3600
//! capacity = 2048
//! single_flight = true
//! ```

mod config;
mod keys;
mod lock;
mod remember;
mod store;

pub use config::CacheConfig;
pub use keys::CacheKey;
pub(crate) use lock::mutex_lock;
pub use remember::{CacheAside, InFlightKeys, KeyGuard};
pub use store::{CacheBackend, CacheError, InMemoryCache};
