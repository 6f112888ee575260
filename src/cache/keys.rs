//! Cache key definitions.
//!
//! Every cached value is addressed by a [`CacheKey`]; its `Display` form is
//! the string stored in the backend and must stay stable across releases.

use std::fmt;

use time::Date;

use crate::domain::types::{MediaId, format_day};

const PUZZLE_PREFIX: &str = "guesssenpai:puzzle";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    // Assembled output
    /// Daily response per day, audience and opening flag.
    DailyPuzzle {
        day: Date,
        user_id: Option<i64>,
        include_opening: bool,
    },

    // Catalog snapshots
    PopularPool(Date),
    OpeningPool(Date),
    MediaDetails(MediaId),
    UserLists(i64),
    OpeningClip(MediaId),

    // Per-user state mirrored from the history store
    UserHistory(i64),

    // Poster imagery
    PosterSource(MediaId),
    PosterVariant { media_id: MediaId, bucket: usize },
}

impl CacheKey {
    /// Leading `family:kind` segment, used as a bounded metrics label.
    pub fn namespace(&self) -> &'static str {
        match self {
            CacheKey::DailyPuzzle { .. } => PUZZLE_PREFIX,
            CacheKey::PopularPool(_) => "anilist:popular",
            CacheKey::OpeningPool(_) => "anilist:opening-pool",
            CacheKey::MediaDetails(_) => "anilist:media",
            CacheKey::UserLists(_) => "anilist:user-lists",
            CacheKey::OpeningClip(_) => "animethemes:clip",
            CacheKey::UserHistory(_) => "guesssenpai:user-history",
            CacheKey::PosterSource(_) => "poster-image-source",
            CacheKey::PosterVariant { .. } => "poster-image",
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let namespace = self.namespace();
        match self {
            CacheKey::DailyPuzzle {
                day,
                user_id,
                include_opening,
            } => {
                let day = format_day(*day);
                let opening = u8::from(*include_opening);
                match user_id {
                    Some(user_id) => write!(f, "{namespace}:{day}:user:{user_id}:oped:{opening}"),
                    None => write!(f, "{namespace}:{day}:anon:oped:{opening}"),
                }
            }
            CacheKey::PopularPool(day) | CacheKey::OpeningPool(day) => {
                write!(f, "{namespace}:{}", format_day(*day))
            }
            CacheKey::MediaDetails(id) | CacheKey::OpeningClip(id) | CacheKey::PosterSource(id) => {
                write!(f, "{namespace}:{id}")
            }
            CacheKey::UserLists(user_id) | CacheKey::UserHistory(user_id) => {
                write!(f, "{namespace}:{user_id}")
            }
            CacheKey::PosterVariant { media_id, bucket } => {
                write!(f, "{namespace}:{media_id}:{bucket}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    #[test]
    fn puzzle_keys_separate_audiences_and_flags() {
        let day = date!(2024 - 01 - 05);
        assert_eq!(
            CacheKey::DailyPuzzle {
                day,
                user_id: None,
                include_opening: false
            }
            .to_string(),
            "guesssenpai:puzzle:2024-01-05:anon:oped:0"
        );
        assert_eq!(
            CacheKey::DailyPuzzle {
                day,
                user_id: Some(12),
                include_opening: true
            }
            .to_string(),
            "guesssenpai:puzzle:2024-01-05:user:12:oped:1"
        );
    }

    #[test]
    fn catalog_and_image_keys() {
        let day = date!(2024 - 01 - 05);
        assert_eq!(CacheKey::PopularPool(day).to_string(), "anilist:popular:2024-01-05");
        assert_eq!(CacheKey::MediaDetails(MediaId(7)).to_string(), "anilist:media:7");
        assert_eq!(CacheKey::UserLists(3).to_string(), "anilist:user-lists:3");
        assert_eq!(CacheKey::OpeningClip(MediaId(7)).to_string(), "animethemes:clip:7");
        assert_eq!(
            CacheKey::UserHistory(3).to_string(),
            "guesssenpai:user-history:3"
        );
        assert_eq!(
            CacheKey::PosterSource(MediaId(7)).to_string(),
            "poster-image-source:7"
        );
        assert_eq!(
            CacheKey::PosterVariant {
                media_id: MediaId(7),
                bucket: 2
            }
            .to_string(),
            "poster-image:7:2"
        );
    }
}
