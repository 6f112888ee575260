//! Identifiers and small value types shared across the puzzle domain.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::Date;

/// Catalog identifier of a media entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MediaId(pub i64);

impl MediaId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for MediaId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Authenticated caller, passed through opaquely to catalog collaborators.
#[derive(Clone, PartialEq, Eq)]
pub struct UserContext {
    pub user_id: i64,
    pub access_token: String,
}

impl fmt::Debug for UserContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserContext")
            .field("user_id", &self.user_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Game slot a selection is drawn for. The rendered form is part of the
/// selection seed, so it must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameKey {
    Anidle,
    PosterZoomed,
    RedactedSynopsis,
    CharacterSilhouette,
    GuessTheOpening { round: usize },
}

impl GameKey {
    /// Short name used in logs and error messages.
    pub fn label(self) -> &'static str {
        match self {
            GameKey::Anidle => "anidle",
            GameKey::PosterZoomed => "poster_zoomed",
            GameKey::RedactedSynopsis => "redacted_synopsis",
            GameKey::CharacterSilhouette => "character_silhouette",
            GameKey::GuessTheOpening { .. } => "guess_the_opening",
        }
    }
}

impl fmt::Display for GameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameKey::GuessTheOpening { round } => write!(f, "guess_the_opening:{round}"),
            other => f.write_str(other.label()),
        }
    }
}

/// `YYYY-MM-DD` rendering of a puzzle day.
pub fn format_day(day: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        day.year(),
        u8::from(day.month()),
        day.day()
    )
}
