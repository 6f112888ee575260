//! Catalog snapshots consumed by the puzzle builders.
//!
//! These records mirror the catalog's JSON shape so they can be cached
//! verbatim. They are never mutated after deserialization.

use serde::{Deserialize, Serialize};

use super::types::MediaId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct MediaTitle {
    pub romaji: Option<String>,
    pub english: Option<String>,
    pub native: Option<String>,
    pub user_preferred: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct MediaTag {
    pub name: String,
    pub rank: Option<u32>,
    pub is_general_spoiler: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FuzzyDate {
    pub year: Option<i32>,
    pub month: Option<u8>,
    pub day: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CoverImage {
    pub extra_large: Option<String>,
    pub large: Option<String>,
    pub medium: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ExternalLink {
    pub site: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CharacterName {
    pub full: Option<String>,
    pub native: Option<String>,
    pub user_preferred: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CharacterImage {
    pub large: Option<String>,
    pub medium: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: i64,
    #[serde(default)]
    pub name: CharacterName,
    #[serde(default)]
    pub image: Option<CharacterImage>,
}

impl Character {
    /// Portrait used for every reveal stage; large wins over medium.
    pub fn portrait_url(&self) -> Option<&str> {
        let image = self.image.as_ref()?;
        non_empty(image.large.as_deref()).or_else(|| non_empty(image.medium.as_deref()))
    }

    pub fn display_name(&self) -> &str {
        [
            self.name.full.as_deref(),
            self.name.user_preferred.as_deref(),
            self.name.native.as_deref(),
        ]
        .into_iter()
        .find_map(non_empty)
        .unwrap_or("Unknown")
    }

    /// Accepted answers, trimmed and deduplicated without regard to case.
    pub fn name_variants(&self) -> Vec<String> {
        let mut seen = Vec::<String>::new();
        let mut variants = Vec::new();
        for value in [
            self.name.user_preferred.as_deref(),
            self.name.full.as_deref(),
            self.name.native.as_deref(),
        ]
        .into_iter()
        .flatten()
        {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                continue;
            }
            let key = trimmed.to_lowercase();
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);
            variants.push(trimmed.to_string());
        }
        variants
    }
}

/// A character credited on a media entry together with its role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterEdge {
    #[serde(default)]
    pub role: Option<String>,
    pub character: Character,
}

impl CharacterEdge {
    /// `SUPPORTING` becomes `Supporting`, `BACKGROUND_CAST` becomes `Background Cast`.
    pub fn display_role(&self) -> Option<String> {
        let normalized = self.role.as_deref()?.replace('_', " ");
        let normalized = normalized.trim();
        if normalized.is_empty() {
            return None;
        }
        let titled = normalized
            .split(' ')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first
                        .to_uppercase()
                        .chain(chars.flat_map(char::to_lowercase))
                        .collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        Some(titled)
    }

    pub fn role_is(&self, role: &str) -> bool {
        self.role
            .as_deref()
            .is_some_and(|value| value.eq_ignore_ascii_case(role))
    }
}

/// Immutable snapshot of one catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: MediaId,
    #[serde(default)]
    pub title: MediaTitle,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub tags: Vec<MediaTag>,
    #[serde(default)]
    pub popularity: Option<i64>,
    #[serde(default)]
    pub average_score: Option<i64>,
    #[serde(default)]
    pub episodes: Option<i64>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub season: Option<String>,
    #[serde(default)]
    pub season_year: Option<i32>,
    #[serde(default)]
    pub start_date: Option<FuzzyDate>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cover_image: Option<CoverImage>,
    #[serde(default)]
    pub external_links: Vec<ExternalLink>,
    #[serde(default)]
    pub characters: Vec<CharacterEdge>,
}

impl MediaItem {
    /// Highest-resolution cover available: extra large, then large, then medium.
    pub fn best_image_url(&self) -> Option<&str> {
        let cover = self.cover_image.as_ref()?;
        [
            cover.extra_large.as_deref(),
            cover.large.as_deref(),
            cover.medium.as_deref(),
        ]
        .into_iter()
        .find_map(non_empty)
    }

    /// Every known title, official titles first, then synonyms.
    pub fn title_variants(&self) -> Vec<&str> {
        [
            self.title.english.as_deref(),
            self.title.romaji.as_deref(),
            self.title.native.as_deref(),
            self.title.user_preferred.as_deref(),
        ]
        .into_iter()
        .chain(self.synonyms.iter().map(|synonym| Some(synonym.as_str())))
        .filter_map(non_empty)
        .collect()
    }

    /// The answer shown to players.
    pub fn canonical_title(&self) -> &str {
        [
            self.title.english.as_deref(),
            self.title.romaji.as_deref(),
            self.title.native.as_deref(),
            self.title.user_preferred.as_deref(),
        ]
        .into_iter()
        .find_map(non_empty)
        .unwrap_or("Unknown")
    }

    pub fn release_year(&self) -> Option<i32> {
        self.season_year
            .or_else(|| self.start_date.and_then(|start| start.year))
    }

    /// Highest-ranked non-spoiler tags at or above `min_rank`.
    pub fn top_tags(&self, limit: usize, min_rank: u32) -> Vec<String> {
        let mut ranked: Vec<(u32, &str)> = self
            .tags
            .iter()
            .filter(|tag| !tag.name.is_empty() && !tag.is_general_spoiler)
            .map(|tag| (tag.rank.unwrap_or(0), tag.name.as_str()))
            .filter(|(rank, _)| *rank >= min_rank)
            .collect();
        ranked.sort_by(|left, right| right.0.cmp(&left.0));
        ranked
            .into_iter()
            .take(limit)
            .map(|(_, name)| name.to_string())
            .collect()
    }

    /// `"SPRING 2019"` when both parts are known.
    pub fn season_label(&self) -> Option<String> {
        match (self.season.as_deref(), self.season_year) {
            (Some(season), Some(year)) if !season.is_empty() => Some(format!("{season} {year}")),
            _ => None,
        }
    }
}

/// One of a user's watch lists as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MediaList {
    pub name: Option<String>,
    pub status: Option<String>,
    pub entries: Vec<MediaListEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaListEntry {
    pub media_id: MediaId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MediaListCollection {
    pub lists: Vec<MediaList>,
}

/// Opening theme metadata returned by the theme-clip collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ThemeClip {
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
    pub song_title: Option<String>,
    pub artist: Option<String>,
    pub sequence: Option<u32>,
    pub length_seconds: Option<u32>,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|inner| !inner.is_empty())
}
