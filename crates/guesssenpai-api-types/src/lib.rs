//! Response payloads shared between the puzzle engine and its HTTP host.
//!
//! Every type here is a plain serde value. Field names are camelCase on the
//! wire so web clients can consume them without a mapping layer.

use serde::{Deserialize, Serialize};
use time::Date;

time::serde::format_description!(iso_day, Date, "[year]-[month]-[day]");

/// Difficulty ladder entry attached to every game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSpec {
    pub difficulty: u8,
    pub hints: Vec<String>,
}

impl RoundSpec {
    pub fn new(difficulty: u8, hints: &[&str]) -> Self {
        Self {
            difficulty,
            hints: hints.iter().map(|hint| (*hint).to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynopsisHint {
    pub ratio: f64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnidleHints {
    pub genres: Vec<String>,
    pub tags: Vec<String>,
    pub year: Option<i32>,
    pub episodes: Option<i64>,
    pub duration: Option<i64>,
    pub popularity: Option<i64>,
    pub average_score: Option<i64>,
    pub synopsis: Vec<SynopsisHint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnidleGame {
    pub spec: Vec<RoundSpec>,
    pub answer: String,
    pub hints: AnidleHints,
}

/// Zoom window for one poster round, offsets in percent of the image size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PosterCropStage {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PosterZoomMeta {
    pub genres: Vec<String>,
    pub year: Option<i32>,
    pub format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PosterZoomGame {
    pub spec: Vec<RoundSpec>,
    pub answer: String,
    pub image: Option<String>,
    pub meta: PosterZoomMeta,
    pub crop_stages: Vec<PosterCropStage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactedSynopsisSegment {
    pub text: String,
    pub masked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedactedSynopsisGame {
    pub spec: Vec<RoundSpec>,
    pub answer: String,
    pub text: String,
    pub segments: Vec<RedactedSynopsisSegment>,
    pub masked_word_indices: Vec<usize>,
    pub masked_words: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSilhouetteCharacter {
    pub id: i64,
    pub name: String,
    pub image: String,
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterGuessReveal {
    pub label: String,
    pub filter: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterGuessEntry {
    pub character: CharacterSilhouetteCharacter,
    pub character_answer: String,
    pub character_aliases: Vec<String>,
    pub anime_answer: String,
    pub anime_aliases: Vec<String>,
    pub reveal: CharacterGuessReveal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterGuessRound {
    pub order: u8,
    pub difficulty: u8,
    pub entries: Vec<CharacterGuessEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSilhouetteRound {
    pub difficulty: u8,
    pub label: String,
    pub filter: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSilhouetteGame {
    pub spec: Vec<CharacterSilhouetteRound>,
    pub answer: String,
    pub character: CharacterSilhouetteCharacter,
    pub rounds: Vec<CharacterGuessRound>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct OpeningClip {
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
    pub mime_type: Option<String>,
    pub length_seconds: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GuessOpeningMeta {
    pub song_title: Option<String>,
    pub artist: Option<String>,
    pub sequence: Option<u32>,
    pub season: Option<String>,
    pub round_order: Option<u8>,
    pub round_total: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuessOpeningRound {
    pub order: u8,
    pub media_id: i64,
    pub spec: Vec<RoundSpec>,
    pub answer: String,
    pub clip: OpeningClip,
    pub meta: GuessOpeningMeta,
    pub solution: SolutionPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuessOpeningGame {
    pub rounds: Vec<GuessOpeningRound>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SolutionTitles {
    pub romaji: Option<String>,
    pub english: Option<String>,
    pub native: Option<String>,
    pub user_preferred: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolutionStreamingLink {
    pub site: String,
    pub url: String,
}

/// Canonical answer card revealed once a game is finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionPayload {
    pub titles: SolutionTitles,
    pub cover_image: Option<String>,
    pub synopsis: Option<String>,
    pub ani_list_url: String,
    pub streaming_links: Vec<SolutionStreamingLink>,
}

/// One game's puzzle together with the media it was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PuzzleBundle<T> {
    pub media_id: i64,
    pub puzzle: T,
    pub solution: SolutionPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GamesPayload {
    pub anidle: PuzzleBundle<AnidleGame>,
    pub poster_zoomed: PuzzleBundle<PosterZoomGame>,
    pub redacted_synopsis: PuzzleBundle<RedactedSynopsisGame>,
    pub character_silhouette: PuzzleBundle<CharacterSilhouetteGame>,
    pub guess_the_opening: Option<PuzzleBundle<GuessOpeningGame>>,
    pub difficulty_level: Option<u8>,
}

/// The complete puzzle set for one day and one audience.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPuzzleResponse {
    #[serde(with = "iso_day")]
    pub date: Date,
    pub games: GamesPayload,
    pub guess_the_opening_enabled: bool,
}

impl DailyPuzzleResponse {
    /// Media ids of every populated slot, in game order.
    pub fn media_ids(&self) -> Vec<i64> {
        let mut ids = vec![
            self.games.anidle.media_id,
            self.games.poster_zoomed.media_id,
            self.games.redacted_synopsis.media_id,
            self.games.character_silhouette.media_id,
        ];
        if let Some(opening) = self.games.guess_the_opening.as_ref() {
            ids.extend(opening.puzzle.rounds.iter().map(|round| round.media_id));
        }
        ids
    }
}
