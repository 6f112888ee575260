use guesssenpai_api_types::{GuessOpeningMeta, GuessOpeningRound, OpeningClip, RoundSpec};

use super::solution::build_solution;
use crate::domain::media::{MediaItem, ThemeClip};

const DEFAULT_CLIP_SECONDS: u32 = 90;

pub fn opening_rounds() -> Vec<RoundSpec> {
    vec![
        RoundSpec::new(1, &["length", "season"]),
        RoundSpec::new(2, &["artist"]),
        RoundSpec::new(3, &["song", "sequence"]),
    ]
}

fn mime_type(audio_url: Option<&str>) -> Option<String> {
    audio_url
        .filter(|url| url.ends_with(".mp3"))
        .map(|_| "audio/mpeg".to_string())
}

/// One round of the opening game, backed by `media`'s opening clip.
pub fn build_opening_round(
    media: &MediaItem,
    clip: &ThemeClip,
    order: u8,
    total_rounds: u8,
) -> GuessOpeningRound {
    let audio_url = clip.audio_url.as_deref().filter(|url| !url.is_empty());
    GuessOpeningRound {
        order,
        media_id: media.id.get(),
        spec: opening_rounds(),
        answer: media.canonical_title().to_string(),
        clip: OpeningClip {
            audio_url: audio_url.or(clip.video_url.as_deref()).map(str::to_string),
            video_url: clip.video_url.clone(),
            mime_type: mime_type(audio_url),
            length_seconds: Some(
                clip.length_seconds
                    .filter(|seconds| *seconds > 0)
                    .unwrap_or(DEFAULT_CLIP_SECONDS),
            ),
        },
        meta: GuessOpeningMeta {
            song_title: clip.song_title.clone(),
            artist: clip.artist.clone(),
            sequence: clip.sequence,
            season: media.season_label(),
            round_order: Some(order),
            round_total: Some(total_rounds),
        },
        solution: build_solution(media),
    }
}
