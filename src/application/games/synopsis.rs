use guesssenpai_api_types::{RedactedSynopsisGame, RedactedSynopsisSegment, RoundSpec};

use super::BuildOutcome;
use crate::domain::media::MediaItem;
use crate::domain::redaction::{RedactionConfig, redact};

pub fn synopsis_rounds() -> Vec<RoundSpec> {
    vec![
        RoundSpec::new(1, &["unmask:1"]),
        RoundSpec::new(2, &["unmask:3"]),
        RoundSpec::new(3, &["unmask:6"]),
    ]
}

/// Redacted-synopsis game. Media without a single word of description is
/// rejected so another candidate can be drawn.
pub fn build_synopsis(
    media: &MediaItem,
    redaction: &RedactionConfig,
) -> BuildOutcome<RedactedSynopsisGame> {
    let game = synopsis_game(media, redaction);
    if !game.segments.iter().any(|segment| segment.masked) {
        return BuildOutcome::Rejected {
            reason: "description has no words",
        };
    }
    BuildOutcome::Built(game)
}

/// Build the game even from an empty description.
pub fn synopsis_game(media: &MediaItem, redaction: &RedactionConfig) -> RedactedSynopsisGame {
    let titles = media.title_variants();
    let redacted = redact(media.description.as_deref(), media.id, &titles, redaction);

    RedactedSynopsisGame {
        spec: synopsis_rounds(),
        answer: media.canonical_title().to_string(),
        text: redacted.clean_text,
        segments: redacted
            .segments
            .into_iter()
            .map(|segment| RedactedSynopsisSegment {
                text: segment.text,
                masked: segment.masked,
            })
            .collect(),
        masked_word_indices: redacted.masked_word_indices,
        masked_words: redacted.masked_words,
    }
}
