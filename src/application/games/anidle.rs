use guesssenpai_api_types::{AnidleGame, AnidleHints, RoundSpec, SynopsisHint};

use crate::domain::media::MediaItem;
use crate::domain::redaction::{RedactionConfig, generate_levels, redact};

const TOP_TAG_LIMIT: usize = 5;
const TOP_TAG_MIN_RANK: u32 = 70;

pub fn anidle_rounds() -> Vec<RoundSpec> {
    vec![
        RoundSpec::new(1, &["synopsis:0"]),
        RoundSpec::new(2, &["synopsis:1"]),
        RoundSpec::new(3, &["synopsis:2"]),
    ]
}

/// Metadata-hint game: catalog facts plus a progressively revealed synopsis.
pub fn build_anidle(media: &MediaItem, redaction: &RedactionConfig) -> AnidleGame {
    let titles = media.title_variants();
    let redacted = redact(media.description.as_deref(), media.id, &titles, redaction);
    let synopsis = generate_levels(
        &redacted.segments,
        &redacted.masked_word_indices,
        redaction.reveal_levels(),
    )
    .into_iter()
    .map(|level| SynopsisHint {
        ratio: level.ratio,
        text: level.text,
    })
    .collect();

    AnidleGame {
        spec: anidle_rounds(),
        answer: media.canonical_title().to_string(),
        hints: AnidleHints {
            genres: media
                .genres
                .iter()
                .filter(|genre| !genre.is_empty())
                .cloned()
                .collect(),
            tags: media.top_tags(TOP_TAG_LIMIT, TOP_TAG_MIN_RANK),
            year: media.release_year(),
            episodes: media.episodes,
            duration: media.duration,
            popularity: media.popularity,
            average_score: media.average_score,
            synopsis,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::media::{FuzzyDate, MediaTag, MediaTitle};
    use crate::domain::redaction::REDACTED_PLACEHOLDER;
    use crate::domain::types::MediaId;

    #[test]
    fn hints_carry_catalog_facts_and_a_hidden_title() {
        let media = MediaItem {
            id: MediaId(101),
            title: MediaTitle {
                english: Some("Alpha".to_string()),
                ..MediaTitle::default()
            },
            synonyms: Vec::new(),
            genres: vec!["Drama".to_string(), String::new()],
            tags: vec![
                MediaTag {
                    name: "Time Skip".to_string(),
                    rank: Some(90),
                    is_general_spoiler: false,
                },
                MediaTag {
                    name: "Minor".to_string(),
                    rank: Some(40),
                    is_general_spoiler: false,
                },
            ],
            popularity: Some(1_000),
            average_score: Some(81),
            episodes: Some(12),
            duration: Some(24),
            season: None,
            season_year: None,
            start_date: Some(FuzzyDate {
                year: Some(2016),
                month: None,
                day: None,
            }),
            format: Some("TV".to_string()),
            description: Some(
                "Alpha is a story about a pilot who learns to fly over the northern sea.".to_string(),
            ),
            cover_image: None,
            external_links: Vec::new(),
            characters: Vec::new(),
        };

        let game = build_anidle(&media, &RedactionConfig::default());
        assert_eq!(game.answer, "Alpha");
        assert_eq!(game.spec.len(), 3);
        assert_eq!(game.hints.genres, vec!["Drama".to_string()]);
        assert_eq!(game.hints.tags, vec!["Time Skip".to_string()]);
        assert_eq!(game.hints.year, Some(2016));

        let first = &game.hints.synopsis[0];
        assert!(first.text.starts_with(REDACTED_PLACEHOLDER));
        let last = game.hints.synopsis.last().expect("levels");
        assert_eq!(last.ratio, 1.0);
        assert!(last.text.starts_with("Alpha"));
    }
}
