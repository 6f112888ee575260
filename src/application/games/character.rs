use guesssenpai_api_types::{
    CharacterGuessEntry, CharacterGuessReveal, CharacterGuessRound, CharacterSilhouetteCharacter,
    CharacterSilhouetteGame, CharacterSilhouetteRound,
};

use super::BuildOutcome;
use crate::domain::characters::{AllocatorConfig, allocate_rounds};
use crate::domain::media::{CharacterEdge, MediaItem};

/// Reveal style for one round, heaviest obfuscation first.
struct RevealStage {
    order: u8,
    difficulty: u8,
    label: &'static str,
    filter: &'static str,
    description: &'static str,
}

const REVEAL_STAGES: [RevealStage; 3] = [
    RevealStage {
        order: 1,
        difficulty: 1,
        label: "Silhouette",
        filter: "brightness(0) saturate(0) contrast(180%) blur(12px)",
        description: "Shadow outline only",
    },
    RevealStage {
        order: 2,
        difficulty: 2,
        label: "Spotlight",
        filter: "brightness(0.45) saturate(120%) blur(6px)",
        description: "Soft lighting begins to reveal features",
    },
    RevealStage {
        order: 3,
        difficulty: 3,
        label: "Full reveal",
        filter: "none",
        description: "Complete character artwork",
    },
];

impl RevealStage {
    fn reveal(&self) -> CharacterGuessReveal {
        CharacterGuessReveal {
            label: self.label.to_string(),
            filter: self.filter.to_string(),
            description: Some(self.description.to_string()),
        }
    }

    fn spec(&self) -> CharacterSilhouetteRound {
        CharacterSilhouetteRound {
            difficulty: self.difficulty,
            label: self.label.to_string(),
            filter: self.filter.to_string(),
            description: Some(self.description.to_string()),
        }
    }
}

fn character_payload(edge: &CharacterEdge, portrait: &str) -> CharacterSilhouetteCharacter {
    CharacterSilhouetteCharacter {
        id: edge.character.id,
        name: edge.character.display_name().to_string(),
        image: portrait.to_string(),
        role: edge.display_role(),
    }
}

/// Character-silhouette game: one round per reveal stage, each with its own
/// set of characters.
pub fn build_character_game(
    media: &MediaItem,
    allocator: &AllocatorConfig,
) -> BuildOutcome<CharacterSilhouetteGame> {
    let difficulties: Vec<u8> = REVEAL_STAGES.iter().map(|stage| stage.difficulty).collect();
    let Some(allocated) = allocate_rounds(media, &difficulties, allocator) else {
        return BuildOutcome::Rejected {
            reason: "not enough characters with portraits",
        };
    };

    let answer = media.canonical_title().to_string();
    let anime_aliases: Vec<String> = media
        .title_variants()
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut rounds = Vec::with_capacity(REVEAL_STAGES.len());
    for (stage, edges) in REVEAL_STAGES.iter().zip(allocated) {
        let mut entries = Vec::with_capacity(edges.len());
        for edge in edges {
            let Some(portrait) = edge.character.portrait_url() else {
                return BuildOutcome::Rejected {
                    reason: "allocated character lost its portrait",
                };
            };
            let character = character_payload(edge, portrait);
            entries.push(CharacterGuessEntry {
                character_answer: character.name.clone(),
                character,
                character_aliases: edge.character.name_variants(),
                anime_answer: answer.clone(),
                anime_aliases: anime_aliases.clone(),
                reveal: stage.reveal(),
            });
        }
        rounds.push(CharacterGuessRound {
            order: stage.order,
            difficulty: stage.difficulty,
            entries,
        });
    }

    let primary = rounds
        .last()
        .and_then(|round| round.entries.first())
        .map(|entry| entry.character.clone());
    let Some(character) = primary else {
        return BuildOutcome::Rejected {
            reason: "no character allocated",
        };
    };

    BuildOutcome::Built(CharacterSilhouetteGame {
        spec: REVEAL_STAGES.iter().map(RevealStage::spec).collect(),
        answer,
        character,
        rounds,
    })
}
