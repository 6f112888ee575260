//! Per-game payload builders.
//!
//! Builders are pure: they turn a media snapshot (plus any clip already
//! fetched) into a wire payload. A builder that cannot use a media item says
//! so through [`BuildOutcome`], and the assembler moves on to another
//! candidate.

pub mod anidle;
pub mod character;
pub mod opening;
pub mod poster;
pub mod solution;
pub mod synopsis;

pub use anidle::build_anidle;
pub use character::build_character_game;
pub use opening::build_opening_round;
pub use poster::build_poster;
pub use solution::build_solution;
pub use synopsis::{build_synopsis, synopsis_game};

#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome<T> {
    Built(T),
    /// The media cannot back this game.
    Rejected { reason: &'static str },
}

impl<T> BuildOutcome<T> {
    pub fn built(self) -> Option<T> {
        match self {
            BuildOutcome::Built(game) => Some(game),
            BuildOutcome::Rejected { .. } => None,
        }
    }
}
