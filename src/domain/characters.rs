//! Character round allocation for the silhouette game.
//!
//! Characters are grouped into tiers by credited role. Each round draws from
//! the tiers in its own fallback order, then from the least restrictive tier,
//! and only as a last resort reuses characters already placed in earlier
//! rounds. Within a round a character never appears twice.

use std::collections::HashSet;

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

use super::error::DomainError;
use super::media::{CharacterEdge, MediaItem};

pub const DEFAULT_PER_ROUND: usize = 4;
pub const DEFAULT_MAX_CANDIDATES: usize = 24;

/// Character pool a round can draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacterTier {
    /// Main cast only.
    Lead,
    /// Supporting cast only.
    Supporting,
    /// Anyone credited with a portrait.
    Any,
}

impl CharacterTier {
    /// The tier every round escalates to once its own order runs dry.
    pub const LEAST_RESTRICTIVE: CharacterTier = CharacterTier::Any;

    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::Lead),
            2 => Some(Self::Supporting),
            3 => Some(Self::Any),
            _ => None,
        }
    }

    fn seed_suffix(self) -> u8 {
        match self {
            Self::Lead => 1,
            Self::Supporting => 2,
            Self::Any => 3,
        }
    }

    fn admits(self, edge: &CharacterEdge) -> bool {
        match self {
            Self::Lead => edge.role_is("MAIN"),
            Self::Supporting => edge.role_is("SUPPORTING"),
            Self::Any => true,
        }
    }
}

/// Tunables for [`allocate_rounds`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatorConfig {
    per_round: usize,
    max_candidates: usize,
    /// Tier order per round difficulty, indexed by `difficulty - 1`.
    tier_order: Vec<Vec<CharacterTier>>,
    /// Allow the final pass to reuse characters from earlier rounds.
    allow_cross_round_reuse: bool,
}

impl AllocatorConfig {
    pub fn new(
        per_round: usize,
        max_candidates: usize,
        tier_order: Vec<Vec<CharacterTier>>,
        allow_cross_round_reuse: bool,
    ) -> Result<Self, DomainError> {
        if per_round == 0 {
            return Err(DomainError::validation("per-round count must be positive"));
        }
        if max_candidates < per_round {
            return Err(DomainError::validation(
                "candidate limit must be at least the per-round count",
            ));
        }
        if tier_order.is_empty() || tier_order.iter().any(Vec::is_empty) {
            return Err(DomainError::validation(
                "every difficulty needs at least one tier",
            ));
        }
        Ok(Self {
            per_round,
            max_candidates,
            tier_order,
            allow_cross_round_reuse,
        })
    }

    pub fn per_round(&self) -> usize {
        self.per_round
    }

    pub fn max_candidates(&self) -> usize {
        self.max_candidates
    }

    pub fn tier_order(&self) -> &[Vec<CharacterTier>] {
        &self.tier_order
    }

    pub fn allows_cross_round_reuse(&self) -> bool {
        self.allow_cross_round_reuse
    }

    fn tiers_for(&self, difficulty: u8) -> &[CharacterTier] {
        let index = usize::from(difficulty.max(1) - 1).min(self.tier_order.len() - 1);
        &self.tier_order[index]
    }
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        use CharacterTier::{Any, Lead, Supporting};
        Self {
            per_round: DEFAULT_PER_ROUND,
            max_candidates: DEFAULT_MAX_CANDIDATES,
            tier_order: vec![
                vec![Lead, Supporting, Any],
                vec![Supporting, Any, Lead],
                vec![Any, Supporting, Lead],
            ],
            allow_cross_round_reuse: true,
        }
    }
}

fn shuffle_seed(media: &MediaItem, tier: CharacterTier) -> u64 {
    let seed = format!("character-rounds:{}:{}", media.id, tier.seed_suffix());
    let digest = Sha256::digest(seed.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

/// Candidates admitted by `tier`: portrait required, unique by id, shuffled
/// deterministically per media and tier, then truncated.
pub fn tier_candidates<'m>(
    media: &'m MediaItem,
    tier: CharacterTier,
    max_candidates: usize,
) -> Vec<&'m CharacterEdge> {
    let mut seen = HashSet::new();
    let mut candidates: Vec<&CharacterEdge> = media
        .characters
        .iter()
        .filter(|edge| edge.character.portrait_url().is_some())
        .filter(|edge| tier.admits(edge))
        .filter(|edge| seen.insert(edge.character.id))
        .collect();
    candidates.sort_by_key(|edge| edge.character.id);
    let mut rng = ChaCha8Rng::seed_from_u64(shuffle_seed(media, tier));
    candidates.shuffle(&mut rng);
    candidates.truncate(max_candidates);
    candidates
}

fn fill_from<'m>(
    round: &mut Vec<&'m CharacterEdge>,
    candidates: &[&'m CharacterEdge],
    blocked: &HashSet<i64>,
    target: usize,
) {
    for &edge in candidates {
        if round.len() >= target {
            return;
        }
        let id = edge.character.id;
        if blocked.contains(&id) || round.iter().any(|placed| placed.character.id == id) {
            continue;
        }
        round.push(edge);
    }
}

/// Fill one round per entry of `difficulties`, each with exactly
/// `per_round` characters.
///
/// Returns `None` when any round cannot be filled, which marks the media as
/// unusable for this game.
pub fn allocate_rounds<'m>(
    media: &'m MediaItem,
    difficulties: &[u8],
    config: &AllocatorConfig,
) -> Option<Vec<Vec<&'m CharacterEdge>>> {
    let target = config.per_round;
    let fallback = tier_candidates(media, CharacterTier::LEAST_RESTRICTIVE, config.max_candidates);
    if fallback.len() < target {
        return None;
    }

    let mut used: HashSet<i64> = HashSet::new();
    let mut rounds = Vec::with_capacity(difficulties.len());

    for difficulty in difficulties {
        let mut round: Vec<&CharacterEdge> = Vec::with_capacity(target);

        for tier in config.tiers_for(*difficulty) {
            let candidates = tier_candidates(media, *tier, config.max_candidates);
            fill_from(&mut round, &candidates, &used, target);
        }
        fill_from(&mut round, &fallback, &used, target);
        if config.allow_cross_round_reuse {
            fill_from(&mut round, &fallback, &HashSet::new(), target);
        }

        if round.len() < target {
            return None;
        }
        used.extend(round.iter().map(|edge| edge.character.id));
        rounds.push(round);
    }
    Some(rounds)
}
