//! Daily assembly: candidate pooling, per-game selection with retry, and the
//! character and opening fallbacks.
//!
//! The only mutable state is the set of media already claimed by a game,
//! scoped to one [`DailyAssembler::assemble`] call. Everything else is a pure
//! function of the day, the user and the catalog snapshots, which is what
//! lets independent replicas produce the same puzzle.

use std::collections::HashSet;
use std::sync::Arc;

use guesssenpai_api_types::{
    CharacterSilhouetteGame, DailyPuzzleResponse, GamesPayload, GuessOpeningGame, PuzzleBundle,
};
use time::Date;
use tracing::{debug, info, warn};

use super::catalog::CatalogGateway;
use super::error::AssemblyError;
use super::games::{
    BuildOutcome, build_anidle, build_character_game, build_opening_round, build_poster,
    build_solution, build_synopsis, synopsis_game,
};
use super::history::RecentHistory;
use super::ports::{CatalogError, PreferenceStore};
use crate::domain::characters::AllocatorConfig;
use crate::domain::error::DomainError;
use crate::domain::media::MediaItem;
use crate::domain::redaction::RedactionConfig;
use crate::domain::selection::{
    Draw, SelectionSeed, WatchClassification, build_candidate_pool, choose_from_pool,
};
use crate::domain::types::{GameKey, MediaId, UserContext};

const SOURCE: &str = "application::assembler";

pub const OPENING_ROUNDS: usize = 3;
pub const DEFAULT_MIN_SELECTION_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    pub redaction: RedactionConfig,
    pub characters: AllocatorConfig,
    /// Lower bound on candidates tried per game when the pool is tiny.
    pub min_selection_attempts: usize,
    /// Draw opening rounds from the dedicated opening pool when it is non-empty.
    pub opening_pool_enabled: bool,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            redaction: RedactionConfig::default(),
            characters: AllocatorConfig::default(),
            min_selection_attempts: DEFAULT_MIN_SELECTION_ATTEMPTS,
            opening_pool_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AssemblyRequest<'a> {
    pub day: Date,
    pub user: Option<&'a UserContext>,
    pub include_opening: bool,
}

/// An assembled response together with the media to record as seen.
#[derive(Debug, Clone)]
pub struct Assembly {
    pub response: DailyPuzzleResponse,
    /// Distinct media ids in the order their games were built.
    pub media_ids: Vec<MediaId>,
}

/// Media claimed by today's games.
#[derive(Debug, Default)]
struct Claims {
    selected: HashSet<MediaId>,
    ordered: Vec<MediaId>,
}

impl Claims {
    fn claim(&mut self, media_id: MediaId) {
        if self.selected.insert(media_id) {
            self.ordered.push(media_id);
        }
    }
}

/// Result of drawing candidates for one game until a builder accepts one.
struct Drawn<T> {
    media: MediaItem,
    game: T,
}

/// Why a draw ran out of budget.
#[derive(Default)]
struct DrawFailure {
    /// First candidate whose details loaded, kept for lenient fallbacks.
    first_loaded: Option<MediaItem>,
    last_error: Option<CatalogError>,
}

impl DrawFailure {
    fn into_error(self, game: GameKey) -> AssemblyError {
        match self.last_error {
            Some(err) => AssemblyError::Catalog(err),
            None => AssemblyError::unbuildable(game.label()),
        }
    }
}

pub struct DailyAssembler {
    catalog: CatalogGateway,
    history: RecentHistory,
    preferences: Arc<dyn PreferenceStore>,
    config: AssemblerConfig,
}

impl DailyAssembler {
    pub fn new(
        catalog: CatalogGateway,
        history: RecentHistory,
        preferences: Arc<dyn PreferenceStore>,
        config: AssemblerConfig,
    ) -> Self {
        Self {
            catalog,
            history,
            preferences,
            config,
        }
    }

    pub fn history(&self) -> &RecentHistory {
        &self.history
    }

    pub async fn assemble(&self, request: AssemblyRequest<'_>) -> Result<Assembly, AssemblyError> {
        let popular = self.catalog.popular_pool(request.day).await?;
        let watch = match request.user {
            Some(user) => self.watch_classification(user).await,
            None => None,
        };
        let recent = match request.user {
            Some(user) => self.recent_media(user.user_id).await,
            None => HashSet::new(),
        };

        let pool = build_candidate_pool(&popular, watch.as_ref(), &recent);
        if pool.is_empty() {
            return Err(DomainError::empty_pool(GameKey::Anidle.to_string()).into());
        }
        let seed = SelectionSeed::new(request.day, request.user.map(|user| user.user_id));
        debug!(
            target = SOURCE,
            op = "candidate_pool",
            seed = seed.base(),
            popular = popular.len(),
            candidates = pool.len(),
            recent = recent.len()
        );

        let mut claims = Claims::default();

        let anidle = self
            .draw(&seed, &pool, GameKey::Anidle, &claims.selected, |media| {
                BuildOutcome::Built(build_anidle(media, &self.config.redaction))
            })
            .await
            .map_err(|failure| failure.into_error(GameKey::Anidle))?;
        claims.claim(anidle.media.id);

        let poster = self
            .draw(&seed, &pool, GameKey::PosterZoomed, &claims.selected, |media| {
                BuildOutcome::Built(build_poster(media))
            })
            .await
            .map_err(|failure| failure.into_error(GameKey::PosterZoomed))?;
        claims.claim(poster.media.id);

        let synopsis = match self
            .draw(&seed, &pool, GameKey::RedactedSynopsis, &claims.selected, |media| {
                build_synopsis(media, &self.config.redaction)
            })
            .await
        {
            Ok(drawn) => drawn,
            Err(DrawFailure {
                first_loaded: Some(media),
                ..
            }) => {
                warn!(
                    target = SOURCE,
                    op = "redacted_synopsis",
                    media_id = %media.id,
                    result = "fallback",
                    "No candidate has a usable description; keeping the first candidate"
                );
                let game = synopsis_game(&media, &self.config.redaction);
                Drawn { media, game }
            }
            Err(failure) => return Err(failure.into_error(GameKey::RedactedSynopsis)),
        };
        claims.claim(synopsis.media.id);

        let character = match self
            .draw(&seed, &pool, GameKey::CharacterSilhouette, &claims.selected, |media| {
                build_character_game(media, &self.config.characters)
            })
            .await
        {
            Ok(drawn) => drawn,
            Err(failure) => self
                .reuse_for_characters([&anidle.media, &poster.media, &synopsis.media])
                .ok_or_else(|| failure.into_error(GameKey::CharacterSilhouette))?,
        };
        claims.claim(character.media.id);

        let opening = if request.include_opening {
            self.opening_game(&seed, request.day, &pool, &mut claims).await
        } else {
            None
        };

        let difficulty_level = match request.user {
            Some(user) => self.difficulty_level(user.user_id).await,
            None => None,
        };

        let guess_the_opening_enabled = opening.is_some();
        let games = GamesPayload {
            anidle: bundle(anidle),
            poster_zoomed: bundle(poster),
            redacted_synopsis: bundle(synopsis),
            character_silhouette: bundle(character),
            guess_the_opening: opening,
            difficulty_level,
        };

        info!(
            target = SOURCE,
            op = "assemble",
            seed = seed.base(),
            result = "ok",
            media = claims.ordered.len(),
            guess_the_opening_enabled
        );

        Ok(Assembly {
            response: DailyPuzzleResponse {
                date: request.day,
                games,
                guess_the_opening_enabled,
            },
            media_ids: claims.ordered,
        })
    }

    /// Draw candidates for `game` until `build` accepts one or the attempt
    /// budget runs out.
    ///
    /// A candidate whose details fail to load is rejected like one the
    /// builder refuses; the same call is never retried. Media in `excluded`
    /// is never handed to `build`.
    async fn draw<T, B>(
        &self,
        seed: &SelectionSeed,
        pool: &[&MediaItem],
        game: GameKey,
        excluded: &HashSet<MediaId>,
        build: B,
    ) -> Result<Drawn<T>, DrawFailure>
    where
        B: Fn(&MediaItem) -> BuildOutcome<T>,
    {
        let budget = pool.len().max(self.config.min_selection_attempts);
        let mut attempted = HashSet::new();
        let mut failure = DrawFailure::default();

        for attempt in 0..budget {
            let draw = Draw {
                game,
                attempt,
                excluded,
                attempted: &attempted,
            };
            let Ok(candidate) = choose_from_pool(seed, pool, draw) else {
                break;
            };
            let candidate_id = candidate.id;
            // Relaxed draws may return claimed or already rejected media.
            if !attempted.insert(candidate_id) || excluded.contains(&candidate_id) {
                continue;
            }

            let media = match self.catalog.media_details(candidate_id).await {
                Ok(media) => media,
                Err(err) => {
                    warn!(
                        target = SOURCE,
                        op = "draw",
                        game = %game,
                        attempt,
                        media_id = %candidate_id,
                        result = "catalog_error",
                        error = %err,
                        "Candidate details could not be loaded"
                    );
                    failure.last_error = Some(err);
                    continue;
                }
            };

            match build(&media) {
                BuildOutcome::Built(built) => {
                    return Ok(Drawn {
                        media,
                        game: built,
                    });
                }
                BuildOutcome::Rejected { reason } => {
                    debug!(
                        target = SOURCE,
                        op = "draw",
                        game = %game,
                        attempt,
                        media_id = %candidate_id,
                        result = "rejected",
                        reason
                    );
                    if failure.first_loaded.is_none() {
                        failure.first_loaded = Some(media);
                    }
                }
            }
        }
        Err(failure)
    }

    fn reuse_for_characters(
        &self,
        selected: [&MediaItem; 3],
    ) -> Option<Drawn<CharacterSilhouetteGame>> {
        selected.into_iter().find_map(|media| {
            let game = build_character_game(media, &self.config.characters).built()?;
            warn!(
                target = SOURCE,
                op = "character_silhouette",
                media_id = %media.id,
                result = "reused",
                "No fresh candidate fits the character game; reusing today's media"
            );
            Some(Drawn {
                media: media.clone(),
                game,
            })
        })
    }

    async fn opening_game(
        &self,
        seed: &SelectionSeed,
        day: Date,
        pool: &[&MediaItem],
        claims: &mut Claims,
    ) -> Option<PuzzleBundle<GuessOpeningGame>> {
        let dedicated = if self.config.opening_pool_enabled {
            match self.catalog.opening_pool(day).await {
                Ok(items) => items,
                Err(err) => {
                    warn!(
                        target = SOURCE,
                        op = "opening_pool",
                        result = "error",
                        error = %err,
                        "Opening pool unavailable; using the daily pool"
                    );
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };
        let candidates: Vec<&MediaItem> = if dedicated.is_empty() {
            pool.to_vec()
        } else {
            dedicated.iter().collect()
        };
        if candidates.is_empty() {
            return None;
        }

        let budget = (candidates.len() * OPENING_ROUNDS).max(OPENING_ROUNDS * 3);
        let mut attempted = HashSet::new();
        let mut excluded = claims.selected.clone();
        let mut rounds = Vec::with_capacity(OPENING_ROUNDS);
        let mut attempt = 0;

        while rounds.len() < OPENING_ROUNDS && attempt < budget {
            let game = GameKey::GuessTheOpening {
                round: rounds.len(),
            };
            let draw = Draw {
                game,
                attempt,
                excluded: &excluded,
                attempted: &attempted,
            };
            attempt += 1;
            let Ok(candidate) = choose_from_pool(seed, &candidates, draw) else {
                break;
            };
            let candidate_id = candidate.id;
            attempted.insert(candidate_id);
            // A relaxed draw may hand back media another game already owns.
            if excluded.contains(&candidate_id) {
                continue;
            }

            let media = match self.catalog.media_details(candidate_id).await {
                Ok(media) => media,
                Err(err) => {
                    warn!(
                        target = SOURCE,
                        op = "opening_round",
                        game = %game,
                        media_id = %candidate_id,
                        result = "catalog_error",
                        error = %err,
                        "Opening candidate details could not be loaded"
                    );
                    continue;
                }
            };
            let clip = match self.catalog.opening_clip(&media).await {
                Ok(Some(clip)) => clip,
                Ok(None) => continue,
                Err(err) => {
                    warn!(
                        target = SOURCE,
                        op = "opening_round",
                        game = %game,
                        media_id = %media.id,
                        result = "clip_error",
                        error = %err,
                        "Opening clip lookup failed; trying another candidate"
                    );
                    continue;
                }
            };

            let order = u8::try_from(rounds.len() + 1).unwrap_or(u8::MAX);
            rounds.push(build_opening_round(
                &media,
                &clip,
                order,
                OPENING_ROUNDS as u8,
            ));
            excluded.insert(media.id);
        }

        if rounds.len() < OPENING_ROUNDS {
            info!(
                target = SOURCE,
                op = "opening_game",
                result = "omitted",
                rounds = rounds.len(),
                attempts = attempt
            );
            return None;
        }

        for round in &rounds {
            claims.claim(MediaId(round.media_id));
        }
        let first = &rounds[0];
        Some(PuzzleBundle {
            media_id: first.media_id,
            solution: first.solution.clone(),
            puzzle: GuessOpeningGame { rounds },
        })
    }

    async fn watch_classification(&self, user: &UserContext) -> Option<WatchClassification> {
        match self.catalog.user_lists(user).await {
            Ok(lists) => Some(WatchClassification::from_lists(&lists)),
            Err(err) => {
                warn!(
                    target = SOURCE,
                    op = "user_lists",
                    user_id = user.user_id,
                    result = "error",
                    error = %err,
                    "Watch lists unavailable; skipping novelty filter"
                );
                None
            }
        }
    }

    async fn recent_media(&self, user_id: i64) -> HashSet<MediaId> {
        match self.history.recent(user_id).await {
            Ok(recent) => recent,
            Err(err) => {
                warn!(
                    target = SOURCE,
                    op = "recent_history",
                    user_id,
                    result = "error",
                    error = %err,
                    "Recent history unavailable; skipping anti-repeat filter"
                );
                HashSet::new()
            }
        }
    }

    async fn difficulty_level(&self, user_id: i64) -> Option<u8> {
        match self.preferences.load_preferences(user_id).await {
            Ok(stored) => stored.and_then(|stored| stored.migrate().difficulty_level),
            Err(err) => {
                warn!(
                    target = SOURCE,
                    op = "preferences",
                    user_id,
                    result = "error",
                    error = %err,
                    "Preferences unavailable; omitting difficulty hint"
                );
                None
            }
        }
    }
}

fn bundle<T>(drawn: Drawn<T>) -> PuzzleBundle<T> {
    PuzzleBundle {
        media_id: drawn.media.id.get(),
        solution: build_solution(&drawn.media),
        puzzle: drawn.game,
    }
}
