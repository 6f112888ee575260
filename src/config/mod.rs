//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    num::{NonZeroU64, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::domain::characters::{
    AllocatorConfig, CharacterTier, DEFAULT_MAX_CANDIDATES, DEFAULT_PER_ROUND,
};
use crate::domain::redaction::{DEFAULT_MASK_RATIO, DEFAULT_REVEAL_LEVELS, RedactionConfig};

mod cli;

pub use cli::{CliArgs, Command, DailyArgs, GlobalOverrides, PosterArgs};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "guesssenpai";
const ENV_PREFIX: &str = "GUESSSENPAI";
const DEFAULT_PUZZLE_TTL_SECS: u64 = 172_800;
const DEFAULT_CATALOG_TTL_SECS: u64 = 86_400;
const DEFAULT_USER_LISTS_TTL_SECS: u64 = 3_600;
const DEFAULT_CACHE_CAPACITY: usize = 2_048;
const DEFAULT_HISTORY_DAYS: u32 = 14;
const DEFAULT_MIN_SELECTION_ATTEMPTS: usize = 3;
const DEFAULT_RENDER_WORKERS: usize = 2;
const DEFAULT_IMAGE_FETCH_TIMEOUT_SECS: u64 = 20;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub puzzles: PuzzleSettings,
    pub redaction: RedactionConfig,
    pub characters: AllocatorConfig,
    pub render: RenderSettings,
    pub images: ImageSettings,
    pub catalog: CatalogSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub puzzle_ttl_seconds: NonZeroU64,
    pub catalog_ttl_seconds: NonZeroU64,
    pub user_lists_ttl_seconds: NonZeroU64,
    pub capacity: NonZeroUsize,
    pub single_flight: bool,
}

#[derive(Debug, Clone)]
pub struct PuzzleSettings {
    /// Days a seen media stays excluded for a user; zero disables the filter.
    pub history_days: u32,
    pub guess_opening_enabled: bool,
    pub opening_pool_enabled: bool,
    pub min_selection_attempts: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub workers: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub struct ImageSettings {
    pub fetch_timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct CatalogSettings {
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("redaction.reveal_levels")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);
    if let Command::Daily(args) = &cli.command {
        raw.apply_daily_overrides(args);
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    puzzles: RawPuzzleSettings,
    redaction: RawRedactionSettings,
    characters: RawCharacterSettings,
    render: RawRenderSettings,
    images: RawImageSettings,
    catalog: RawCatalogSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(path) = overrides.catalog.as_ref() {
            self.catalog.snapshot_path = Some(path.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }

    /// Asking for the opening game on the command line turns the feature on.
    fn apply_daily_overrides(&mut self, args: &DailyArgs) {
        if args.opening {
            self.puzzles.guess_opening_enabled = Some(true);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            cache,
            puzzles,
            redaction,
            characters,
            render,
            images,
            catalog,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            cache: build_cache_settings(cache)?,
            puzzles: build_puzzle_settings(puzzles)?,
            redaction: build_redaction_config(redaction)?,
            characters: build_allocator_config(characters)?,
            render: build_render_settings(render)?,
            images: build_image_settings(images)?,
            catalog: build_catalog_settings(catalog),
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let puzzle_ttl_seconds = non_zero_u64(
        cache.ttl_puzzle_seconds.unwrap_or(DEFAULT_PUZZLE_TTL_SECS),
        "cache.ttl_puzzle_seconds",
    )?;
    let catalog_ttl_seconds = non_zero_u64(
        cache.ttl_catalog_seconds.unwrap_or(DEFAULT_CATALOG_TTL_SECS),
        "cache.ttl_catalog_seconds",
    )?;
    let user_lists_ttl_seconds = non_zero_u64(
        cache
            .ttl_user_lists_seconds
            .unwrap_or(DEFAULT_USER_LISTS_TTL_SECS),
        "cache.ttl_user_lists_seconds",
    )?;
    let capacity = non_zero_usize(
        cache.capacity.unwrap_or(DEFAULT_CACHE_CAPACITY as u64),
        "cache.capacity",
    )?;

    Ok(CacheSettings {
        puzzle_ttl_seconds,
        catalog_ttl_seconds,
        user_lists_ttl_seconds,
        capacity,
        single_flight: cache.single_flight.unwrap_or(true),
    })
}

fn build_puzzle_settings(puzzles: RawPuzzleSettings) -> Result<PuzzleSettings, LoadError> {
    let min_selection_attempts = non_zero_usize(
        puzzles
            .min_selection_attempts
            .unwrap_or(DEFAULT_MIN_SELECTION_ATTEMPTS as u64),
        "puzzles.min_selection_attempts",
    )?;

    Ok(PuzzleSettings {
        history_days: puzzles.history_days.unwrap_or(DEFAULT_HISTORY_DAYS),
        guess_opening_enabled: puzzles.guess_opening_enabled.unwrap_or(false),
        opening_pool_enabled: puzzles.opening_pool_enabled.unwrap_or(true),
        min_selection_attempts,
    })
}

fn build_redaction_config(redaction: RawRedactionSettings) -> Result<RedactionConfig, LoadError> {
    let mask_ratio = redaction.mask_ratio.unwrap_or(DEFAULT_MASK_RATIO);
    if !(mask_ratio > 0.0 && mask_ratio <= 1.0) {
        return Err(LoadError::invalid(
            "redaction.mask_ratio",
            format!("must be within (0, 1], got {mask_ratio}"),
        ));
    }

    let reveal_levels = redaction
        .reveal_levels
        .unwrap_or_else(|| DEFAULT_REVEAL_LEVELS.to_vec());
    if reveal_levels.is_empty() {
        return Err(LoadError::invalid(
            "redaction.reveal_levels",
            "must not be empty",
        ));
    }
    if reveal_levels.iter().any(|level| !(*level > 0.0 && *level <= 1.0)) {
        return Err(LoadError::invalid(
            "redaction.reveal_levels",
            "every level must be within (0, 1]",
        ));
    }

    RedactionConfig::new(mask_ratio, reveal_levels)
        .map_err(|err| LoadError::invalid("redaction.reveal_levels", err.to_string()))
}

fn build_allocator_config(characters: RawCharacterSettings) -> Result<AllocatorConfig, LoadError> {
    let per_round = non_zero_usize(
        characters.per_round.unwrap_or(DEFAULT_PER_ROUND as u64),
        "characters.per_round",
    )?;
    let max_candidates = non_zero_usize(
        characters
            .max_candidates
            .unwrap_or(DEFAULT_MAX_CANDIDATES as u64),
        "characters.max_candidates",
    )?;

    let tier_order = match characters.tier_order {
        Some(levels) => parse_tier_order(&levels)?,
        None => AllocatorConfig::default().tier_order().to_vec(),
    };

    AllocatorConfig::new(
        per_round.get(),
        max_candidates.get(),
        tier_order,
        characters.allow_cross_round_reuse.unwrap_or(true),
    )
    .map_err(|err| LoadError::invalid("characters.max_candidates", err.to_string()))
}

/// `[[1, 2, 3], [2, 3, 1]]`: one list of tier levels per round difficulty.
fn parse_tier_order(levels: &[Vec<u8>]) -> Result<Vec<Vec<CharacterTier>>, LoadError> {
    if levels.is_empty() || levels.iter().any(Vec::is_empty) {
        return Err(LoadError::invalid(
            "characters.tier_order",
            "every difficulty needs at least one tier",
        ));
    }
    levels
        .iter()
        .map(|round| {
            round
                .iter()
                .map(|level| {
                    CharacterTier::from_level(*level).ok_or_else(|| {
                        LoadError::invalid(
                            "characters.tier_order",
                            format!("unknown tier level {level}; expected 1, 2 or 3"),
                        )
                    })
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .collect()
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let workers = non_zero_usize(
        render.workers.unwrap_or(DEFAULT_RENDER_WORKERS as u64),
        "render.workers",
    )?;
    Ok(RenderSettings { workers })
}

fn build_image_settings(images: RawImageSettings) -> Result<ImageSettings, LoadError> {
    let timeout = non_zero_u64(
        images
            .fetch_timeout_seconds
            .unwrap_or(DEFAULT_IMAGE_FETCH_TIMEOUT_SECS),
        "images.fetch_timeout_seconds",
    )?;
    Ok(ImageSettings {
        fetch_timeout: Duration::from_secs(timeout.get()),
    })
}

fn build_catalog_settings(catalog: RawCatalogSettings) -> CatalogSettings {
    let snapshot_path = catalog
        .snapshot_path
        .filter(|path| !path.as_os_str().is_empty());
    CatalogSettings { snapshot_path }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    ttl_puzzle_seconds: Option<u64>,
    ttl_catalog_seconds: Option<u64>,
    ttl_user_lists_seconds: Option<u64>,
    capacity: Option<u64>,
    single_flight: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPuzzleSettings {
    history_days: Option<u32>,
    guess_opening_enabled: Option<bool>,
    opening_pool_enabled: Option<bool>,
    min_selection_attempts: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRedactionSettings {
    mask_ratio: Option<f64>,
    reveal_levels: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCharacterSettings {
    per_round: Option<u64>,
    max_candidates: Option<u64>,
    tier_order: Option<Vec<Vec<u8>>>,
    allow_cross_round_reuse: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    workers: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawImageSettings {
    fetch_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCatalogSettings {
    snapshot_path: Option<PathBuf>,
}

fn non_zero_u64(value: u64, key: &'static str) -> Result<NonZeroU64, LoadError> {
    NonZeroU64::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
