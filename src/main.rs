use std::{
    io::{self, Write},
    process,
    sync::Arc,
};

use guesssenpai::{
    application::{
        assembler::{AssemblerConfig, DailyAssembler},
        catalog::CatalogGateway,
        daily::DailyPuzzleService,
        error::AppError,
        history::RecentHistory,
        imaging::RenderPool,
        poster_image::PosterImageService,
        ports::{CatalogClient, ImageFetcher, PreferenceStore, ThemeClipClient},
    },
    cache::{CacheAside, CacheConfig, InMemoryCache},
    config::{self, Command, DailyArgs, PosterArgs},
    domain::types::{MediaId, UserContext},
    infra::{
        error::InfraError, history::InMemoryHistoryStore, images::HttpImageFetcher,
        snapshot::SnapshotCatalog, telemetry,
    },
};
use time::OffsetDateTime;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    let causes = error.chain().join(": ");
    if dispatcher::has_been_set() {
        error!(error = %error, causes = %causes, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, causes = %causes, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    let snapshot_path = settings
        .catalog
        .snapshot_path
        .as_ref()
        .ok_or_else(|| InfraError::configuration("catalog snapshot path is not configured"))
        .map_err(AppError::from)?;
    let catalog = SnapshotCatalog::load(snapshot_path)
        .await
        .map_err(AppError::from)?;
    let app = build_application_context(catalog, &settings)?;

    match cli_args.command {
        Command::Daily(args) => run_daily(&app, args).await,
        Command::Poster(args) => run_poster(&app, args).await,
    }
}

struct ApplicationContext {
    daily: DailyPuzzleService,
    posters: PosterImageService,
}

fn build_application_context(
    catalog: SnapshotCatalog,
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let cache_config = CacheConfig::from(&settings.cache);
    let cache = CacheAside::new(
        Arc::new(InMemoryCache::new(&cache_config)),
        cache_config.single_flight,
    );

    let preferences: Arc<dyn PreferenceStore> = Arc::new(catalog.preference_store());
    let catalog = Arc::new(catalog);
    let catalog_client: Arc<dyn CatalogClient> = catalog.clone();
    let clip_client: Arc<dyn ThemeClipClient> = catalog;
    let gateway = CatalogGateway::new(
        catalog_client,
        clip_client,
        cache.clone(),
        cache_config.clone(),
    );

    let history = RecentHistory::new(
        Arc::new(InMemoryHistoryStore::new()),
        cache.clone(),
        settings.puzzles.history_days,
        cache_config.user_lists_ttl,
    );
    let assembler = DailyAssembler::new(
        gateway.clone(),
        history,
        preferences,
        AssemblerConfig {
            redaction: settings.redaction.clone(),
            characters: settings.characters.clone(),
            min_selection_attempts: settings.puzzles.min_selection_attempts.get(),
            opening_pool_enabled: settings.puzzles.opening_pool_enabled,
        },
    );
    let daily = DailyPuzzleService::new(
        assembler,
        cache.clone(),
        cache_config.puzzle_ttl,
        settings.puzzles.guess_opening_enabled,
    );

    let fetcher: Arc<dyn ImageFetcher> =
        Arc::new(HttpImageFetcher::new(settings.images.fetch_timeout).map_err(AppError::from)?);
    let posters = PosterImageService::new(
        gateway,
        fetcher,
        cache,
        RenderPool::new(settings.render.workers),
        cache_config.puzzle_ttl,
    );

    Ok(ApplicationContext { daily, posters })
}

async fn run_daily(app: &ApplicationContext, args: DailyArgs) -> Result<(), AppError> {
    let day = args
        .date
        .unwrap_or_else(|| OffsetDateTime::now_utc().date());
    let user = match (args.user_id, args.access_token) {
        (Some(user_id), Some(access_token)) => Some(UserContext {
            user_id,
            access_token,
        }),
        _ => None,
    };

    let response = app
        .daily
        .daily_puzzle(day, user.as_ref(), args.opening)
        .await?;
    let rendered = serde_json::to_string_pretty(&response)
        .map_err(|err| AppError::unexpected(format!("failed to encode response: {err}")))?;
    println!("{rendered}");

    let audience = if user.is_some() { "user" } else { "anonymous" };
    info!(
        target = "guesssenpai::daily",
        day = %day,
        audience,
        opening = response.guess_the_opening_enabled,
        "Daily puzzle ready"
    );
    Ok(())
}

async fn run_poster(app: &ApplicationContext, args: PosterArgs) -> Result<(), AppError> {
    let image = app
        .posters
        .poster_image(MediaId(args.media_id), args.hints)
        .await?;

    match args.output {
        Some(path) => {
            tokio::fs::write(&path, &image.bytes)
                .await
                .map_err(|err| AppError::from(InfraError::from(err)))?;
            info!(
                target = "guesssenpai::poster",
                media_id = args.media_id,
                path = %path.display(),
                mime = %image.mime,
                bytes = image.bytes.len(),
                "Poster variant written"
            );
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(&image.bytes)
                .and_then(|()| stdout.flush())
                .map_err(|err| AppError::from(InfraError::from(err)))?;
        }
    }
    Ok(())
}
