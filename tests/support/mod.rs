#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use guesssenpai::application::assembler::{AssemblerConfig, DailyAssembler};
use guesssenpai::application::catalog::CatalogGateway;
use guesssenpai::application::daily::DailyPuzzleService;
use guesssenpai::application::history::RecentHistory;
use guesssenpai::application::ports::{
    CatalogClient, CatalogError, ClipError, FetchedImage, HistoryError, HistoryStore,
    ImageFetchError, ImageFetcher, PreferenceError, PreferenceStore, ThemeClipClient,
};
use guesssenpai::cache::{CacheAside, CacheConfig, InMemoryCache};
use guesssenpai::domain::media::{
    Character, CharacterEdge, CharacterImage, CharacterName, CoverImage, MediaItem,
    MediaListCollection, MediaTitle, ThemeClip,
};
use guesssenpai::domain::preferences::StoredPreferences;
use guesssenpai::domain::types::{MediaId, UserContext};
use image::{DynamicImage, ImageFormat, RgbImage};
use time::Date;
use time::macros::date;

pub const DAY: Date = date!(2024 - 01 - 05);
pub const USER_ID: i64 = 42;

pub const TITLES: [(i64, &str); 8] = [
    (101, "Alpha"),
    (202, "Beta"),
    (303, "Gamma"),
    (404, "Delta"),
    (505, "Epsilon"),
    (606, "Zeta"),
    (707, "Eta"),
    (808, "Theta"),
];

pub fn user() -> UserContext {
    UserContext {
        user_id: USER_ID,
        access_token: "token".to_string(),
    }
}

fn character(media_id: i64, index: i64) -> CharacterEdge {
    let id = media_id * 100 + index;
    CharacterEdge {
        role: Some(if index <= 4 { "MAIN" } else { "SUPPORTING" }.to_string()),
        character: Character {
            id,
            name: CharacterName {
                full: Some(format!("Character {id}")),
                native: None,
                user_preferred: None,
            },
            image: Some(CharacterImage {
                large: Some(format!("https://img.test/characters/{id}.png")),
                medium: None,
            }),
        },
    }
}

/// Media every builder accepts: a description, a cover and a full cast.
pub fn media(id: i64, title: &str) -> MediaItem {
    MediaItem {
        id: MediaId(id),
        title: MediaTitle {
            english: Some(title.to_string()),
            romaji: Some(format!("{title} no Monogatari")),
            ..MediaTitle::default()
        },
        synonyms: Vec::new(),
        genres: vec!["Action".to_string(), "Drama".to_string()],
        tags: Vec::new(),
        popularity: Some(1_000 * id),
        average_score: Some(70),
        episodes: Some(12),
        duration: Some(24),
        season: Some("SPRING".to_string()),
        season_year: Some(2019),
        start_date: None,
        format: Some("TV".to_string()),
        description: Some(format!(
            "{title} follows a young pilot who discovers an ancient machine beneath the city."
        )),
        cover_image: Some(CoverImage {
            extra_large: Some(format!("https://img.test/covers/{id}.jpg")),
            large: None,
            medium: None,
        }),
        external_links: Vec::new(),
        characters: (1..=12).map(|index| character(id, index)).collect(),
    }
}

pub fn popular() -> Vec<MediaItem> {
    TITLES.iter().map(|(id, title)| media(*id, title)).collect()
}

#[derive(Default)]
pub struct FakeCatalog {
    pub popular: Vec<MediaItem>,
    pub opening: Vec<MediaItem>,
    pub user_lists: HashMap<i64, MediaListCollection>,
    pub fail_popular: AtomicBool,
    pub popular_calls: AtomicUsize,
    pub detail_calls: AtomicUsize,
}

impl FakeCatalog {
    pub fn new(popular: Vec<MediaItem>) -> Self {
        Self {
            popular,
            ..Self::default()
        }
    }
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    async fn fetch_popular_pool(&self) -> Result<Vec<MediaItem>, CatalogError> {
        self.popular_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_popular.load(Ordering::SeqCst) {
            return Err(CatalogError::upstream("catalog offline"));
        }
        Ok(self.popular.clone())
    }

    async fn fetch_media_details(&self, media_id: MediaId) -> Result<MediaItem, CatalogError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.popular
            .iter()
            .chain(self.opening.iter())
            .find(|media| media.id == media_id)
            .cloned()
            .ok_or(CatalogError::NotFound { media_id })
    }

    async fn fetch_user_media_lists(
        &self,
        user: &UserContext,
    ) -> Result<MediaListCollection, CatalogError> {
        Ok(self
            .user_lists
            .get(&user.user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_opening_pool(&self, _day: Date) -> Result<Vec<MediaItem>, CatalogError> {
        Ok(self.opening.clone())
    }
}

/// Knows an opening for every title in `titles`.
#[derive(Default)]
pub struct FakeClips {
    titles: HashSet<String>,
}

impl FakeClips {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn for_all() -> Self {
        Self {
            titles: TITLES
                .iter()
                .map(|(_, title)| title.to_string())
                .collect(),
        }
    }
}

#[async_trait]
impl ThemeClipClient for FakeClips {
    async fn find_opening_clip(&self, titles: &[String]) -> Result<Option<ThemeClip>, ClipError> {
        Ok(titles
            .iter()
            .find(|title| self.titles.contains(*title))
            .map(|title| ThemeClip {
                audio_url: Some(format!("https://clips.test/{title}.mp3")),
                song_title: Some(format!("{title} OP")),
                artist: Some("Band".to_string()),
                sequence: Some(1),
                ..ThemeClip::default()
            }))
    }
}

#[derive(Default)]
pub struct RecordingHistory {
    pub seen: Mutex<HashMap<i64, Vec<MediaId>>>,
    pub records: AtomicUsize,
    pub fail_records: bool,
}

impl RecordingHistory {
    pub fn failing() -> Self {
        Self {
            fail_records: true,
            ..Self::default()
        }
    }

    pub fn seen_by(&self, user_id: i64) -> Vec<MediaId> {
        self.seen
            .lock()
            .expect("history lock")
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl HistoryStore for RecordingHistory {
    async fn list_recent(
        &self,
        user_id: i64,
        _window_days: u32,
    ) -> Result<Vec<MediaId>, HistoryError> {
        Ok(self.seen_by(user_id))
    }

    async fn record_seen(
        &self,
        user_id: i64,
        media_id: MediaId,
        _window_days: u32,
    ) -> Result<Vec<MediaId>, HistoryError> {
        self.records.fetch_add(1, Ordering::SeqCst);
        if self.fail_records {
            return Err(HistoryError::Unavailable("history offline".to_string()));
        }
        let mut seen = self.seen.lock().expect("history lock");
        let ids = seen.entry(user_id).or_default();
        ids.retain(|id| *id != media_id);
        ids.insert(0, media_id);
        Ok(ids.clone())
    }
}

#[derive(Default)]
pub struct FixedPreferences(pub HashMap<i64, StoredPreferences>);

#[async_trait]
impl PreferenceStore for FixedPreferences {
    async fn load_preferences(
        &self,
        user_id: i64,
    ) -> Result<Option<StoredPreferences>, PreferenceError> {
        Ok(self.0.get(&user_id).cloned())
    }
}

pub struct Harness {
    pub service: DailyPuzzleService,
    pub catalog: Arc<FakeCatalog>,
    pub history: Arc<RecordingHistory>,
    pub cache: CacheAside,
    pub gateway: CatalogGateway,
}

pub struct HarnessBuilder {
    catalog: FakeCatalog,
    clips: FakeClips,
    history: RecordingHistory,
    preferences: FixedPreferences,
    opening_enabled: bool,
}

impl HarnessBuilder {
    pub fn new(catalog: FakeCatalog) -> Self {
        Self {
            catalog,
            clips: FakeClips::none(),
            history: RecordingHistory::default(),
            preferences: FixedPreferences::default(),
            opening_enabled: false,
        }
    }

    pub fn clips(mut self, clips: FakeClips) -> Self {
        self.clips = clips;
        self
    }

    pub fn history(mut self, history: RecordingHistory) -> Self {
        self.history = history;
        self
    }

    pub fn preferences(mut self, preferences: FixedPreferences) -> Self {
        self.preferences = preferences;
        self
    }

    pub fn opening_enabled(mut self, enabled: bool) -> Self {
        self.opening_enabled = enabled;
        self
    }

    pub fn build(self) -> Harness {
        let config = CacheConfig::default();
        let cache = CacheAside::new(Arc::new(InMemoryCache::new(&config)), config.single_flight);

        let catalog = Arc::new(self.catalog);
        let catalog_client: Arc<dyn CatalogClient> = catalog.clone();
        let gateway = CatalogGateway::new(
            catalog_client,
            Arc::new(self.clips),
            cache.clone(),
            config.clone(),
        );

        let history = Arc::new(self.history);
        let history_store: Arc<dyn HistoryStore> = history.clone();
        let recent = RecentHistory::new(history_store, cache.clone(), 14, config.user_lists_ttl);

        let assembler = DailyAssembler::new(
            gateway.clone(),
            recent,
            Arc::new(self.preferences),
            AssemblerConfig::default(),
        );
        let service = DailyPuzzleService::new(
            assembler,
            cache.clone(),
            config.puzzle_ttl,
            self.opening_enabled,
        );

        Harness {
            service,
            catalog,
            history,
            cache,
            gateway,
        }
    }
}

/// A 64x96 gradient PNG, so every crop and blur changes the pixels.
pub fn gradient_png() -> Bytes {
    let image = RgbImage::from_fn(64, 96, |x, y| {
        image::Rgb([(x * 4) as u8, (y * 2) as u8, ((x + y) % 256) as u8])
    });
    let mut encoded = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut encoded, ImageFormat::Png)
        .expect("encode fixture png");
    Bytes::from(encoded.into_inner())
}

/// Serves [`gradient_png`] for every URL and counts requests.
#[derive(Default)]
pub struct CountingFetcher {
    pub calls: AtomicUsize,
}

#[async_trait]
impl ImageFetcher for CountingFetcher {
    async fn fetch(&self, _url: &str) -> Result<FetchedImage, ImageFetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(FetchedImage {
            bytes: gradient_png(),
            content_type: Some("image/png".to_string()),
        })
    }
}
