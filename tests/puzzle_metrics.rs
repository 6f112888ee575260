mod support;

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use bytes::Bytes;
use guesssenpai::application::imaging::RenderPool;
use guesssenpai::application::poster_image::PosterImageService;
use guesssenpai::cache::{CacheBackend, CacheConfig, InMemoryCache};
use guesssenpai::domain::types::MediaId;
use metrics_util::debugging::DebuggingRecorder;

use support::{
    CountingFetcher, DAY, FakeCatalog, HarnessBuilder, RecordingHistory, popular, user,
};

#[tokio::test]
async fn puzzle_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    // Puzzle miss, hit and history write failures.
    let harness = HarnessBuilder::new(FakeCatalog::new(popular()))
        .history(RecordingHistory::failing())
        .build();
    let viewer = user();
    harness
        .service
        .daily_puzzle(DAY, Some(&viewer), false)
        .await
        .expect("fresh assembly");
    harness
        .service
        .daily_puzzle(DAY, Some(&viewer), false)
        .await
        .expect("cached assembly");

    // Assembly failure.
    let failing = FakeCatalog::new(popular());
    failing.fail_popular.store(true, Ordering::SeqCst);
    let broken = HarnessBuilder::new(failing).build();
    assert!(broken.service.daily_puzzle(DAY, None, false).await.is_err());

    // Poster render latency.
    let posters = PosterImageService::new(
        harness.gateway.clone(),
        Arc::new(CountingFetcher::default()),
        harness.cache.clone(),
        RenderPool::new(NonZeroUsize::MIN),
        Duration::from_secs(60),
    );
    posters
        .poster_image(MediaId(101), 1)
        .await
        .expect("poster variant");

    // Backend eviction.
    let tiny = InMemoryCache::new(&CacheConfig {
        capacity: 1,
        ..CacheConfig::default()
    });
    let ttl = Duration::from_secs(60);
    tiny.set("first", Bytes::from_static(b"1"), ttl)
        .await
        .expect("first set");
    tiny.set("second", Bytes::from_static(b"2"), ttl)
        .await
        .expect("second set");

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "guesssenpai_cache_hit_total",
        "guesssenpai_cache_miss_total",
        "guesssenpai_cache_evict_total",
        "guesssenpai_puzzle_cache_hit_total",
        "guesssenpai_puzzle_cache_miss_total",
        "guesssenpai_assembly_ms",
        "guesssenpai_assembly_failure_total",
        "guesssenpai_history_record_failure_total",
        "guesssenpai_poster_render_ms",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
