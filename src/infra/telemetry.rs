use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
///
/// Events go to stderr; stdout carries command output.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .with_writer(std::io::stderr)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .with_writer(std::io::stderr)
            .compact()
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "guesssenpai_cache_hit_total",
            Unit::Count,
            "Cache-aside reads served from cache, by key namespace."
        );
        describe_counter!(
            "guesssenpai_cache_miss_total",
            Unit::Count,
            "Cache-aside reads that ran their producer, by key namespace."
        );
        describe_counter!(
            "guesssenpai_cache_coalesced_total",
            Unit::Count,
            "Misses answered by a concurrent producer for the same key."
        );
        describe_counter!(
            "guesssenpai_cache_evict_total",
            Unit::Count,
            "In-process cache evictions due to capacity."
        );
        describe_counter!(
            "guesssenpai_puzzle_cache_hit_total",
            Unit::Count,
            "Daily puzzle requests answered from cache."
        );
        describe_counter!(
            "guesssenpai_puzzle_cache_miss_total",
            Unit::Count,
            "Daily puzzle requests that assembled a fresh response."
        );
        describe_histogram!(
            "guesssenpai_assembly_ms",
            Unit::Milliseconds,
            "Daily puzzle assembly latency in milliseconds."
        );
        describe_counter!(
            "guesssenpai_assembly_failure_total",
            Unit::Count,
            "Daily puzzle assemblies that produced no response."
        );
        describe_histogram!(
            "guesssenpai_poster_render_ms",
            Unit::Milliseconds,
            "Poster variant render latency in milliseconds."
        );
        describe_counter!(
            "guesssenpai_history_record_failure_total",
            Unit::Count,
            "Seen-media history writes that failed."
        );
    });
}
