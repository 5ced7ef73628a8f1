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
/// Logs go to stderr so rendered output on stdout stays machine-readable.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
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

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "platter_render_cache_hit_total",
            Unit::Count,
            "Total number of distinct render keys served from cache."
        );
        describe_counter!(
            "platter_render_cache_miss_total",
            Unit::Count,
            "Total number of distinct render keys rendered after a cache miss."
        );
        describe_counter!(
            "platter_render_uncached_total",
            Unit::Count,
            "Total number of objects rendered without consulting the cache."
        );
        describe_counter!(
            "platter_render_write_error_total",
            Unit::Count,
            "Total number of failed cache write-backs after rendering."
        );
        describe_counter!(
            "platter_store_evict_total",
            Unit::Count,
            "Total number of in-memory store evictions due to capacity."
        );
        describe_histogram!(
            "platter_render_ms",
            Unit::Milliseconds,
            "Batch render latency in milliseconds."
        );
    });
}
