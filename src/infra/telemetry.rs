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
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
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
            "shardpress_cache_hit_total",
            Unit::Count,
            "Cache hits, labelled by cache variant."
        );
        describe_counter!(
            "shardpress_cache_miss_total",
            Unit::Count,
            "Cache misses, labelled by cache variant."
        );
        describe_counter!(
            "shardpress_cache_evict_total",
            Unit::Count,
            "Comment listings evicted by the access-index ceiling."
        );
        describe_counter!(
            "shardpress_cache_memory_evict_total",
            Unit::Count,
            "Entries evicted from the in-memory store due to capacity."
        );
        describe_counter!(
            "shardpress_cache_degraded_total",
            Unit::Count,
            "Cache operations skipped because the store was unavailable."
        );
        describe_counter!(
            "shardpress_replication_published_total",
            Unit::Count,
            "Replication events enqueued after a regional commit."
        );
        describe_counter!(
            "shardpress_replication_publish_failed_total",
            Unit::Count,
            "Replication events that could not be enqueued."
        );
        describe_counter!(
            "shardpress_replication_committed_total",
            Unit::Count,
            "Replicated articles committed to the global shard."
        );
        describe_counter!(
            "shardpress_replication_requeued_total",
            Unit::Count,
            "Replication deliveries failed and left for redelivery."
        );
        describe_counter!(
            "shardpress_replication_dropped_total",
            Unit::Count,
            "Replication messages acknowledged without effect (null or undecodable)."
        );
        describe_counter!(
            "shardpress_fanout_shard_failed_total",
            Unit::Count,
            "Shards skipped during a fan-out read."
        );
        describe_counter!(
            "shardpress_moderation_rejected_total",
            Unit::Count,
            "Writes rejected by the content gate."
        );
        describe_counter!(
            "shardpress_moderation_unavailable_total",
            Unit::Count,
            "Writes rejected because the content gate was unavailable."
        );
        describe_histogram!(
            "shardpress_refresh_ms",
            Unit::Milliseconds,
            "Duration of one article cache refresh pass in milliseconds."
        );
    });
}
