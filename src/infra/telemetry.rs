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

    // Logs go to stderr so `generate --output -` can stream the PDF on stdout.
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
            "dailyoffice_cache_hit_total",
            Unit::Count,
            "Artifact lookups answered from the cache."
        );
        describe_counter!(
            "dailyoffice_cache_miss_total",
            Unit::Count,
            "Artifact lookups that found nothing cached."
        );
        describe_counter!(
            "dailyoffice_cache_read_error_total",
            Unit::Count,
            "Artifact lookups that failed and were treated as misses."
        );
        describe_counter!(
            "dailyoffice_cache_write_error_total",
            Unit::Count,
            "Best-effort artifact writes that failed."
        );
        describe_counter!(
            "dailyoffice_generation_total",
            Unit::Count,
            "Generator invocations by path and outcome."
        );
        describe_histogram!(
            "dailyoffice_generation_ms",
            Unit::Milliseconds,
            "Generator invocation latency in milliseconds."
        );
        describe_counter!(
            "dailyoffice_jobs_created_total",
            Unit::Count,
            "Asynchronous generation jobs created."
        );
        describe_counter!(
            "dailyoffice_jobs_finished_total",
            Unit::Count,
            "Asynchronous generation jobs reaching a terminal status."
        );
    });
}
