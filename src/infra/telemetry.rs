use tracing::level_filters::LevelFilter;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter,
    fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

/// Dependencies that are chatty at `info`. Placed before `RUST_LOG`, so an
/// env directive for the same target replaces them.
const QUIET_TARGETS: &[&str] = &["sqlx::query=warn", "redis=warn", "hyper=warn"];

/// Installs the global subscriber: level filter, error span capture and the
/// compact or JSON formatter picked in `[logging]`.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = filter_for(logging.level, rust_log.as_deref());

    let formatter = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default())
        .with(formatter)
        .try_init()
        .map_err(|err| InfraError::Telemetry(format!("subscriber already installed: {err}")))
}

/// Builds the level filter from the configured default, the quiet targets and
/// the raw `RUST_LOG` value. Later directives win for the same target.
fn filter_for(level: LevelFilter, rust_log: Option<&str>) -> EnvFilter {
    let mut directives = QUIET_TARGETS.join(",");
    if let Some(env) = rust_log.map(str::trim).filter(|env| !env.is_empty()) {
        directives.push(',');
        directives.push_str(env);
    }
    EnvFilter::builder()
        .with_default_directive(level.into())
        .parse_lossy(directives)
}
