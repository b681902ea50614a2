use crate::error::{Error, Result};
use crate::options::{LogLevel, Role};
use std::sync::Once;
use std::time::{Duration, Instant};
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static INIT: Once = Once::new();

/// Crates whose output follows the configured level.
const PLUGIN_TARGETS: [&str; 2] = ["veloguard_plugin_core", "veloguard_plugin"];

/// Map a plugin log level to a tracing level. `None` disables logging.
pub fn tracing_level(level: LogLevel) -> Option<Level> {
    match level {
        LogLevel::Debug => Some(Level::DEBUG),
        LogLevel::Info => Some(Level::INFO),
        LogLevel::Warning => Some(Level::WARN),
        LogLevel::Error => Some(Level::ERROR),
        LogLevel::None => None,
    }
}

/// Initialize logging system
pub fn init_logging(level: LogLevel) -> Result<()> {
    let mut result = Ok(());

    INIT.call_once(|| {
        result = init_logging_inner(level);
    });

    result
}

fn init_logging_inner(level: LogLevel) -> Result<()> {
    let Some(tracing_level) = tracing_level(level) else {
        return Ok(());
    };

    let mut filter = EnvFilter::from_default_env();
    for target in PLUGIN_TARGETS {
        filter = filter.add_directive(
            format!("{}={}", target, tracing_level)
                .parse()
                .map_err(|e| Error::config(format!("Invalid log directive: {}", e)))?,
        );
    }

    // SIP003 hosts capture stderr; stdout may carry the dumped config.
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .compact()
        .with_filter(filter);

    if tracing_subscriber::registry()
        .with(fmt_layer)
        .try_init()
        .is_ok()
    {
        tracing::debug!("Logging initialized at level: {:?}", level);
    }
    Ok(())
}

/// Log an error with context
pub fn log_error(error: &Error, context: Option<&str>) {
    if let Some(ctx) = context {
        tracing::error!("{}: {}", ctx, error);
    } else {
        tracing::error!("{}", error);
    }

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        tracing::error!("  caused by: {}", cause);
        source = cause.source();
    }
}

/// Report that the plugin is up and which side of the tunnel it serves.
pub fn log_started(role: Role, handoff: &str) {
    tracing::info!("Plugin running as {}, configuration handed to {}", role.as_str(), handoff);
}

/// Report where the effective options came from.
pub fn log_option_sources(host_keys: Option<usize>) {
    match host_keys {
        Some(count) => tracing::info!(
            "Options merged from command line and SS_PLUGIN_OPTIONS ({} keys)",
            count
        ),
        None => tracing::info!("Options taken from command line only, no SIP003 host environment"),
    }
}

/// Times one resolution stage and reports it at debug level when finished.
pub struct StageTimer {
    stage: &'static str,
    started: Instant,
}

impl StageTimer {
    pub fn start(stage: &'static str) -> Self {
        Self {
            stage,
            started: Instant::now(),
        }
    }

    pub fn finish(self) -> Duration {
        let elapsed = self.started.elapsed();
        tracing::debug!(stage = self.stage, ?elapsed, "stage finished");
        elapsed
    }
}
