use crate::config::LoggingConfig;
use crate::error::{BrokerError, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, time::OffsetTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Initialize logging with a daily rolling file under `config.directory`.
///
/// The returned guard flushes the file writer when dropped, so the caller must
/// keep it alive for the life of the process. `RUST_LOG` takes precedence over
/// `config.level`. Audit events (launch rejections, grant changes) use the
/// `audit` target and can be filtered with `RUST_LOG=audit=info`.
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&config.directory)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(&config.file_prefix)
        .filename_suffix("log")
        .build(&config.directory)
        .map_err(|e| BrokerError::Logging(e.to_string()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Local offset detection fails in some multi-threaded environments
    let timer = OffsetTime::local_rfc_3339().unwrap_or_else(|_| {
        OffsetTime::new(
            time::UtcOffset::UTC,
            time::format_description::well_known::Rfc3339,
        )
    });

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_timer(timer.clone())
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    let console_layer = config.console.then(|| {
        fmt::layer()
            .with_timer(timer)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_file(false)
            .with_line_number(false)
    });

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| BrokerError::Logging(e.to_string()))?;

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .with(filter)
        .try_init()
        .map_err(|e| BrokerError::Logging(e.to_string()))?;

    tracing::info!("Logging system initialized");
    tracing::info!("Log files are being written to: {:?}", config.directory);

    Ok(guard)
}

pub fn log_shutdown() {
    tracing::info!("Broker shutting down");
    tracing::info!("=== Broker shutdown complete ===");
}
