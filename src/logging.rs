//! Logging configuration for chatrag

use std::path::Path;

use tracing_subscriber::fmt;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Registry;

use crate::config::LoggingConfig;
use crate::Result;

const LOG_FILE_PREFIX: &str = "chatrag.log";

/// Initialize logging with console and daily-rolling file output
///
/// # Errors
/// - Log directory cannot be created
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    init_logging_with_level(&config.level, &config.directory)
}

/// Initialize logging with an explicit level and log directory
///
/// `RUST_LOG` still wins when it is set, so a single run can be made noisier
/// without touching the config file.
///
/// # Errors
/// - Log directory cannot be created
pub fn init_logging_with_level(level: &str, directory: &str) -> Result<()> {
    let logs_dir = Path::new(directory);
    if !logs_dir.exists() {
        std::fs::create_dir_all(logs_dir)?;
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{level},chatrag={level}")));

    let file_appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(non_blocking)
        .with_ansi(false);

    Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::info!("Logging initialized with level: {level}");
    tracing::info!(
        "Log files will be saved to: {}/{LOG_FILE_PREFIX}.YYYY-MM-DD",
        logs_dir.display()
    );

    // The writer thread must outlive every span; the process owns it until exit.
    std::mem::forget(guard);

    Ok(())
}

/// Initialize console-only logging, used by tests and one-shot CLI runs
pub fn init_simple_logging(level: tracing::Level) -> Result<()> {
    // A second init in the same process (parallel tests) is not an error.
    let _ = tracing_subscriber::fmt()
        .with_target(true)
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
    Ok(())
}
