use crate::error::ConfigError;
use crate::settings::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

const LOG_FILE_PREFIX: &str = "botlens.log";

/// Installs the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` when set, otherwise from `logging.level`.
/// With a `logging.directory`, events are mirrored to a daily rolling file; the
/// returned guard must be held for as long as that file should receive output.
pub fn init_logging(logging: &LoggingConfig) -> Result<Option<WorkerGuard>, ConfigError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|e| ConfigError::LoggingError(format!("invalid level '{}': {e}", logging.level)))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match &logging.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (file_writer, guard) = tracing_appender::non_blocking(appender);
            builder
                .with_writer(std::io::stderr.and(file_writer))
                .try_init()
                .map_err(|e| ConfigError::LoggingError(e.to_string()))?;
            Ok(Some(guard))
        }
        None => {
            builder
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|e| ConfigError::LoggingError(e.to_string()))?;
            Ok(None)
        }
    }
}
