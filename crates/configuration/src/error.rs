use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read botlens configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Invalid botlens configuration: {0}")]
    ValidationError(String),

    #[error("Failed to initialize logging: {0}")]
    LoggingError(String),
}
