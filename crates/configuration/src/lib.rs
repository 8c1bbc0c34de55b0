use crate::error::ConfigError;
use core_types::{normalize, TimeRange};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use logging::init_logging;
pub use settings::{AnalysisConfig, Config, LoggingConfig, OutputConfig, OutputFormat, SourceConfig};

/// Prefix for environment overrides, e.g. `BOTLENS__ANALYSIS__INITIAL_PORTFOLIO_VALUE`.
pub const ENV_PREFIX: &str = "BOTLENS";

/// Loads and validates the application configuration.
///
/// Values come from the TOML file at `path`, overridden by `BOTLENS__`-prefixed
/// environment variables (`__` separates nested keys).
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path.as_ref()).format(config::FileFormat::Toml))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    Ok(config)
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one [[sources]] entry is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.id.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "source ids must not be empty".to_string(),
                ));
            }
            if !seen.insert(source.id.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate source id '{}'",
                    source.id
                )));
            }
        }

        if self.analysis.probe_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "analysis.probe_timeout_secs must be positive".to_string(),
            ));
        }

        let range = self.analysis.time_range()?;
        if let (Some(start), Some(end)) = (range.start, range.end) {
            if start >= end {
                return Err(ConfigError::ValidationError(format!(
                    "analysis.start ({start}) must be before analysis.end ({end})"
                )));
            }
        }

        Ok(())
    }
}

impl settings::AnalysisConfig {
    /// The configured window in normalized seconds.
    pub fn time_range(&self) -> Result<TimeRange, ConfigError> {
        let bound = |name: &str, raw: Option<f64>| {
            raw.map(|value| {
                normalize(value)
                    .map_err(|e| ConfigError::ValidationError(format!("analysis.{name}: {e}")))
            })
            .transpose()
        };
        Ok(TimeRange {
            start: bound("start", self.start)?,
            end: bound("end", self.end)?,
        })
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}
