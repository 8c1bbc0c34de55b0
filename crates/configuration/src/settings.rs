use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::PathBuf;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// The bot databases to aggregate. At least one is required.
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// One bot instance's SQLite database.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Identifier stamped on every record read from this source. Must be unique.
    pub id: String,
    pub path: PathBuf,
}

/// Parameters for a single analysis run.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// The capital base relative metrics (drawdown %, Sharpe) are measured against.
    #[serde(default = "default_initial_portfolio_value")]
    pub initial_portfolio_value: Decimal,
    /// Inclusive lower bound, as a raw timestamp in any supported precision.
    pub start: Option<f64>,
    /// Exclusive upper bound, as a raw timestamp in any supported precision.
    pub end: Option<f64>,
    pub trading_pair: Option<String>,
    pub config_file_path: Option<String>,
    pub controller_id: Option<String>,
    /// Upper bound for each table probe of a source health check.
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

/// Contains parameters for the tracing subscriber.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive. `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// When set, logs are also written to a daily rolling file in this directory.
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

/// How result frames are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

fn default_initial_portfolio_value() -> Decimal {
    Decimal::from(10_000)
}

fn default_probe_timeout_secs() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

// --- Default Implementations ---
// This allows a user to omit the `[analysis]` and `[logging]` sections from
// their toml and still have it work with sensible defaults.

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            initial_portfolio_value: default_initial_portfolio_value(),
            start: None,
            end: None,
            trading_pair: None,
            config_file_path: None,
            controller_id: None,
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
        }
    }
}
