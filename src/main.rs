use analytics::{
    summarize, ExecutorLinker, Frame, IntoFrame, PerformanceMetrics, TradeFillProcessor,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use configuration::{init_logging, load_config, Config, OutputFormat};
use database::{
    connect, RecordFilter, SourceAggregator, SourceExclusion, SourceStatus, SqliteRecordSource,
    TableCheck, TableKind,
};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// The main entry point for the botlens analysis tool.
#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; it only carries optional overrides.
    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let cli = Cli::parse();

    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    let _log_guard = init_logging(&config.logging)?;
    let format = cli.format.unwrap_or(config.output.format);

    let (aggregator, unopened) = open_sources(&config).await;

    // Execute the appropriate command
    match cli.command {
        Commands::Health => handle_health(&aggregator, &unopened, format).await,
        Commands::Report(args) => handle_report(args, &config, &aggregator, unopened, format).await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Offline performance analysis over the databases of one or more trading bots.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, short, global = true, default_value = "botlens.toml")]
    config: PathBuf,

    /// Output format. Defaults to `output.format` from the configuration.
    #[arg(long, value_enum, global = true)]
    format: Option<OutputFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe every configured source and print per-table status.
    Health,
    /// Run the full analysis over all healthy sources.
    Report(ReportArgs),
}

#[derive(Parser)]
struct ReportArgs {
    /// Only analyze this trading pair (e.g., "BTC-USDT"). Overrides the configuration.
    #[arg(long)]
    trading_pair: Option<String>,

    /// Only analyze executors of this controller. Overrides the configuration.
    #[arg(long)]
    controller_id: Option<String>,

    /// Also print every processed fill.
    #[arg(long)]
    fills: bool,
}

// ==============================================================================
// Source Setup
// ==============================================================================

/// Opens every configured database. Sources that cannot be opened are
/// returned as exclusions rather than aborting the run.
async fn open_sources(config: &Config) -> (SourceAggregator, Vec<SourceExclusion>) {
    let mut aggregator = SourceAggregator::default();
    let mut unopened = Vec::new();
    let probe_timeout = config.analysis.probe_timeout();

    for source in &config.sources {
        match connect(&source.path).await {
            Ok(pool) => {
                let record_source =
                    SqliteRecordSource::new(source.id.clone(), pool).with_probe_timeout(probe_timeout);
                aggregator.push(Arc::new(record_source));
            }
            Err(e) => {
                tracing::warn!(source_id = %source.id, path = %source.path.display(), error = %e, "Could not open source.");
                unopened.push(SourceExclusion {
                    source_id: source.id.clone(),
                    tables: TableKind::ALL.to_vec(),
                    reason: e.to_string(),
                });
            }
        }
    }

    tracing::info!(opened = aggregator.len(), failed = unopened.len(), "Sources opened.");
    (aggregator, unopened)
}

// ==============================================================================
// Health Command Logic
// ==============================================================================

async fn handle_health(
    aggregator: &SourceAggregator,
    unopened: &[SourceExclusion],
    format: OutputFormat,
) -> Result<()> {
    let mut statuses = aggregator.health().await;
    statuses.extend(unopened.iter().map(|exclusion| {
        let check = TableCheck::Unreadable {
            reason: exclusion.reason.clone(),
        };
        SourceStatus {
            source_id: exclusion.source_id.clone(),
            fills: check.clone(),
            orders: check.clone(),
            executors: check,
        }
    }));
    statuses.sort_by(|a, b| a.source_id.cmp(&b.source_id));

    render(&[("Source Health", health_frame(&statuses))], format)
}

fn health_frame(statuses: &[SourceStatus]) -> Frame {
    let mut frame = Frame::new(&["source_id", "healthy", "fills", "orders", "executors"]);
    for status in statuses {
        let mut row = vec![
            Value::String(status.source_id.clone()),
            Value::Bool(status.is_healthy()),
        ];
        row.extend(TableKind::ALL.iter().map(|table| Value::String(describe(status.check(*table)))));
        frame.push_row(row);
    }
    frame
}

fn describe(check: &TableCheck) -> String {
    match check {
        TableCheck::Readable { rows } => format!("{rows} rows"),
        TableCheck::Empty => "empty".to_string(),
        TableCheck::Unreadable { reason } => format!("unreadable: {reason}"),
    }
}

// ==============================================================================
// Report Command Logic
// ==============================================================================

/// Handles the orchestration of the full analysis pipeline.
async fn handle_report(
    args: ReportArgs,
    config: &Config,
    aggregator: &SourceAggregator,
    unopened: Vec<SourceExclusion>,
    format: OutputFormat,
) -> Result<()> {
    let analysis = &config.analysis;
    let filter = RecordFilter {
        time_range: analysis.time_range()?,
        config_file_path: analysis.config_file_path.clone(),
        controller_id: args.controller_id.or_else(|| analysis.controller_id.clone()),
        trading_pair: args.trading_pair.or_else(|| analysis.trading_pair.clone()),
    };

    let mut records = aggregator.union(&filter).await;
    records.excluded.extend(unopened);
    records.excluded.sort_by(|a, b| a.source_id.cmp(&b.source_id));
    for exclusion in &records.excluded {
        tracing::warn!(source_id = %exclusion.source_id, reason = %exclusion.reason, "Source excluded from the report.");
    }

    // --- Fill attribution ---
    let processed = TradeFillProcessor::new()
        .process(&records.fills)
        .context("Failed to attribute PnL to fills")?;
    let summaries = summarize(&processed);

    // --- Executor linkage ---
    let linker = ExecutorLinker::new();
    let links = linker.link(&records.executors, &records.orders);
    let levels = linker.levels(&records.executors, &links);
    let level_stats = linker.level_stats(&records.executors, &levels);

    // --- Performance ---
    let metrics = PerformanceMetrics::new(analysis.initial_portfolio_value);
    let mut snapshots = vec![metrics.snapshot(&records.executors)];
    snapshots.extend(metrics.by_group(&records.executors));

    tracing::info!(
        sources = records.included.len(),
        fills = processed.len(),
        executors = records.executors.len(),
        links = links.len(),
        "Report complete."
    );

    let mut frames = vec![("Sources", sources_frame(&records.included, &records.excluded))];
    if args.fills {
        frames.push(("Fills", processed.to_frame()));
    }
    frames.extend([
        ("Fill Summary", summaries.to_frame()),
        ("Executor Levels", levels.to_frame()),
        ("Level Statistics", level_stats.to_frame()),
        ("Performance", snapshots.to_frame()),
    ]);

    render(&frames, format)
}

fn sources_frame(included: &[String], excluded: &[SourceExclusion]) -> Frame {
    let mut frame = Frame::new(&["source_id", "included", "failing_tables", "reason"]);
    for id in included {
        frame.push_row(vec![Value::String(id.clone()), Value::Bool(true)]);
    }
    for exclusion in excluded {
        let tables: Vec<&str> = exclusion.tables.iter().map(|t| t.as_str()).collect();
        frame.push_row(vec![
            Value::String(exclusion.source_id.clone()),
            Value::Bool(false),
            Value::String(tables.join(", ")),
            Value::String(exclusion.reason.clone()),
        ]);
    }
    frame
}

// ==============================================================================
// Output
// ==============================================================================

fn render(frames: &[(&str, Frame)], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let document: serde_json::Map<String, Value> = frames
                .iter()
                .map(|(title, frame)| {
                    let records = frame.to_records().into_iter().map(Value::Object).collect();
                    (title.to_string(), Value::Array(records))
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
        OutputFormat::Table => {
            for (title, frame) in frames {
                println!("\n--- {title} ---");
                if frame.is_empty() {
                    println!("(no rows)");
                    continue;
                }
                println!("{}", table(frame));
            }
        }
    }
    Ok(())
}

fn table(frame: &Frame) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(frame.columns.iter().cloned());
    for row in &frame.rows {
        table.add_row(row.iter().map(cell));
    }
    table
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
