use crate::error::DbError;
use async_trait::async_trait;
use core_types::{Executor, Order, TimeRange, TradeFill};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// How long a health probe waits for one table before declaring it unreadable.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// The three logical tables every bot store holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    Fills,
    Orders,
    Executors,
}

impl TableKind {
    pub const ALL: [TableKind; 3] = [TableKind::Fills, TableKind::Orders, TableKind::Executors];

    pub fn as_str(&self) -> &'static str {
        match self {
            TableKind::Fills => "fills",
            TableKind::Orders => "orders",
            TableKind::Executors => "executors",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Narrows what a read returns. All filters apply to normalized values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub time_range: TimeRange,
    /// Instance scope for fills and orders.
    pub config_file_path: Option<String>,
    /// Instance scope for executors.
    pub controller_id: Option<String>,
    pub trading_pair: Option<String>,
}

impl RecordFilter {
    pub fn matches_fill(&self, fill: &TradeFill) -> bool {
        self.time_range.contains(fill.timestamp)
            && matches_opt(&self.config_file_path, &fill.config_file_path)
            && matches_opt(&self.trading_pair, &fill.key.trading_pair)
    }

    pub fn matches_order(&self, order: &Order) -> bool {
        self.time_range.contains(order.creation_timestamp)
            && matches_opt(&self.config_file_path, &order.config_file_path)
            && matches_opt(&self.trading_pair, &order.key.trading_pair)
    }

    pub fn matches_executor(&self, executor: &Executor) -> bool {
        self.time_range.contains(executor.open_timestamp)
            && matches_opt(&self.controller_id, &executor.controller_id)
            && matches_opt(&self.trading_pair, &executor.config.trading_pair)
    }
}

fn matches_opt(wanted: &Option<String>, actual: &str) -> bool {
    wanted.as_deref().is_none_or(|w| w == actual)
}

/// Outcome of probing one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TableCheck {
    Readable { rows: usize },
    Empty,
    Unreadable { reason: String },
}

impl TableCheck {
    pub fn is_healthy(&self) -> bool {
        matches!(self, TableCheck::Readable { .. })
    }

    fn from_read<T>(result: Result<Vec<T>, DbError>) -> Self {
        match result {
            Ok(rows) if rows.is_empty() => TableCheck::Empty,
            Ok(rows) => TableCheck::Readable { rows: rows.len() },
            Err(e) => TableCheck::Unreadable {
                reason: e.to_string(),
            },
        }
    }
}

/// Per-table readability of one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceStatus {
    pub source_id: String,
    pub fills: TableCheck,
    pub orders: TableCheck,
    pub executors: TableCheck,
}

impl SourceStatus {
    pub fn check(&self, table: TableKind) -> &TableCheck {
        match table {
            TableKind::Fills => &self.fills,
            TableKind::Orders => &self.orders,
            TableKind::Executors => &self.executors,
        }
    }

    /// Tables that failed their check, in a fixed order.
    pub fn failing_tables(&self) -> Vec<TableKind> {
        TableKind::ALL
            .into_iter()
            .filter(|t| !self.check(*t).is_healthy())
            .collect()
    }

    pub fn is_healthy(&self) -> bool {
        self.failing_tables().is_empty()
    }
}

/// One persisted store of a single bot instance.
///
/// Every read normalizes timestamps and decodes enums and blobs before
/// returning. A record that cannot be decoded fails the whole read.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Identifier stamped onto every record this source emits.
    fn id(&self) -> &str;

    async fn read_fills(&self, filter: &RecordFilter) -> Result<Vec<TradeFill>, DbError>;

    async fn read_orders(&self, filter: &RecordFilter) -> Result<Vec<Order>, DbError>;

    async fn read_executors(&self, filter: &RecordFilter) -> Result<Vec<Executor>, DbError>;

    fn probe_timeout(&self) -> Duration {
        DEFAULT_PROBE_TIMEOUT
    }

    /// Reads every table with an empty filter and reports on each independently.
    async fn health(&self) -> SourceStatus {
        let filter = RecordFilter::default();
        let timeout = self.probe_timeout();

        let (fills, orders, executors) = tokio::join!(
            bounded(TableKind::Fills, timeout, self.read_fills(&filter)),
            bounded(TableKind::Orders, timeout, self.read_orders(&filter)),
            bounded(TableKind::Executors, timeout, self.read_executors(&filter)),
        );

        SourceStatus {
            source_id: self.id().to_string(),
            fills: TableCheck::from_read(fills),
            orders: TableCheck::from_read(orders),
            executors: TableCheck::from_read(executors),
        }
    }
}

async fn bounded<T, F>(table: TableKind, timeout: Duration, read: F) -> Result<Vec<T>, DbError>
where
    F: Future<Output = Result<Vec<T>, DbError>>,
{
    tokio::time::timeout(timeout, read)
        .await
        .map_err(|_| DbError::ProbeTimedOut(table))?
}

/// Stable-sorts records by their normalized timestamp, keeping storage order for ties.
pub(crate) fn sort_chronologically<T>(records: &mut [T], timestamp: impl Fn(&T) -> f64) {
    records.sort_by(|a, b| timestamp(a).total_cmp(&timestamp(b)));
}
