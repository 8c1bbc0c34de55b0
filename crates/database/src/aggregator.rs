use crate::error::DbError;
use crate::source::{RecordFilter, RecordSource, SourceStatus, TableKind};
use core_types::{Executor, Order, TradeFill};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;

/// Why a source was left out of a union.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceExclusion {
    pub source_id: String,
    pub tables: Vec<TableKind>,
    pub reason: String,
}

/// Records from every healthy source, tagged and ordered by `source_id`.
#[derive(Debug, Clone, Default)]
pub struct AggregatedRecords {
    pub fills: Vec<TradeFill>,
    pub orders: Vec<Order>,
    pub executors: Vec<Executor>,
    pub included: Vec<String>,
    pub excluded: Vec<SourceExclusion>,
}

struct SourceRecords {
    source_id: String,
    fills: Vec<TradeFill>,
    orders: Vec<Order>,
    executors: Vec<Executor>,
}

/// Fans out over a set of sources supplied by the caller.
///
/// The aggregator owns no global state; two aggregators over different source
/// sets can run side by side.
#[derive(Clone, Default)]
pub struct SourceAggregator {
    sources: Vec<Arc<dyn RecordSource>>,
}

impl SourceAggregator {
    pub fn new(sources: Vec<Arc<dyn RecordSource>>) -> Self {
        Self { sources }
    }

    pub fn push(&mut self, source: Arc<dyn RecordSource>) {
        self.sources.push(source);
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Probes every source concurrently, sorted by source id.
    pub async fn health(&self) -> Vec<SourceStatus> {
        let mut statuses = join_all(self.sources.iter().map(|s| s.health())).await;
        statuses.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        statuses
    }

    /// Reads all healthy sources and concatenates their records.
    ///
    /// Sources are probed and read concurrently, then merged in `source_id`
    /// order so every source's chronological order survives intact. A source
    /// that fails its probe, or a later read, is reported in `excluded` and
    /// contributes nothing. Dropping the returned future discards all work.
    pub async fn union(&self, filter: &RecordFilter) -> AggregatedRecords {
        let statuses = join_all(self.sources.iter().map(|s| s.health())).await;

        let mut excluded = Vec::new();
        let mut healthy = Vec::new();
        for (source, status) in self.sources.iter().zip(statuses) {
            if status.is_healthy() {
                healthy.push(source.clone());
            } else {
                let tables = status.failing_tables();
                tracing::warn!(
                    source = %status.source_id,
                    tables = ?tables,
                    "Excluding unhealthy source from union."
                );
                excluded.push(SourceExclusion {
                    source_id: status.source_id.clone(),
                    reason: describe_failures(&status, &tables),
                    tables,
                });
            }
        }

        let reads = join_all(healthy.iter().map(|s| read_all(s.as_ref(), filter))).await;

        let mut collected = Vec::with_capacity(reads.len());
        for (source, result) in healthy.iter().zip(reads) {
            match result {
                Ok(records) => collected.push(records),
                Err((table, e)) => {
                    tracing::warn!(source = %source.id(), %table, error = %e, "Read failed after a healthy probe.");
                    excluded.push(SourceExclusion {
                        source_id: source.id().to_string(),
                        tables: vec![table],
                        reason: e.to_string(),
                    });
                }
            }
        }

        // Stable sort: each source's internal order is untouched.
        collected.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        excluded.sort_by(|a, b| a.source_id.cmp(&b.source_id));

        let mut aggregated = AggregatedRecords {
            excluded,
            ..AggregatedRecords::default()
        };
        for records in collected {
            tracing::debug!(
                source = %records.source_id,
                fills = records.fills.len(),
                orders = records.orders.len(),
                executors = records.executors.len(),
                "Merged source records."
            );
            aggregated.included.push(records.source_id);
            aggregated.fills.extend(records.fills);
            aggregated.orders.extend(records.orders);
            aggregated.executors.extend(records.executors);
        }

        tracing::info!(
            included = aggregated.included.len(),
            excluded = aggregated.excluded.len(),
            fills = aggregated.fills.len(),
            orders = aggregated.orders.len(),
            executors = aggregated.executors.len(),
            "Union complete."
        );
        aggregated
    }
}

async fn read_all(
    source: &dyn RecordSource,
    filter: &RecordFilter,
) -> Result<SourceRecords, (TableKind, DbError)> {
    let (fills, orders, executors) = tokio::join!(
        source.read_fills(filter),
        source.read_orders(filter),
        source.read_executors(filter),
    );
    Ok(SourceRecords {
        source_id: source.id().to_string(),
        fills: fills.map_err(|e| (TableKind::Fills, e))?,
        orders: orders.map_err(|e| (TableKind::Orders, e))?,
        executors: executors.map_err(|e| (TableKind::Executors, e))?,
    })
}

fn describe_failures(status: &SourceStatus, tables: &[TableKind]) -> String {
    tables
        .iter()
        .map(|t| match status.check(*t) {
            crate::TableCheck::Unreadable { reason } => format!("{t}: {reason}"),
            crate::TableCheck::Empty => format!("{t}: empty"),
            crate::TableCheck::Readable { .. } => format!("{t}: ok"),
        })
        .collect::<Vec<_>>()
        .join("; ")
}
