use crate::error::DbError;
use crate::source::{sort_chronologically, RecordFilter, RecordSource, TableKind};
use async_trait::async_trait;
use core_types::{Executor, Order, TradeFill};
use std::collections::HashSet;

/// A `RecordSource` over records that were already decoded elsewhere.
///
/// Used when the orchestrating application has loaded records through its own
/// channel, and in tests. Tables can be marked unreadable to simulate a
/// corrupted store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordSource {
    id: String,
    fills: Vec<TradeFill>,
    orders: Vec<Order>,
    executors: Vec<Executor>,
    broken: HashSet<TableKind>,
}

impl InMemoryRecordSource {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Records are re-stamped with this source's id.
    pub fn with_fills(mut self, fills: Vec<TradeFill>) -> Self {
        self.fills = fills
            .into_iter()
            .map(|mut f| {
                f.source_id = self.id.clone();
                f
            })
            .collect();
        self
    }

    pub fn with_orders(mut self, orders: Vec<Order>) -> Self {
        self.orders = orders
            .into_iter()
            .map(|mut o| {
                o.source_id = self.id.clone();
                o
            })
            .collect();
        self
    }

    pub fn with_executors(mut self, executors: Vec<Executor>) -> Self {
        self.executors = executors
            .into_iter()
            .map(|mut e| {
                e.source_id = self.id.clone();
                e
            })
            .collect();
        self
    }

    pub fn with_broken_table(mut self, table: TableKind) -> Self {
        self.broken.insert(table);
        self
    }

    fn guard(&self, table: TableKind) -> Result<(), DbError> {
        if self.broken.contains(&table) {
            return Err(DbError::SourceUnhealthy {
                source_id: self.id.clone(),
                tables: vec![table],
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RecordSource for InMemoryRecordSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn read_fills(&self, filter: &RecordFilter) -> Result<Vec<TradeFill>, DbError> {
        self.guard(TableKind::Fills)?;
        let mut fills: Vec<TradeFill> = self
            .fills
            .iter()
            .filter(|f| filter.matches_fill(f))
            .cloned()
            .collect();
        sort_chronologically(&mut fills, |f| f.timestamp);
        Ok(fills)
    }

    async fn read_orders(&self, filter: &RecordFilter) -> Result<Vec<Order>, DbError> {
        self.guard(TableKind::Orders)?;
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|o| filter.matches_order(o))
            .cloned()
            .collect();
        sort_chronologically(&mut orders, |o| o.creation_timestamp);
        Ok(orders)
    }

    async fn read_executors(&self, filter: &RecordFilter) -> Result<Vec<Executor>, DbError> {
        self.guard(TableKind::Executors)?;
        let mut executors: Vec<Executor> = self
            .executors
            .iter()
            .filter(|e| filter.matches_executor(e))
            .cloned()
            .collect();
        sort_chronologically(&mut executors, |e| e.open_timestamp);
        Ok(executors)
    }
}
