use crate::blobs::{CustomInfo, ExecutorConfig};
use crate::enums::{CloseType, OrderStatus, PositionRole, RunStatus, TradeSide};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The trading context cumulative figures are scoped to.
///
/// Fills and orders use (strategy, market, trading pair); executors use
/// (controller id, connector, trading pair).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupingKey {
    pub strategy: String,
    pub market: String,
    pub trading_pair: String,
}

impl GroupingKey {
    pub fn new(
        strategy: impl Into<String>,
        market: impl Into<String>,
        trading_pair: impl Into<String>,
    ) -> Self {
        Self {
            strategy: strategy.into(),
            market: market.into(),
            trading_pair: trading_pair.into(),
        }
    }

    /// Splits `BASE-QUOTE` into its assets. Pairs without a dash yield an empty quote.
    pub fn assets(&self) -> (&str, &str) {
        self.trading_pair
            .split_once('-')
            .unwrap_or((self.trading_pair.as_str(), ""))
    }
}

impl fmt::Display for GroupingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.strategy, self.market, self.trading_pair)
    }
}

/// A half-open range of normalized seconds: `start <= t < end`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Option<f64>,
    pub end: Option<f64>,
}

impl TimeRange {
    pub fn contains(&self, seconds: f64) -> bool {
        self.start.is_none_or(|start| seconds >= start) && self.end.is_none_or(|end| seconds < end)
    }
}

/// A single executed trade as recorded by a bot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeFill {
    pub source_id: String,
    pub config_file_path: String,
    pub key: GroupingKey,
    /// Normalized seconds.
    pub timestamp: f64,
    pub order_id: String,
    pub exchange_trade_id: String,
    pub side: TradeSide,
    pub price: Decimal,
    pub amount: Decimal,
    pub fee_in_quote: Decimal,
    pub position: PositionRole,
}

/// The last known state of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub source_id: String,
    pub id: String,
    pub config_file_path: String,
    pub key: GroupingKey,
    pub creation_timestamp: f64,
    pub last_update_timestamp: f64,
    pub price: Decimal,
    pub amount: Decimal,
    pub last_status: OrderStatus,
    pub position: PositionRole,
    pub exchange_order_id: Option<String>,
}

/// A strategy-owned unit of execution with its own lifecycle and PnL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Executor {
    pub source_id: String,
    pub id: String,
    pub executor_type: String,
    pub open_timestamp: f64,
    /// `None` while the executor is still active.
    pub close_timestamp: Option<f64>,
    pub close_type: Option<CloseType>,
    pub status: RunStatus,
    pub config: ExecutorConfig,
    pub custom_info: CustomInfo,
    pub net_pnl_pct: Decimal,
    pub net_pnl_quote: Decimal,
    pub cum_fees_quote: Decimal,
    pub filled_amount_quote: Decimal,
    pub is_active: bool,
    pub is_trading: bool,
    pub controller_id: String,
}

impl Executor {
    pub fn is_closed(&self) -> bool {
        self.close_timestamp.is_some()
    }

    pub fn is_profitable(&self) -> bool {
        self.net_pnl_quote > Decimal::ZERO
    }

    pub fn key(&self) -> GroupingKey {
        GroupingKey::new(
            self.controller_id.clone(),
            self.config.connector_name.clone(),
            self.config.trading_pair.clone(),
        )
    }

    /// Seconds between open and close. `None` while open.
    pub fn duration(&self) -> Option<f64> {
        self.close_timestamp.map(|close| close - self.open_timestamp)
    }

    /// The order ids the executor reported, preferring `custom_info` over `config`.
    /// `None` when this schema variant records no order ids at all.
    pub fn order_ids(&self) -> Option<&[String]> {
        self.custom_info
            .order_ids
            .as_deref()
            .or(self.config.order_ids.as_deref())
    }
}
