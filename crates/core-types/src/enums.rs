use serde::{Deserialize, Serialize};

/// The side of a fill or executor, as recorded by the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
    /// Market-making executors quote both sides.
    Range,
}

impl TradeSide {
    /// Sign applied to an amount when accumulating inventory.
    /// `None` for sides that do not move inventory in one direction.
    pub fn direction(&self) -> Option<i8> {
        match self {
            TradeSide::Buy => Some(1),
            TradeSide::Sell => Some(-1),
            TradeSide::Range => None,
        }
    }
}

/// Why an executor was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CloseType {
    TimeLimit,
    StopLoss,
    TakeProfit,
    Expired,
    EarlyStop,
    TrailingStop,
    InsufficientBalance,
    Failed,
    Completed,
}

/// Lifecycle state of an executor process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunStatus {
    NotStarted,
    Running,
    ShuttingDown,
    Terminated,
}

/// Last known status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
    Failed,
}

/// Statuses that count an order as executed when linking executors to orders.
pub const COMPLETED_ORDER_STATUSES: &[OrderStatus] = &[OrderStatus::Filled];

impl OrderStatus {
    pub fn is_completed(&self) -> bool {
        COMPLETED_ORDER_STATUSES.contains(self)
    }
}

/// Whether a fill opened or closed a position. Spot markets record `Nil`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionRole {
    Open,
    Close,
    Nil,
}
