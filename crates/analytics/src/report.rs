use core_types::{CloseType, GroupingKey};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Performance of a finalized set of closed executors.
///
/// Ratios that are undefined for the input (no trades, no losing trades, zero
/// variance) are `NaN` rather than an error: these are ordinary states a caller
/// renders, not faults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSnapshot {
    /// `None` for the portfolio-wide snapshot.
    pub key: Option<GroupingKey>,

    // I. Core Profitability Metrics
    pub initial_portfolio_value: Decimal,
    pub final_portfolio_value: Decimal,
    pub net_profit: Decimal,
    pub gross_profit: Decimal,
    pub gross_loss: Decimal,
    pub profit_factor: f64,
    pub total_fees: Decimal,
    pub total_volume: Decimal,

    // II. Risk and Drawdown
    /// Zero or negative.
    pub max_drawdown: Decimal,
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,

    // III. Trade-Level Statistics
    pub total_executors: usize,
    pub winning_executors: usize,
    pub losing_executors: usize,
    pub accuracy: f64,
    pub long_executors: usize,
    pub short_executors: usize,
    pub close_types: BTreeMap<CloseType, usize>,

    // IV. Time-Based Metrics
    /// Mean seconds between open and close.
    pub avg_trading_time: f64,
}

impl PerformanceSnapshot {
    /// A snapshot over no executors.
    pub fn empty(key: Option<GroupingKey>, initial_portfolio_value: Decimal) -> Self {
        Self {
            key,
            initial_portfolio_value,
            final_portfolio_value: initial_portfolio_value,
            net_profit: Decimal::ZERO,
            gross_profit: Decimal::ZERO,
            gross_loss: Decimal::ZERO,
            profit_factor: f64::NAN,
            total_fees: Decimal::ZERO,
            total_volume: Decimal::ZERO,
            max_drawdown: Decimal::ZERO,
            max_drawdown_pct: f64::NAN,
            sharpe_ratio: f64::NAN,
            total_executors: 0,
            winning_executors: 0,
            losing_executors: 0,
            accuracy: f64::NAN,
            long_executors: 0,
            short_executors: 0,
            close_types: BTreeMap::new(),
            avg_trading_time: f64::NAN,
        }
    }
}
