use crate::report::PerformanceSnapshot;
use core_types::{Executor, GroupingKey, TradeSide};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, MathematicalOps};
use std::collections::BTreeMap;

/// A stateless calculator for deriving performance metrics from closed executors.
#[derive(Debug, Clone)]
pub struct PerformanceMetrics {
    initial_portfolio_value: Decimal,
}

impl PerformanceMetrics {
    pub fn new(initial_portfolio_value: Decimal) -> Self {
        Self {
            initial_portfolio_value,
        }
    }

    /// Portfolio-wide snapshot over every closed executor.
    ///
    /// Executors that are still open are ignored.
    pub fn snapshot(&self, executors: &[Executor]) -> PerformanceSnapshot {
        let closed: Vec<&Executor> = executors.iter().filter(|e| e.is_closed()).collect();
        self.calculate(None, closed)
    }

    /// One snapshot per (controller, connector, trading pair), ordered by key.
    pub fn by_group(&self, executors: &[Executor]) -> Vec<PerformanceSnapshot> {
        let mut groups: BTreeMap<GroupingKey, Vec<&Executor>> = BTreeMap::new();
        for executor in executors.iter().filter(|e| e.is_closed()) {
            groups.entry(executor.key()).or_default().push(executor);
        }
        groups
            .into_iter()
            .map(|(key, closed)| self.calculate(Some(key), closed))
            .collect()
    }

    fn calculate(&self, key: Option<GroupingKey>, mut closed: Vec<&Executor>) -> PerformanceSnapshot {
        let mut report = PerformanceSnapshot::empty(key, self.initial_portfolio_value);
        if closed.is_empty() {
            return report;
        }

        // The cumulative series follows the order in which PnL was realized.
        closed.sort_by(|a, b| {
            let a_close = a.close_timestamp.unwrap_or(a.open_timestamp);
            let b_close = b.close_timestamp.unwrap_or(b.open_timestamp);
            a_close
                .total_cmp(&b_close)
                .then(a.open_timestamp.total_cmp(&b.open_timestamp))
        });

        self.calculate_profitability(&closed, &mut report);
        self.calculate_drawdown(&closed, &mut report);
        self.calculate_ratios(&closed, &mut report);
        self.calculate_time_metrics(&closed, &mut report);
        report
    }

    /// Calculates all profitability-related metrics.
    fn calculate_profitability(&self, closed: &[&Executor], report: &mut PerformanceSnapshot) {
        report.total_executors = closed.len();

        for executor in closed {
            let pnl = executor.net_pnl_quote;
            report.net_profit += pnl;
            report.total_fees += executor.cum_fees_quote;
            report.total_volume += executor.filled_amount_quote;

            if pnl > Decimal::ZERO {
                report.gross_profit += pnl;
                report.winning_executors += 1;
            } else if pnl < Decimal::ZERO {
                report.gross_loss += -pnl;
                report.losing_executors += 1;
            }

            match executor.config.side {
                Some(TradeSide::Buy) => report.long_executors += 1,
                Some(TradeSide::Sell) => report.short_executors += 1,
                _ => {}
            }
            if let Some(close_type) = executor.close_type {
                *report.close_types.entry(close_type).or_default() += 1;
            }
        }

        report.final_portfolio_value = self.initial_portfolio_value + report.net_profit;
        report.net_profit = report.final_portfolio_value - report.initial_portfolio_value;

        let flags: Vec<bool> = closed.iter().map(|e| e.is_profitable()).collect();
        report.accuracy = accuracy(&flags);
        let pnls: Vec<Decimal> = closed.iter().map(|e| e.net_pnl_quote).collect();
        report.profit_factor = profit_factor(&pnls);
    }

    /// Calculates maximum drawdown from the cumulative PnL series.
    fn calculate_drawdown(&self, closed: &[&Executor], report: &mut PerformanceSnapshot) {
        let cumulative: Vec<Decimal> = closed
            .iter()
            .scan(Decimal::ZERO, |acc, e| {
                *acc += e.net_pnl_quote;
                Some(*acc)
            })
            .collect();

        report.max_drawdown = max_drawdown(&cumulative);
        report.max_drawdown_pct = ratio(report.max_drawdown, self.initial_portfolio_value);
    }

    fn calculate_ratios(&self, closed: &[&Executor], report: &mut PerformanceSnapshot) {
        if self.initial_portfolio_value.is_zero() {
            return;
        }
        let returns: Vec<Decimal> = closed
            .iter()
            .map(|e| e.net_pnl_quote / self.initial_portfolio_value)
            .collect();
        report.sharpe_ratio = sharpe_ratio(&returns);
    }

    fn calculate_time_metrics(&self, closed: &[&Executor], report: &mut PerformanceSnapshot) {
        let durations: Vec<f64> = closed.iter().filter_map(|e| e.duration()).collect();
        report.avg_trading_time = mean(&durations);
    }
}

/// Share of profitable entries. `NaN` for an empty input.
pub fn accuracy(profitable: &[bool]) -> f64 {
    if profitable.is_empty() {
        return f64::NAN;
    }
    profitable.iter().filter(|p| **p).count() as f64 / profitable.len() as f64
}

/// Sum of gains over the magnitude of the sum of losses. `NaN` without losses.
pub fn profit_factor(pnls: &[Decimal]) -> f64 {
    let gains: Decimal = pnls.iter().filter(|p| **p > Decimal::ZERO).sum();
    let losses: Decimal = pnls.iter().filter(|p| **p < Decimal::ZERO).sum();
    ratio(gains, -losses)
}

/// Lowest point of the series relative to its running peak. Zero or negative.
pub fn max_drawdown(cumulative: &[Decimal]) -> Decimal {
    let Some(first) = cumulative.first() else {
        return Decimal::ZERO;
    };

    let mut peak = *first;
    let mut worst = Decimal::ZERO;
    for value in cumulative {
        if *value > peak {
            peak = *value;
        }
        let drawdown = *value - peak;
        if drawdown < worst {
            worst = drawdown;
        }
    }
    worst
}

/// Mean over sample standard deviation. `NaN` for fewer than two returns or zero variance.
pub fn sharpe_ratio(returns: &[Decimal]) -> f64 {
    if returns.len() < 2 {
        return f64::NAN;
    }
    let mean_return = returns.iter().sum::<Decimal>() / Decimal::from(returns.len());
    let variance = returns
        .iter()
        .map(|r| (*r - mean_return) * (*r - mean_return))
        .sum::<Decimal>()
        / Decimal::from(returns.len() - 1);

    if variance <= Decimal::ZERO {
        return f64::NAN;
    }
    match variance.sqrt() {
        Some(std_dev) => ratio(mean_return, std_dev),
        None => f64::NAN,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Decimal division reported as `f64`, `NaN` when the denominator is zero.
fn ratio(numerator: Decimal, denominator: Decimal) -> f64 {
    if denominator.is_zero() {
        return f64::NAN;
    }
    (numerator / denominator).to_f64().unwrap_or(f64::NAN)
}
