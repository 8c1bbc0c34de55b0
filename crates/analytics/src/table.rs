use crate::fills::{FillSummary, ProcessedFill};
use crate::linker::{ExecutorLevels, LevelStats, LinkedFill};
use crate::report::PerformanceSnapshot;
use core_types::timestamp::to_datetime;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};

/// A rectangular result: named columns and one row of cells per record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Frame {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Frame {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row. Missing trailing cells are padded with `null`, extra cells dropped.
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All cells of the named column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| &row[index]).collect())
    }

    /// The frame as one column-name → value object per row.
    pub fn to_records(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }
}

/// Conversion of a result set into a [`Frame`].
pub trait IntoFrame {
    fn to_frame(&self) -> Frame;
}

/// Decimals keep their exact text.
fn decimal(value: Decimal) -> Value {
    Value::String(value.normalize().to_string())
}

/// Non-finite ratios render as the string `NaN`.
fn ratio(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String("NaN".to_string()))
}

fn datetime(seconds: f64) -> Value {
    to_datetime(seconds)
        .map(|dt| Value::String(dt.to_rfc3339()))
        .unwrap_or(Value::Null)
}

fn text(value: impl ToString) -> Value {
    Value::String(value.to_string())
}

impl IntoFrame for [ProcessedFill] {
    fn to_frame(&self) -> Frame {
        let mut frame = Frame::new(&[
            "source_id",
            "timestamp",
            "datetime",
            "strategy",
            "market",
            "trading_pair",
            "order_id",
            "side",
            "price",
            "amount",
            "trade_fee",
            "net_amount",
            "cum_net_amount",
            "cum_fee",
            "inventory_cost",
            "unrealized_trade_pnl",
            "realized_trade_pnl",
            "net_realized_pnl",
            "gross_pnl",
            "realized_pnl",
        ]);
        for p in self {
            frame.push_row(vec![
                text(&p.fill.source_id),
                ratio(p.fill.timestamp),
                datetime(p.fill.timestamp),
                text(&p.fill.key.strategy),
                text(&p.fill.key.market),
                text(&p.fill.key.trading_pair),
                text(&p.fill.order_id),
                text(format!("{:?}", p.fill.side).to_uppercase()),
                decimal(p.fill.price),
                decimal(p.fill.amount),
                decimal(p.trade_fee),
                decimal(p.net_amount),
                decimal(p.cum_net_amount),
                decimal(p.cum_fee),
                decimal(p.inventory_cost),
                decimal(p.unrealized_trade_pnl),
                decimal(p.realized_trade_pnl),
                decimal(p.net_realized_pnl),
                decimal(p.gross_pnl),
                decimal(p.realized_pnl),
            ]);
        }
        frame
    }
}

impl IntoFrame for [LinkedFill] {
    fn to_frame(&self) -> Frame {
        let mut frame = Frame::new(&[
            "source_id",
            "executor_id",
            "order_id",
            "level",
            "role",
            "price",
            "amount",
            "datetime",
        ]);
        for link in self {
            frame.push_row(vec![
                text(&link.source_id),
                text(&link.executor_id),
                text(&link.order_id),
                Value::from(link.level),
                text(format!("{:?}", link.role).to_uppercase()),
                decimal(link.price),
                decimal(link.amount),
                datetime(link.timestamp),
            ]);
        }
        frame
    }
}

impl IntoFrame for [ExecutorLevels] {
    fn to_frame(&self) -> Frame {
        let mut frame = Frame::new(&[
            "source_id",
            "executor_id",
            "exit_level",
            "total_levels",
            "linked_fills",
        ]);
        for levels in self {
            frame.push_row(vec![
                text(&levels.source_id),
                text(&levels.executor_id),
                levels.exit_level.map(Value::from).unwrap_or(Value::Null),
                Value::from(levels.total_levels),
                Value::from(levels.linked_fills),
            ]);
        }
        frame
    }
}

impl IntoFrame for [LevelStats] {
    fn to_frame(&self) -> Frame {
        let mut frame = Frame::new(&[
            "exit_level",
            "executors",
            "winners",
            "net_pnl_quote",
            "avg_net_pnl_pct",
        ]);
        for stats in self {
            frame.push_row(vec![
                Value::from(stats.exit_level),
                Value::from(stats.executors),
                Value::from(stats.winners),
                decimal(stats.net_pnl_quote),
                decimal(stats.avg_net_pnl_pct),
            ]);
        }
        frame
    }
}

impl IntoFrame for [FillSummary] {
    fn to_frame(&self) -> Frame {
        let mut frame = Frame::new(&[
            "source_id",
            "group",
            "fills",
            "buys",
            "sells",
            "volume_quote",
            "total_fees",
            "net_realized_pnl",
            "final_inventory",
            "max_drawdown",
            "first_fill",
            "last_fill",
        ]);
        for summary in self {
            frame.push_row(vec![
                text(&summary.source_id),
                text(&summary.key),
                Value::from(summary.fills),
                Value::from(summary.buys),
                Value::from(summary.sells),
                decimal(summary.volume_quote),
                decimal(summary.total_fees),
                decimal(summary.net_realized_pnl),
                decimal(summary.final_inventory),
                decimal(summary.max_drawdown),
                datetime(summary.first_timestamp),
                datetime(summary.last_timestamp),
            ]);
        }
        frame
    }
}

impl IntoFrame for [PerformanceSnapshot] {
    fn to_frame(&self) -> Frame {
        let mut frame = Frame::new(&[
            "group",
            "executors",
            "winners",
            "losers",
            "accuracy",
            "net_profit",
            "gross_profit",
            "gross_loss",
            "profit_factor",
            "total_fees",
            "total_volume",
            "max_drawdown",
            "max_drawdown_pct",
            "sharpe_ratio",
            "long",
            "short",
            "avg_trading_time",
            "final_portfolio_value",
        ]);
        for s in self {
            let group = s
                .key
                .as_ref()
                .map(|k| k.to_string())
                .unwrap_or_else(|| "portfolio".to_string());
            frame.push_row(vec![
                Value::String(group),
                Value::from(s.total_executors),
                Value::from(s.winning_executors),
                Value::from(s.losing_executors),
                ratio(s.accuracy),
                decimal(s.net_profit),
                decimal(s.gross_profit),
                decimal(s.gross_loss),
                ratio(s.profit_factor),
                decimal(s.total_fees),
                decimal(s.total_volume),
                decimal(s.max_drawdown),
                ratio(s.max_drawdown_pct),
                ratio(s.sharpe_ratio),
                Value::from(s.long_executors),
                Value::from(s.short_executors),
                ratio(s.avg_trading_time),
                decimal(s.final_portfolio_value),
            ]);
        }
        frame
    }
}

impl<T> IntoFrame for Vec<T>
where
    [T]: IntoFrame,
{
    fn to_frame(&self) -> Frame {
        self.as_slice().to_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::GroupingKey;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn records_pair_columns_with_cells() {
        let mut frame = Frame::new(&["a", "b"]);
        frame.push_row(vec![json!(1)]);
        frame.push_row(vec![json!(2), json!("x"), json!("dropped")]);

        let records = frame.to_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["a"], json!(1));
        assert_eq!(records[0]["b"], Value::Null);
        assert_eq!(records[1]["b"], json!("x"));
        assert_eq!(frame.column("a"), Some(vec![&json!(1), &json!(2)]));
        assert_eq!(frame.column("missing"), None);
    }

    #[test]
    fn snapshot_frame_renders_nan_and_portfolio_row() {
        let portfolio = PerformanceSnapshot::empty(None, dec!(1000));
        let group = PerformanceSnapshot::empty(
            Some(GroupingKey::new("ctrl", "binance", "BTC-USDT")),
            dec!(1000),
        );
        let frame = vec![portfolio, group].to_frame();

        assert_eq!(frame.len(), 2);
        assert_eq!(
            frame.column("group"),
            Some(vec![&json!("portfolio"), &json!("ctrl/binance/BTC-USDT")])
        );
        assert_eq!(frame.column("accuracy").unwrap()[0], &json!("NaN"));
        assert_eq!(frame.column("final_portfolio_value").unwrap()[0], &json!("1000"));
    }

    #[test]
    fn level_stats_keep_decimal_text() {
        let stats = vec![LevelStats {
            exit_level: 1,
            executors: 2,
            winners: 1,
            net_pnl_quote: dec!(3.50),
            avg_net_pnl_pct: dec!(0.0125),
        }];
        let frame = stats.to_frame();
        let record = &frame.to_records()[0];
        assert_eq!(record["exit_level"], json!(1));
        assert_eq!(record["net_pnl_quote"], json!("3.5"));
        assert_eq!(record["avg_net_pnl_pct"], json!("0.0125"));
    }

    #[test]
    fn missing_exit_level_is_null() {
        let levels = vec![ExecutorLevels {
            source_id: "bot".to_string(),
            executor_id: "e1".to_string(),
            exit_level: None,
            total_levels: 3,
            linked_fills: 0,
        }];
        let frame = levels.to_frame();
        assert_eq!(frame.column("exit_level"), Some(vec![&Value::Null]));
    }
}
