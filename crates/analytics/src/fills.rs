use crate::error::AnalyticsError;
use core_types::{GroupingKey, TradeFill, TradeSide};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

/// A fill together with the running figures of its group at that point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedFill {
    pub fill: TradeFill,
    /// Signed amount: positive for buys, negative for sells.
    pub net_amount: Decimal,
    pub cum_net_amount: Decimal,
    pub cum_fee: Decimal,
    pub unrealized_trade_pnl: Decimal,
    pub inventory_cost: Decimal,
    pub realized_trade_pnl: Decimal,
    pub net_realized_pnl: Decimal,
    /// Change in `net_realized_pnl` caused by this fill.
    pub realized_pnl: Decimal,
    /// Change in `realized_trade_pnl` caused by this fill.
    pub gross_pnl: Decimal,
    /// Change in `cum_fee` caused by this fill.
    pub trade_fee: Decimal,
}

/// Running state carried from one fill to the next within a group.
#[derive(Debug, Default)]
struct GroupState {
    last_timestamp: Option<f64>,
    cum_fee: Decimal,
    cum_net_amount: Decimal,
    cum_quote_flow: Decimal,
    realized_trade_pnl: Decimal,
    net_realized_pnl: Decimal,
}

/// Fills of one bot instance that share a trading context accumulate together.
type GroupId = (String, GroupingKey);

fn group_of(fill: &TradeFill) -> GroupId {
    (fill.source_id.clone(), fill.key.clone())
}

/// Attributes inventory, fees and PnL to every fill in a single pass.
#[derive(Debug, Default)]
pub struct TradeFillProcessor {}

impl TradeFillProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives the cumulative and per-fill figures for every fill.
    ///
    /// Fills must already be in ascending timestamp order within each group;
    /// the result keeps the input order. A group whose timestamps go backwards
    /// fails the whole call, since every later figure in that group would be wrong.
    pub fn process(&self, fills: &[TradeFill]) -> Result<Vec<ProcessedFill>, AnalyticsError> {
        let mut states: HashMap<GroupId, GroupState> = HashMap::new();
        let mut processed = Vec::with_capacity(fills.len());

        for fill in fills {
            let group = group_of(fill);
            let state = states.entry(group).or_default();

            if let Some(previous) = state.last_timestamp {
                if fill.timestamp < previous {
                    return Err(AnalyticsError::OutOfOrderFillSequence {
                        group: format!("{}:{}", fill.source_id, fill.key),
                        previous,
                        current: fill.timestamp,
                    });
                }
            }
            state.last_timestamp = Some(fill.timestamp);

            let net_amount = match fill.side {
                TradeSide::Buy => fill.amount,
                TradeSide::Sell => -fill.amount,
                TradeSide::Range => return Err(AnalyticsError::NonDirectionalSide(fill.order_id.clone())),
            };

            let previous_fee = state.cum_fee;
            let previous_realized = state.realized_trade_pnl;
            let previous_net = state.net_realized_pnl;

            state.cum_fee += fill.fee_in_quote;
            state.cum_net_amount += net_amount;
            state.cum_quote_flow += net_amount * fill.price;

            let unrealized_trade_pnl = -state.cum_quote_flow;
            let inventory_cost = state.cum_net_amount * fill.price;
            let realized_trade_pnl = unrealized_trade_pnl + inventory_cost;
            let net_realized_pnl = realized_trade_pnl - state.cum_fee;

            state.realized_trade_pnl = realized_trade_pnl;
            state.net_realized_pnl = net_realized_pnl;

            processed.push(ProcessedFill {
                fill: fill.clone(),
                net_amount,
                cum_net_amount: state.cum_net_amount,
                cum_fee: state.cum_fee,
                unrealized_trade_pnl,
                inventory_cost,
                realized_trade_pnl,
                net_realized_pnl,
                realized_pnl: net_realized_pnl - previous_net,
                gross_pnl: realized_trade_pnl - previous_realized,
                trade_fee: state.cum_fee - previous_fee,
            });
        }

        tracing::debug!(fills = processed.len(), groups = states.len(), "Processed fills.");
        Ok(processed)
    }

    /// Sorts fills into per-group chronological order before processing.
    ///
    /// For callers holding fills of unknown order, e.g. merged from several
    /// exports. The sort is stable, so same-timestamp fills keep their order.
    pub fn process_unsorted(&self, fills: &[TradeFill]) -> Result<Vec<ProcessedFill>, AnalyticsError> {
        let mut sorted = fills.to_vec();
        sorted.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        self.process(&sorted)
    }
}

/// Totals for one group of processed fills.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FillSummary {
    pub source_id: String,
    pub key: GroupingKey,
    pub fills: usize,
    pub buys: usize,
    pub sells: usize,
    pub volume_quote: Decimal,
    pub total_fees: Decimal,
    pub net_realized_pnl: Decimal,
    pub final_inventory: Decimal,
    /// Largest decline of `net_realized_pnl` from its running peak. Zero or negative.
    pub max_drawdown: Decimal,
    pub first_timestamp: f64,
    pub last_timestamp: f64,
}

/// Summarizes processed fills per group, ordered by source then key.
pub fn summarize(processed: &[ProcessedFill]) -> Vec<FillSummary> {
    let mut summaries: HashMap<GroupId, (FillSummary, Decimal)> = HashMap::new();

    for p in processed {
        let group = group_of(&p.fill);
        let (summary, peak) = summaries.entry(group).or_insert_with(|| {
            (
                FillSummary {
                    source_id: p.fill.source_id.clone(),
                    key: p.fill.key.clone(),
                    fills: 0,
                    buys: 0,
                    sells: 0,
                    volume_quote: Decimal::ZERO,
                    total_fees: Decimal::ZERO,
                    net_realized_pnl: Decimal::ZERO,
                    final_inventory: Decimal::ZERO,
                    max_drawdown: Decimal::ZERO,
                    first_timestamp: p.fill.timestamp,
                    last_timestamp: p.fill.timestamp,
                },
                p.net_realized_pnl,
            )
        });

        summary.fills += 1;
        match p.fill.side {
            TradeSide::Buy => summary.buys += 1,
            TradeSide::Sell => summary.sells += 1,
            TradeSide::Range => {}
        }
        summary.volume_quote += p.fill.price * p.fill.amount;
        summary.total_fees = p.cum_fee;
        summary.net_realized_pnl = p.net_realized_pnl;
        summary.final_inventory = p.cum_net_amount;
        summary.last_timestamp = p.fill.timestamp;

        if p.net_realized_pnl > *peak {
            *peak = p.net_realized_pnl;
        }
        let drawdown = p.net_realized_pnl - *peak;
        if drawdown < summary.max_drawdown {
            summary.max_drawdown = drawdown;
        }
    }

    let mut result: Vec<FillSummary> = summaries.into_values().map(|(s, _)| s).collect();
    result.sort_by(|a, b| a.source_id.cmp(&b.source_id).then_with(|| a.key.cmp(&b.key)));
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::PositionRole;
    use rust_decimal_macros::dec;

    fn fill(ts: f64, side: TradeSide, amount: Decimal, price: Decimal, fee: Decimal) -> TradeFill {
        fill_in("pmm", ts, side, amount, price, fee)
    }

    fn fill_in(
        strategy: &str,
        ts: f64,
        side: TradeSide,
        amount: Decimal,
        price: Decimal,
        fee: Decimal,
    ) -> TradeFill {
        TradeFill {
            source_id: "bot".to_string(),
            config_file_path: "conf.yml".to_string(),
            key: GroupingKey::new(strategy, "binance", "BTC-USDT"),
            timestamp: ts,
            order_id: format!("{strategy}-{ts}"),
            exchange_trade_id: String::new(),
            side,
            price,
            amount,
            fee_in_quote: fee,
            position: PositionRole::Nil,
        }
    }

    #[test]
    fn round_trip_realizes_the_price_difference() {
        let fills = vec![
            fill(1.0, TradeSide::Buy, dec!(1), dec!(100), dec!(0)),
            fill(2.0, TradeSide::Sell, dec!(1), dec!(110), dec!(0)),
        ];
        let processed = TradeFillProcessor::new().process(&fills).unwrap();

        assert_eq!(processed[0].realized_trade_pnl, dec!(0));
        assert_eq!(processed[0].realized_pnl, dec!(0));
        assert_eq!(processed[0].unrealized_trade_pnl, dec!(-100));
        assert_eq!(processed[0].inventory_cost, dec!(100));

        let last = &processed[1];
        assert_eq!(last.realized_trade_pnl, dec!(10));
        assert_eq!(last.net_realized_pnl, dec!(10));
        assert_eq!(last.realized_pnl, dec!(10));
        assert_eq!(last.gross_pnl, dec!(10));
        assert_eq!(last.cum_net_amount, dec!(0));
    }

    #[test]
    fn fees_reduce_net_pnl_and_are_attributed_per_fill() {
        let fills = vec![
            fill(1.0, TradeSide::Buy, dec!(2), dec!(50), dec!(0.1)),
            fill(2.0, TradeSide::Sell, dec!(1), dec!(55), dec!(0.05)),
            fill(3.0, TradeSide::Sell, dec!(1), dec!(45), dec!(0.05)),
        ];
        let processed = TradeFillProcessor::new().process(&fills).unwrap();

        // After the first sell one unit is still held and marked at 55.
        assert_eq!(processed[1].realized_trade_pnl, dec!(10));
        assert_eq!(processed[1].cum_fee, dec!(0.15));
        assert_eq!(processed[1].net_realized_pnl, dec!(9.85));
        assert_eq!(processed[1].trade_fee, dec!(0.05));

        let last = &processed[2];
        assert_eq!(last.realized_trade_pnl, dec!(0));
        assert_eq!(last.net_realized_pnl, dec!(-0.2));
        assert_eq!(last.realized_pnl, dec!(-10.05));
        assert_eq!(last.gross_pnl, dec!(-10));
        assert_eq!(last.trade_fee, dec!(0.05));
    }

    #[test]
    fn groups_accumulate_independently() {
        let fills = vec![
            fill_in("a", 1.0, TradeSide::Buy, dec!(1), dec!(100), dec!(0)),
            fill_in("b", 1.5, TradeSide::Buy, dec!(3), dec!(10), dec!(0)),
            fill_in("a", 2.0, TradeSide::Sell, dec!(1), dec!(90), dec!(0)),
            fill_in("b", 2.5, TradeSide::Sell, dec!(1), dec!(12), dec!(0)),
        ];
        let processed = TradeFillProcessor::new().process(&fills).unwrap();

        assert_eq!(processed[2].fill.key.strategy, "a");
        assert_eq!(processed[2].realized_trade_pnl, dec!(-10));
        assert_eq!(processed[3].fill.key.strategy, "b");
        assert_eq!(processed[3].cum_net_amount, dec!(2));
        assert_eq!(processed[3].realized_trade_pnl, dec!(6));
        // First fill of group b starts from zero even though group a came first.
        assert_eq!(processed[1].realized_pnl, dec!(0));
    }

    #[test]
    fn out_of_order_group_fails() {
        let fills = vec![
            fill(2.0, TradeSide::Buy, dec!(1), dec!(100), dec!(0)),
            fill(1.0, TradeSide::Sell, dec!(1), dec!(110), dec!(0)),
        ];
        let err = TradeFillProcessor::new().process(&fills).unwrap_err();
        assert!(matches!(
            err,
            AnalyticsError::OutOfOrderFillSequence { previous, current, .. } if previous == 2.0 && current == 1.0
        ));

        let processed = TradeFillProcessor::new().process_unsorted(&fills).unwrap();
        assert_eq!(processed[0].fill.timestamp, 1.0);
    }

    #[test]
    fn interleaved_groups_are_not_out_of_order() {
        let fills = vec![
            fill_in("a", 5.0, TradeSide::Buy, dec!(1), dec!(100), dec!(0)),
            fill_in("b", 1.0, TradeSide::Buy, dec!(1), dec!(100), dec!(0)),
        ];
        assert!(TradeFillProcessor::new().process(&fills).is_ok());
    }

    #[test]
    fn range_side_cannot_be_processed() {
        let fills = vec![fill(1.0, TradeSide::Range, dec!(1), dec!(100), dec!(0))];
        assert!(matches!(
            TradeFillProcessor::new().process(&fills),
            Err(AnalyticsError::NonDirectionalSide(_))
        ));
    }

    #[test]
    fn summary_tracks_volume_fees_and_drawdown() {
        let fills = vec![
            fill(1.0, TradeSide::Buy, dec!(1), dec!(100), dec!(0.1)),
            fill(2.0, TradeSide::Sell, dec!(1), dec!(110), dec!(0.1)),
            fill(3.0, TradeSide::Buy, dec!(1), dec!(110), dec!(0)),
            fill(4.0, TradeSide::Sell, dec!(1), dec!(95), dec!(0)),
        ];
        let processed = TradeFillProcessor::new().process(&fills).unwrap();
        let summaries = summarize(&processed);

        assert_eq!(summaries.len(), 1);
        let s = &summaries[0];
        assert_eq!(s.fills, 4);
        assert_eq!(s.buys, 2);
        assert_eq!(s.sells, 2);
        assert_eq!(s.volume_quote, dec!(415));
        assert_eq!(s.total_fees, dec!(0.2));
        assert_eq!(s.net_realized_pnl, dec!(-5.2));
        assert_eq!(s.max_drawdown, dec!(-15));
        assert_eq!(s.final_inventory, dec!(0));
        assert_eq!(s.first_timestamp, 1.0);
        assert_eq!(s.last_timestamp, 4.0);
    }
}
