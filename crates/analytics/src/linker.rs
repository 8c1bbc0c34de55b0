use core_types::{Executor, Order, PositionRole};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// One completed order matched to the executor that placed it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkedFill {
    pub source_id: String,
    pub executor_id: String,
    pub order_id: String,
    /// Position of the order id in the executor's order-id list.
    pub level: usize,
    /// `Open` for entries, `Close` for the fill that ended the position.
    pub role: PositionRole,
    pub price: Decimal,
    pub amount: Decimal,
    pub timestamp: f64,
}

/// How deep into its ladder an executor got.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutorLevels {
    pub source_id: String,
    pub executor_id: String,
    /// Entry fills before the closing one. `None` when the executor records no order ids.
    pub exit_level: Option<usize>,
    /// Length of the configured price ladder, filled or not.
    pub total_levels: usize,
    pub linked_fills: usize,
}

/// Outcomes of all executors that exited at the same level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelStats {
    pub exit_level: usize,
    pub executors: usize,
    pub winners: usize,
    pub net_pnl_quote: Decimal,
    pub avg_net_pnl_pct: Decimal,
}

/// Joins closed executors to the completed orders they reference.
#[derive(Debug, Default)]
pub struct ExecutorLinker {}

impl ExecutorLinker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inner-joins every closed executor's order ids against completed orders.
    ///
    /// Orders are matched within the executor's own source. Where the store
    /// recorded no position role, the executor's last linked fill is taken as
    /// the close and the rest as entries.
    pub fn link(&self, executors: &[Executor], orders: &[Order]) -> Vec<LinkedFill> {
        let completed: HashMap<(&str, &str), &Order> = orders
            .iter()
            .filter(|o| o.last_status.is_completed())
            .map(|o| ((o.source_id.as_str(), o.id.as_str()), o))
            .collect();

        let mut links = Vec::new();
        for executor in executors.iter().filter(|e| e.is_closed()) {
            let Some(order_ids) = executor.order_ids() else {
                continue;
            };

            let matched: Vec<(usize, &Order)> = order_ids
                .iter()
                .enumerate()
                .filter_map(|(level, id)| {
                    completed
                        .get(&(executor.source_id.as_str(), id.as_str()))
                        .map(|order| (level, *order))
                })
                .collect();

            let last = matched.len().saturating_sub(1);
            for (i, (level, order)) in matched.into_iter().enumerate() {
                let role = match order.position {
                    PositionRole::Open | PositionRole::Close => order.position,
                    PositionRole::Nil if i == last => PositionRole::Close,
                    PositionRole::Nil => PositionRole::Open,
                };
                links.push(LinkedFill {
                    source_id: executor.source_id.clone(),
                    executor_id: executor.id.clone(),
                    order_id: order.id.clone(),
                    level,
                    role,
                    price: order.price,
                    amount: order.amount,
                    timestamp: order.last_update_timestamp,
                });
            }
        }

        tracing::debug!(links = links.len(), "Linked executors to completed orders.");
        links
    }

    /// Exit and total levels for every closed executor, including those that never filled.
    pub fn levels(&self, executors: &[Executor], links: &[LinkedFill]) -> Vec<ExecutorLevels> {
        let mut per_executor: HashMap<(&str, &str), (usize, usize)> = HashMap::new();
        for link in links {
            let entry = per_executor
                .entry((link.source_id.as_str(), link.executor_id.as_str()))
                .or_default();
            entry.0 += 1;
            if link.role == PositionRole::Open {
                entry.1 += 1;
            }
        }

        executors
            .iter()
            .filter(|e| e.is_closed())
            .map(|e| {
                let (linked_fills, open_fills) = per_executor
                    .get(&(e.source_id.as_str(), e.id.as_str()))
                    .copied()
                    .unwrap_or_default();
                ExecutorLevels {
                    source_id: e.source_id.clone(),
                    executor_id: e.id.clone(),
                    exit_level: e.order_ids().map(|_| open_fills),
                    total_levels: e.config.prices.len(),
                    linked_fills,
                }
            })
            .collect()
    }

    /// Groups executor outcomes by the level they exited at.
    pub fn level_stats(&self, executors: &[Executor], levels: &[ExecutorLevels]) -> Vec<LevelStats> {
        let by_id: HashMap<(&str, &str), &Executor> = executors
            .iter()
            .map(|e| ((e.source_id.as_str(), e.id.as_str()), e))
            .collect();

        let mut grouped: BTreeMap<usize, (usize, usize, Decimal, Decimal)> = BTreeMap::new();
        for level in levels {
            let (Some(exit_level), Some(executor)) = (
                level.exit_level,
                by_id.get(&(level.source_id.as_str(), level.executor_id.as_str())),
            ) else {
                continue;
            };
            let entry = grouped.entry(exit_level).or_default();
            entry.0 += 1;
            if executor.is_profitable() {
                entry.1 += 1;
            }
            entry.2 += executor.net_pnl_quote;
            entry.3 += executor.net_pnl_pct;
        }

        grouped
            .into_iter()
            .map(|(exit_level, (count, winners, pnl, pct))| LevelStats {
                exit_level,
                executors: count,
                winners,
                net_pnl_quote: pnl,
                avg_net_pnl_pct: pct / Decimal::from(count),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{CustomInfo, ExecutorConfig, GroupingKey, OrderStatus, RunStatus, TradeSide};
    use rust_decimal_macros::dec;

    fn order(id: &str, status: OrderStatus, position: PositionRole) -> Order {
        Order {
            source_id: "bot".to_string(),
            id: id.to_string(),
            config_file_path: String::new(),
            key: GroupingKey::new("ctrl", "binance", "BTC-USDT"),
            creation_timestamp: 1_700_000_000.0,
            last_update_timestamp: 1_700_000_010.0,
            price: dec!(100),
            amount: dec!(0.5),
            last_status: status,
            position,
            exchange_order_id: None,
        }
    }

    fn executor(id: &str, order_ids: Option<Vec<&str>>, prices: usize, pnl: Decimal) -> Executor {
        Executor {
            source_id: "bot".to_string(),
            id: id.to_string(),
            executor_type: "dca_executor".to_string(),
            open_timestamp: 1_700_000_000.0,
            close_timestamp: Some(1_700_000_100.0),
            close_type: None,
            status: RunStatus::Terminated,
            config: ExecutorConfig {
                trading_pair: "BTC-USDT".to_string(),
                connector_name: "binance".to_string(),
                side: Some(TradeSide::Buy),
                stop_loss: dec!(0),
                take_profit: dec!(0),
                time_limit: 0,
                trailing_stop: None,
                level_id: 0,
                prices: vec![dec!(100); prices],
                order_ids: None,
            },
            custom_info: CustomInfo {
                order_ids: order_ids.map(|ids| ids.into_iter().map(String::from).collect()),
                ..CustomInfo::default()
            },
            net_pnl_pct: pnl / dec!(100),
            net_pnl_quote: pnl,
            cum_fees_quote: dec!(0),
            filled_amount_quote: dec!(0),
            is_active: false,
            is_trading: false,
            controller_id: "ctrl".to_string(),
        }
    }

    #[test]
    fn only_completed_orders_are_linked() {
        let orders = vec![
            order("o1", OrderStatus::Filled, PositionRole::Nil),
            order("o2", OrderStatus::Cancelled, PositionRole::Nil),
        ];
        let executors = vec![executor("e1", Some(vec!["o1", "o2"]), 2, dec!(1))];
        let linker = ExecutorLinker::new();

        let links = linker.link(&executors, &orders);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].order_id, "o1");
        assert_eq!(links[0].role, PositionRole::Close);

        let levels = linker.levels(&executors, &links);
        assert_eq!(levels[0].exit_level, Some(0));
        assert_eq!(levels[0].total_levels, 2);
    }

    #[test]
    fn exit_level_counts_entries_before_the_close() {
        let orders = vec![
            order("o1", OrderStatus::Filled, PositionRole::Nil),
            order("o2", OrderStatus::Filled, PositionRole::Nil),
            order("o3", OrderStatus::Cancelled, PositionRole::Nil),
            order("o4", OrderStatus::Filled, PositionRole::Nil),
        ];
        let executors = vec![executor("e1", Some(vec!["o1", "o2", "o3", "o4"]), 3, dec!(5))];
        let linker = ExecutorLinker::new();

        let links = linker.link(&executors, &orders);
        let roles: Vec<PositionRole> = links.iter().map(|l| l.role).collect();
        assert_eq!(roles, vec![PositionRole::Open, PositionRole::Open, PositionRole::Close]);
        assert_eq!(links[2].level, 3);

        let levels = linker.levels(&executors, &links);
        assert_eq!(levels[0].exit_level, Some(2));
        assert_eq!(levels[0].linked_fills, 3);
        assert_eq!(levels[0].total_levels, 3);
    }

    #[test]
    fn stored_position_roles_take_precedence() {
        let orders = vec![
            order("o1", OrderStatus::Filled, PositionRole::Open),
            order("o2", OrderStatus::Filled, PositionRole::Open),
        ];
        let executors = vec![executor("e1", Some(vec!["o1", "o2"]), 2, dec!(1))];
        let linker = ExecutorLinker::new();

        let links = linker.link(&executors, &orders);
        let levels = linker.levels(&executors, &links);
        assert_eq!(levels[0].exit_level, Some(2));
    }

    #[test]
    fn unfilled_and_id_less_executors_are_kept() {
        let orders = vec![order("o9", OrderStatus::Cancelled, PositionRole::Nil)];
        let mut open = executor("e3", Some(vec!["o1"]), 1, dec!(0));
        open.close_timestamp = None;
        let executors = vec![
            executor("e1", Some(vec!["o9"]), 4, dec!(0)),
            executor("e2", None, 0, dec!(2)),
            open,
        ];
        let linker = ExecutorLinker::new();

        let links = linker.link(&executors, &orders);
        assert!(links.is_empty());

        let levels = linker.levels(&executors, &links);
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].exit_level, Some(0));
        assert_eq!(levels[0].total_levels, 4);
        assert_eq!(levels[1].exit_level, None);
    }

    #[test]
    fn orders_from_other_sources_do_not_match() {
        let mut foreign = order("o1", OrderStatus::Filled, PositionRole::Nil);
        foreign.source_id = "other-bot".to_string();
        let executors = vec![executor("e1", Some(vec!["o1"]), 1, dec!(1))];

        let links = ExecutorLinker::new().link(&executors, &[foreign]);
        assert!(links.is_empty());
    }

    #[test]
    fn level_stats_group_outcomes_by_exit_level() {
        let orders = vec![
            order("a1", OrderStatus::Filled, PositionRole::Nil),
            order("b1", OrderStatus::Filled, PositionRole::Nil),
            order("b2", OrderStatus::Filled, PositionRole::Nil),
            order("c1", OrderStatus::Filled, PositionRole::Nil),
        ];
        let executors = vec![
            executor("ea", Some(vec!["a1"]), 2, dec!(4)),
            executor("eb", Some(vec!["b1", "b2"]), 2, dec!(-2)),
            executor("ec", Some(vec!["c1"]), 2, dec!(-1)),
            executor("ed", None, 2, dec!(10)),
        ];
        let linker = ExecutorLinker::new();
        let links = linker.link(&executors, &orders);
        let levels = linker.levels(&executors, &links);

        let stats = linker.level_stats(&executors, &levels);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].exit_level, 0);
        assert_eq!(stats[0].executors, 2);
        assert_eq!(stats[0].winners, 1);
        assert_eq!(stats[0].net_pnl_quote, dec!(3));
        assert_eq!(stats[0].avg_net_pnl_pct, dec!(0.015));
        assert_eq!(stats[1].exit_level, 1);
        assert_eq!(stats[1].executors, 1);
        assert_eq!(stats[1].winners, 0);
    }
}
