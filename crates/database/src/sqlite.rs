use crate::error::DbError;
use crate::source::{sort_chronologically, RecordFilter, RecordSource, TableKind, DEFAULT_PROBE_TIMEOUT};
use async_trait::async_trait;
use core_types::{
    normalize, parse_embedded_blob, CloseType, CoreError, CustomInfo, Executor, ExecutorConfig,
    GroupingKey, Order, OrderStatus, PositionRole, RawTimestamp, RunStatus, TableEnum,
    TradeFeeBlob, TradeFill, TradeSide,
};
use rust_decimal::Decimal;
use sqlx::sqlite::SqlitePool;
use sqlx::FromRow;
use std::str::FromStr;
use std::time::Duration;

// Numeric columns are cast to TEXT so that INTEGER and REAL storage classes
// decode the same way and decimals keep SQLite's shortest representation.

const FILLS_QUERY: &str = r#"
    SELECT
        config_file_path, strategy, market, symbol,
        CAST(timestamp AS TEXT) AS timestamp,
        order_id, trade_type,
        CAST(price AS TEXT) AS price,
        CAST(amount AS TEXT) AS amount,
        trade_fee, position, exchange_trade_id
    FROM TradeFill
    ORDER BY rowid ASC
"#;

const ORDERS_QUERY: &str = r#"
    SELECT
        id, config_file_path, strategy, market, symbol,
        CAST(creation_timestamp AS TEXT) AS creation_timestamp,
        CAST(last_update_timestamp AS TEXT) AS last_update_timestamp,
        CAST(price AS TEXT) AS price,
        CAST(amount AS TEXT) AS amount,
        last_status, position, exchange_order_id
    FROM "Order"
    ORDER BY rowid ASC
"#;

const EXECUTORS_QUERY: &str = r#"
    SELECT
        id, type,
        CAST(timestamp AS TEXT) AS timestamp,
        CAST(close_timestamp AS TEXT) AS close_timestamp,
        close_type, status, config, custom_info,
        CAST(net_pnl_pct AS TEXT) AS net_pnl_pct,
        CAST(net_pnl_quote AS TEXT) AS net_pnl_quote,
        CAST(cum_fees_quote AS TEXT) AS cum_fees_quote,
        CAST(filled_amount_quote AS TEXT) AS filled_amount_quote,
        is_active, is_trading, controller_id
    FROM Executors
    ORDER BY rowid ASC
"#;

#[derive(Debug, FromRow)]
struct FillRow {
    config_file_path: Option<String>,
    strategy: String,
    market: String,
    symbol: String,
    timestamp: String,
    order_id: String,
    trade_type: String,
    price: String,
    amount: String,
    trade_fee: Option<String>,
    position: Option<String>,
    exchange_trade_id: Option<String>,
}

#[derive(Debug, FromRow)]
struct OrderRow {
    id: String,
    config_file_path: Option<String>,
    strategy: String,
    market: String,
    symbol: String,
    creation_timestamp: String,
    last_update_timestamp: Option<String>,
    price: Option<String>,
    amount: String,
    last_status: String,
    position: Option<String>,
    exchange_order_id: Option<String>,
}

#[derive(Debug, FromRow)]
struct ExecutorRow {
    id: String,
    #[sqlx(rename = "type")]
    executor_type: String,
    timestamp: String,
    close_timestamp: Option<String>,
    close_type: Option<i64>,
    status: i64,
    config: String,
    custom_info: Option<String>,
    net_pnl_pct: Option<String>,
    net_pnl_quote: Option<String>,
    cum_fees_quote: Option<String>,
    filled_amount_quote: Option<String>,
    is_active: Option<i64>,
    is_trading: Option<i64>,
    controller_id: Option<String>,
}

/// Reads one bot instance's SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteRecordSource {
    id: String,
    pool: SqlitePool,
    probe_timeout: Duration,
}

impl SqliteRecordSource {
    pub fn new(id: impl Into<String>, pool: SqlitePool) -> Self {
        Self {
            id: id.into(),
            pool,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    fn decode_fill(&self, row: FillRow) -> Result<TradeFill, CoreError> {
        let key = GroupingKey::new(row.strategy, row.market, row.symbol);
        let price = parse_decimal("price", &row.price)?;
        let amount = parse_decimal("amount", &row.amount)?;

        let fee_in_quote = match row.trade_fee.as_deref() {
            Some(raw) if !raw.trim().is_empty() => {
                let fee: TradeFeeBlob = parse_embedded_blob("trade_fee", raw)?;
                let (base, quote) = key.assets();
                let (total, unconverted) = fee.fee_in_quote(price, amount, base, quote);
                if !unconverted.is_empty() {
                    tracing::warn!(
                        source = %self.id,
                        order_id = %row.order_id,
                        tokens = ?unconverted.iter().map(|f| f.token.as_str()).collect::<Vec<_>>(),
                        "Flat fees in tokens other than base or quote are left out of fee_in_quote."
                    );
                }
                total
            }
            _ => Decimal::ZERO,
        };

        Ok(TradeFill {
            source_id: self.id.clone(),
            config_file_path: row.config_file_path.unwrap_or_default(),
            timestamp: normalize(parse_raw_timestamp("timestamp", &row.timestamp)?)?,
            order_id: row.order_id,
            exchange_trade_id: row.exchange_trade_id.unwrap_or_default(),
            side: TradeSide::from_name(&row.trade_type)?,
            price,
            amount,
            fee_in_quote,
            position: decode_position(row.position.as_deref())?,
            key,
        })
    }

    fn decode_order(&self, row: OrderRow) -> Result<Order, CoreError> {
        let creation_timestamp =
            normalize(parse_raw_timestamp("creation_timestamp", &row.creation_timestamp)?)?;
        let last_update_timestamp = match row.last_update_timestamp.as_deref() {
            Some(raw) => normalize(parse_raw_timestamp("last_update_timestamp", raw)?)?,
            None => creation_timestamp,
        };

        Ok(Order {
            source_id: self.id.clone(),
            id: row.id,
            config_file_path: row.config_file_path.unwrap_or_default(),
            key: GroupingKey::new(row.strategy, row.market, row.symbol),
            creation_timestamp,
            last_update_timestamp,
            // Market orders are stored without a price.
            price: optional_decimal("price", row.price.as_deref())?,
            amount: parse_decimal("amount", &row.amount)?,
            last_status: OrderStatus::from_name(&row.last_status)?,
            position: decode_position(row.position.as_deref())?,
            exchange_order_id: row.exchange_order_id,
        })
    }

    fn decode_executor(&self, row: ExecutorRow) -> Result<Executor, CoreError> {
        let config: ExecutorConfig = parse_embedded_blob("config", &row.config)?;
        let custom_info: CustomInfo = match row.custom_info.as_deref() {
            Some(raw) if !raw.trim().is_empty() => parse_embedded_blob("custom_info", raw)?,
            _ => CustomInfo::default(),
        };
        let close_timestamp = row
            .close_timestamp
            .as_deref()
            .map(|raw| parse_raw_timestamp("close_timestamp", raw).and_then(|ts| normalize(ts)))
            .transpose()?;

        Ok(Executor {
            source_id: self.id.clone(),
            id: row.id,
            executor_type: row.executor_type,
            open_timestamp: normalize(parse_raw_timestamp("timestamp", &row.timestamp)?)?,
            close_timestamp,
            close_type: row.close_type.map(CloseType::from_code).transpose()?,
            status: RunStatus::from_code(row.status)?,
            config,
            custom_info,
            net_pnl_pct: optional_decimal("net_pnl_pct", row.net_pnl_pct.as_deref())?,
            net_pnl_quote: optional_decimal("net_pnl_quote", row.net_pnl_quote.as_deref())?,
            cum_fees_quote: optional_decimal("cum_fees_quote", row.cum_fees_quote.as_deref())?,
            filled_amount_quote: optional_decimal(
                "filled_amount_quote",
                row.filled_amount_quote.as_deref(),
            )?,
            is_active: row.is_active.unwrap_or(0) != 0,
            is_trading: row.is_trading.unwrap_or(0) != 0,
            controller_id: row.controller_id.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl RecordSource for SqliteRecordSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    async fn read_fills(&self, filter: &RecordFilter) -> Result<Vec<TradeFill>, DbError> {
        // The connection goes back to the pool when `conn` drops, on every path.
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, FillRow>(FILLS_QUERY)
            .fetch_all(&mut *conn)
            .await?;
        drop(conn);

        let mut fills = rows
            .into_iter()
            .map(|row| self.decode_fill(row))
            .collect::<Result<Vec<_>, _>>()
            .map_err(DbError::decode(TableKind::Fills))?;
        sort_chronologically(&mut fills, |f| f.timestamp);
        fills.retain(|f| filter.matches_fill(f));

        tracing::debug!(source = %self.id, rows = fills.len(), "Read fills.");
        Ok(fills)
    }

    async fn read_orders(&self, filter: &RecordFilter) -> Result<Vec<Order>, DbError> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, OrderRow>(ORDERS_QUERY)
            .fetch_all(&mut *conn)
            .await?;
        drop(conn);

        let mut orders = rows
            .into_iter()
            .map(|row| self.decode_order(row))
            .collect::<Result<Vec<_>, _>>()
            .map_err(DbError::decode(TableKind::Orders))?;
        sort_chronologically(&mut orders, |o| o.creation_timestamp);
        orders.retain(|o| filter.matches_order(o));

        tracing::debug!(source = %self.id, rows = orders.len(), "Read orders.");
        Ok(orders)
    }

    async fn read_executors(&self, filter: &RecordFilter) -> Result<Vec<Executor>, DbError> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, ExecutorRow>(EXECUTORS_QUERY)
            .fetch_all(&mut *conn)
            .await?;
        drop(conn);

        let mut executors = rows
            .into_iter()
            .map(|row| self.decode_executor(row))
            .collect::<Result<Vec<_>, _>>()
            .map_err(DbError::decode(TableKind::Executors))?;
        sort_chronologically(&mut executors, |e| e.open_timestamp);
        executors.retain(|e| filter.matches_executor(e));

        tracing::debug!(source = %self.id, rows = executors.len(), "Read executors.");
        Ok(executors)
    }
}

/// Integers keep full precision; anything else goes through `f64`.
fn parse_raw_timestamp(field: &str, text: &str) -> Result<RawTimestamp, CoreError> {
    let text = text.trim();
    if let Ok(v) = text.parse::<i64>() {
        return Ok(RawTimestamp::Int(v));
    }
    text.parse::<f64>()
        .map(RawTimestamp::Float)
        .map_err(|_| CoreError::InvalidNumber(field.to_string(), text.to_string()))
}

fn parse_decimal(field: &str, text: &str) -> Result<Decimal, CoreError> {
    let text = text.trim();
    let parsed = if text.contains(['e', 'E']) {
        Decimal::from_scientific(text)
    } else {
        Decimal::from_str(text)
    };
    parsed.map_err(|_| CoreError::InvalidNumber(field.to_string(), text.to_string()))
}

fn optional_decimal(field: &str, text: Option<&str>) -> Result<Decimal, CoreError> {
    text.map(|t| parse_decimal(field, t))
        .transpose()
        .map(Option::unwrap_or_default)
}

fn decode_position(raw: Option<&str>) -> Result<PositionRole, CoreError> {
    match raw {
        Some(name) if !name.trim().is_empty() => PositionRole::from_name(name),
        _ => Ok(PositionRole::Nil),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sqlx::sqlite::SqlitePoolOptions;

    const SCHEMA: &str = r#"
        CREATE TABLE TradeFill (
            config_file_path TEXT, strategy TEXT NOT NULL, market TEXT NOT NULL,
            symbol TEXT NOT NULL, timestamp INTEGER NOT NULL, order_id TEXT NOT NULL,
            trade_type TEXT NOT NULL, price REAL NOT NULL, amount REAL NOT NULL,
            trade_fee TEXT, position TEXT, exchange_trade_id TEXT
        );
        CREATE TABLE "Order" (
            id TEXT PRIMARY KEY, config_file_path TEXT, strategy TEXT NOT NULL,
            market TEXT NOT NULL, symbol TEXT NOT NULL, creation_timestamp INTEGER NOT NULL,
            last_update_timestamp INTEGER, price REAL, amount REAL NOT NULL,
            last_status TEXT NOT NULL, position TEXT, exchange_order_id TEXT
        );
        CREATE TABLE Executors (
            id TEXT PRIMARY KEY, type TEXT NOT NULL, timestamp REAL NOT NULL,
            close_timestamp REAL, close_type INTEGER, status INTEGER NOT NULL,
            config TEXT NOT NULL, custom_info TEXT, net_pnl_pct REAL, net_pnl_quote REAL,
            cum_fees_quote REAL, filled_amount_quote REAL, is_active INTEGER,
            is_trading INTEGER, controller_id TEXT
        );
    "#;

    async fn pool_with(seed: &str) -> SqlitePool {
        // A single connection so every query sees the same in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::raw_sql(SCHEMA).execute(&pool).await.unwrap();
        sqlx::raw_sql(seed).execute(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn reads_fills_with_mixed_timestamp_precision_in_order() {
        let pool = pool_with(
            r#"
            INSERT INTO TradeFill VALUES
              ('conf.yml', 'pmm', 'binance', 'BTC-USDT', 1700000002000, 'o2', 'SELL', 110.0, 1.0,
               '{"percent": "0.001", "flat_fees": []}', 'NIL', 't2'),
              ('conf.yml', 'pmm', 'binance', 'BTC-USDT', 1700000001, 'o1', 'BUY', 100.0, 1.0,
               NULL, NULL, 't1');
            "#,
        )
        .await;
        let source = SqliteRecordSource::new("bot-a", pool);

        let fills = source.read_fills(&RecordFilter::default()).await.unwrap();
        assert_eq!(fills.len(), 2);
        assert_eq!(fills[0].order_id, "o1");
        assert_eq!(fills[0].timestamp, 1_700_000_001.0);
        assert_eq!(fills[1].timestamp, 1_700_000_002.0);
        assert_eq!(fills[0].side, TradeSide::Buy);
        assert_eq!(fills[1].price, dec!(110));
        assert_eq!(fills[1].fee_in_quote, dec!(0.11));
        assert_eq!(fills[0].fee_in_quote, Decimal::ZERO);
        assert!(fills.iter().all(|f| f.source_id == "bot-a"));
    }

    #[tokio::test]
    async fn filters_after_normalization() {
        let pool = pool_with(
            r#"
            INSERT INTO TradeFill VALUES
              ('a.yml', 'pmm', 'binance', 'BTC-USDT', 1700000001000, 'o1', 'BUY', 100.0, 1.0, NULL, NULL, NULL),
              ('b.yml', 'pmm', 'binance', 'BTC-USDT', 1700000005000, 'o2', 'BUY', 100.0, 1.0, NULL, NULL, NULL);
            "#,
        )
        .await;
        let source = SqliteRecordSource::new("bot-a", pool);

        let filter = RecordFilter {
            time_range: core_types::TimeRange {
                start: Some(1_700_000_000.0),
                end: Some(1_700_000_003.0),
            },
            ..RecordFilter::default()
        };
        let fills = source.read_fills(&filter).await.unwrap();
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].order_id, "o1");

        let scoped = RecordFilter {
            config_file_path: Some("b.yml".to_string()),
            ..RecordFilter::default()
        };
        let fills = source.read_fills(&scoped).await.unwrap();
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].order_id, "o2");
    }

    #[tokio::test]
    async fn one_bad_record_fails_the_whole_read() {
        let pool = pool_with(
            r#"
            INSERT INTO TradeFill VALUES
              ('c', 'pmm', 'binance', 'BTC-USDT', 1700000001, 'o1', 'BUY', 100.0, 1.0, NULL, NULL, NULL),
              ('c', 'pmm', 'binance', 'BTC-USDT', 1700, 'o2', 'BUY', 100.0, 1.0, NULL, NULL, NULL);
            "#,
        )
        .await;
        let source = SqliteRecordSource::new("bot-a", pool);

        let err = source.read_fills(&RecordFilter::default()).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Decode {
                table: TableKind::Fills,
                source: CoreError::UnrecognizedTimestampMagnitude(_),
            }
        ));
    }

    #[tokio::test]
    async fn decodes_orders_and_executors() {
        let pool = pool_with(
            r#"
            INSERT INTO "Order" VALUES
              ('o1', 'c', 'pmm', 'binance', 'BTC-USDT', 1700000000000, 1700000001000, 100.0, 1.0,
               'BuyOrderCompleted', 'OPEN', 'x1'),
              ('o2', 'c', 'pmm', 'binance', 'BTC-USDT', 1700000002000, NULL, NULL, 1.0,
               'OrderCancelled', NULL, NULL);
            INSERT INTO Executors VALUES
              ('e1', 'position_executor', 1700000000.5, 1700000600.5, 3, 4,
               '{"trading_pair": "BTC-USDT", "connector_name": "binance", "side": 1,
                 "triple_barrier_config": {"stop_loss": "0.02", "take_profit": "0.04", "time_limit": 3600}}',
               '{"current_position_average_price": "100", "close_price": "104", "order_ids": ["o1"]}',
               0.04, 4.0, 0.1, 100.0, 0, 0, 'ctrl-1'),
              ('e2', 'dca_executor', 1700000700, NULL, NULL, 2,
               '{"trading_pair": "BTC-USDT", "connector_name": "binance", "prices": ["100", "99"]}',
               NULL, NULL, NULL, NULL, NULL, 1, 1, NULL);
            "#,
        )
        .await;
        let source = SqliteRecordSource::new("bot-b", pool);

        let orders = source.read_orders(&RecordFilter::default()).await.unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].last_status, OrderStatus::Filled);
        assert_eq!(orders[0].position, PositionRole::Open);
        assert_eq!(orders[0].last_update_timestamp, 1_700_000_001.0);
        assert_eq!(orders[1].last_status, OrderStatus::Cancelled);
        assert_eq!(orders[1].price, Decimal::ZERO);
        assert_eq!(orders[1].last_update_timestamp, orders[1].creation_timestamp);

        let executors = source.read_executors(&RecordFilter::default()).await.unwrap();
        assert_eq!(executors.len(), 2);
        let closed = &executors[0];
        assert_eq!(closed.close_type, Some(CloseType::TakeProfit));
        assert_eq!(closed.status, RunStatus::Terminated);
        assert_eq!(closed.config.stop_loss, dec!(0.02));
        assert_eq!(closed.config.time_limit, 3600);
        assert_eq!(closed.custom_info.average_entry_price, dec!(100));
        assert_eq!(closed.net_pnl_quote, dec!(4));
        assert_eq!(closed.duration(), Some(600.0));
        assert_eq!(closed.controller_id, "ctrl-1");

        let open = &executors[1];
        assert!(!open.is_closed());
        assert_eq!(open.close_type, None);
        assert!(open.is_active);
        assert_eq!(open.config.prices.len(), 2);
        assert_eq!(open.controller_id, "");
    }

    #[tokio::test]
    async fn unknown_close_type_fails_the_executor_read() {
        let pool = pool_with(
            r#"
            INSERT INTO Executors VALUES
              ('e1', 'position_executor', 1700000000, 1700000600, 42, 4,
               '{"trading_pair": "BTC-USDT", "connector_name": "binance"}',
               NULL, 0, 0, 0, 0, 0, 0, 'c');
            "#,
        )
        .await;
        let source = SqliteRecordSource::new("bot-c", pool);

        let err = source.read_executors(&RecordFilter::default()).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Decode {
                table: TableKind::Executors,
                source: CoreError::UnknownEnumCode { code: 42, .. },
            }
        ));
    }

    #[tokio::test]
    async fn health_reports_each_table() {
        let pool = pool_with(
            r#"
            INSERT INTO TradeFill VALUES
              ('c', 'pmm', 'binance', 'BTC-USDT', 1700000001, 'o1', 'BUY', 100.0, 1.0, NULL, NULL, NULL);
            INSERT INTO "Order" VALUES
              ('o1', 'c', 'pmm', 'binance', 'BTC-USDT', 1700000000000, NULL, 100.0, 1.0, 'Exploded', NULL, NULL);
            "#,
        )
        .await;
        let source = SqliteRecordSource::new("bot-d", pool);

        let status = source.health().await;
        assert_eq!(status.fills, crate::TableCheck::Readable { rows: 1 });
        assert!(matches!(status.orders, crate::TableCheck::Unreadable { .. }));
        assert_eq!(status.executors, crate::TableCheck::Empty);
        assert!(!status.is_healthy());
        assert_eq!(status.failing_tables(), vec![TableKind::Orders, TableKind::Executors]);
    }

    #[test]
    fn parses_sqlite_number_renderings() {
        assert_eq!(parse_decimal("p", "100.0").unwrap(), dec!(100));
        assert_eq!(parse_decimal("p", "1.0e-05").unwrap(), dec!(0.00001));
        assert!(parse_decimal("p", "abc").is_err());
        assert_eq!(
            parse_raw_timestamp("t", "1700000000000").unwrap(),
            RawTimestamp::Int(1_700_000_000_000)
        );
        assert_eq!(
            parse_raw_timestamp("t", "1700000000.5").unwrap(),
            RawTimestamp::Float(1_700_000_000.5)
        );
    }
}
