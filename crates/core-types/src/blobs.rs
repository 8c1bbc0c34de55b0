//! Typed views of the JSON blobs bots embed in their tables.
//!
//! Source systems are loose about these: numbers arrive as strings or floats,
//! optional values are either absent or `null`, and older executors keep their
//! barrier settings under a nested `triple_barrier_config`. Everything is
//! resolved here so the rest of the system only sees the canonical shape.

use crate::decoder::TableEnum;
use crate::enums::TradeSide;
use rust_decimal::Decimal;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Trailing stop settings of a position executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailingStop {
    #[serde(default, deserialize_with = "decimal_or_zero")]
    pub activation_price: Decimal,
    #[serde(default, deserialize_with = "decimal_or_zero")]
    pub trailing_delta: Decimal,
}

/// The `config` column of an executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ExecutorConfigRepr")]
pub struct ExecutorConfig {
    pub trading_pair: String,
    pub connector_name: String,
    #[serde(serialize_with = "side_as_code")]
    pub side: Option<TradeSide>,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    /// Seconds; 0 when the executor has no time limit.
    pub time_limit: i64,
    pub trailing_stop: Option<TrailingStop>,
    pub level_id: i64,
    /// Price ladder of multi-level executors. Empty for single-entry executors.
    pub prices: Vec<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_ids: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct TripleBarrierRepr {
    #[serde(default, deserialize_with = "optional_decimal")]
    stop_loss: Option<Decimal>,
    #[serde(default, deserialize_with = "optional_decimal")]
    take_profit: Option<Decimal>,
    #[serde(default, deserialize_with = "optional_seconds")]
    time_limit: Option<i64>,
    #[serde(default)]
    trailing_stop: Option<TrailingStop>,
}

#[derive(Deserialize)]
struct ExecutorConfigRepr {
    trading_pair: String,
    connector_name: String,
    #[serde(default, deserialize_with = "optional_side")]
    side: Option<TradeSide>,
    #[serde(default, deserialize_with = "optional_decimal")]
    stop_loss: Option<Decimal>,
    #[serde(default, deserialize_with = "optional_decimal")]
    take_profit: Option<Decimal>,
    #[serde(default, deserialize_with = "optional_seconds")]
    time_limit: Option<i64>,
    #[serde(default)]
    trailing_stop: Option<TrailingStop>,
    #[serde(default)]
    triple_barrier_config: Option<TripleBarrierRepr>,
    #[serde(default, deserialize_with = "level_id")]
    level_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    prices: Vec<Decimal>,
    #[serde(default)]
    order_ids: Option<Vec<String>>,
}

impl From<ExecutorConfigRepr> for ExecutorConfig {
    fn from(repr: ExecutorConfigRepr) -> Self {
        // Nested barrier values win over flat ones.
        let barrier = repr.triple_barrier_config;
        let nested = barrier.as_ref();
        Self {
            trading_pair: repr.trading_pair,
            connector_name: repr.connector_name,
            side: repr.side,
            stop_loss: nested
                .and_then(|b| b.stop_loss)
                .or(repr.stop_loss)
                .unwrap_or_default(),
            take_profit: nested
                .and_then(|b| b.take_profit)
                .or(repr.take_profit)
                .unwrap_or_default(),
            time_limit: nested
                .and_then(|b| b.time_limit)
                .or(repr.time_limit)
                .unwrap_or_default(),
            trailing_stop: barrier
                .and_then(|b| b.trailing_stop)
                .or(repr.trailing_stop),
            level_id: repr.level_id,
            prices: repr.prices,
            order_ids: repr.order_ids,
        }
    }
}

/// The `custom_info` column of an executor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CustomInfo {
    #[serde(
        default,
        alias = "current_position_average_price",
        deserialize_with = "decimal_or_zero"
    )]
    pub average_entry_price: Decimal,
    #[serde(default, deserialize_with = "decimal_or_zero")]
    pub close_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_ids: Option<Vec<String>>,
}

/// One fixed fee charged in some token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatFee {
    pub token: String,
    #[serde(deserialize_with = "decimal_or_zero")]
    pub amount: Decimal,
}

/// The `trade_fee` column of a fill.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TradeFeeBlob {
    #[serde(default, deserialize_with = "decimal_or_zero")]
    pub percent: Decimal,
    #[serde(default)]
    pub percent_token: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub flat_fees: Vec<FlatFee>,
}

impl TradeFeeBlob {
    /// Total fee expressed in the quote asset.
    ///
    /// Flat fees charged in a token other than the pair's base or quote have no
    /// price to convert with and are returned separately.
    pub fn fee_in_quote(
        &self,
        price: Decimal,
        amount: Decimal,
        base: &str,
        quote: &str,
    ) -> (Decimal, Vec<FlatFee>) {
        let mut total = self.percent * price * amount;
        let mut unconverted = Vec::new();
        for fee in &self.flat_fees {
            if fee.token.eq_ignore_ascii_case(quote) {
                total += fee.amount;
            } else if fee.token.eq_ignore_ascii_case(base) {
                total += fee.amount * price;
            } else {
                unconverted.push(fee.clone());
            }
        }
        (total, unconverted)
    }
}

fn optional_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Decimal>::deserialize(deserializer)
}

fn decimal_or_zero<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Decimal>::deserialize(deserializer)?.unwrap_or_default())
}

fn optional_seconds<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.map(|v| v as i64))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CodeOrName {
    Code(i64),
    Name(String),
}

fn optional_side<'de, D>(deserializer: D) -> Result<Option<TradeSide>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<CodeOrName>::deserialize(deserializer)? {
        None => Ok(None),
        Some(CodeOrName::Code(code)) => TradeSide::from_code(code).map(Some).map_err(de::Error::custom),
        Some(CodeOrName::Name(name)) => TradeSide::from_name(&name).map(Some).map_err(de::Error::custom),
    }
}

fn side_as_code<S>(side: &Option<TradeSide>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match side.and_then(|s| TradeSide::table().code_of(s)) {
        Some(code) => serializer.serialize_some(&code),
        None => serializer.serialize_none(),
    }
}

/// Level ids are stored either as a number or as text such as `buy_3`.
fn level_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<CodeOrName>::deserialize(deserializer)? {
        None => Ok(0),
        Some(CodeOrName::Code(id)) => Ok(id),
        Some(CodeOrName::Name(text)) => {
            let suffix = text.rsplit('_').next().unwrap_or(text.as_str());
            suffix
                .trim()
                .parse::<i64>()
                .map_err(|_| de::Error::custom(format!("level_id '{text}' has no numeric suffix")))
        }
    }
}
