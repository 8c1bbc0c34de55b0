use crate::enums::{CloseType, OrderStatus, PositionRole, RunStatus, TradeSide};
use crate::error::CoreError;
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::hash::Hash;

/// An explicit, exhaustive mapping between stored codes/names and enum variants.
///
/// Lookups never fall back to a default: a code or name missing from the table
/// is an error, so new values introduced by a source system surface immediately.
#[derive(Debug)]
pub struct EnumTable<T: 'static> {
    kind: &'static str,
    by_code: HashMap<i64, T>,
    by_name: HashMap<String, T>,
    codes: HashMap<T, i64>,
    names: HashMap<T, &'static str>,
}

impl<T> EnumTable<T>
where
    T: Copy + Eq + Hash + 'static,
{
    /// Builds a table from `(code, canonical name, variant)` entries.
    pub fn new(kind: &'static str, entries: &[(i64, &'static str, T)]) -> Self {
        let mut table = Self {
            kind,
            by_code: HashMap::with_capacity(entries.len()),
            by_name: HashMap::with_capacity(entries.len()),
            codes: HashMap::with_capacity(entries.len()),
            names: HashMap::with_capacity(entries.len()),
        };
        for &(code, name, variant) in entries {
            table.by_code.insert(code, variant);
            table.by_name.insert(name.to_ascii_uppercase(), variant);
            table.codes.insert(variant, code);
            table.names.insert(variant, name);
        }
        table
    }

    /// Builds a table for enums that are only ever stored as text.
    pub fn names_only(kind: &'static str, entries: &[(&'static str, T)]) -> Self {
        let mut table = Self::new(kind, &[]);
        for &(name, variant) in entries {
            table.names.entry(variant).or_insert(name);
        }
        table.with_aliases(entries)
    }

    /// Registers additional spellings for existing variants.
    pub fn with_aliases(mut self, aliases: &[(&'static str, T)]) -> Self {
        for &(alias, variant) in aliases {
            self.by_name.insert(alias.to_ascii_uppercase(), variant);
        }
        self
    }

    pub fn decode(&self, code: i64) -> Result<T, CoreError> {
        self.by_code.get(&code).copied().ok_or(CoreError::UnknownEnumCode {
            kind: self.kind,
            code,
        })
    }

    /// Case-insensitive lookup by name or alias.
    pub fn decode_name(&self, name: &str) -> Result<T, CoreError> {
        self.by_name
            .get(&name.trim().to_ascii_uppercase())
            .copied()
            .ok_or_else(|| CoreError::UnknownEnumName {
                kind: self.kind,
                name: name.to_string(),
            })
    }

    pub fn code_of(&self, variant: T) -> Option<i64> {
        self.codes.get(&variant).copied()
    }

    pub fn name_of(&self, variant: T) -> Option<&'static str> {
        self.names.get(&variant).copied()
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

/// Decodes an integer code through an explicit table.
pub fn decode_enum<T>(code: i64, table: &EnumTable<T>) -> Result<T, CoreError>
where
    T: Copy + Eq + Hash + 'static,
{
    table.decode(code)
}

/// Enums that have a process-wide decoding table.
pub trait TableEnum: Copy + Eq + Hash + 'static {
    fn table() -> &'static EnumTable<Self>;

    fn from_code(code: i64) -> Result<Self, CoreError> {
        Self::table().decode(code)
    }

    fn from_name(name: &str) -> Result<Self, CoreError> {
        Self::table().decode_name(name)
    }
}

pub static CLOSE_TYPES: Lazy<EnumTable<CloseType>> = Lazy::new(|| {
    EnumTable::new(
        "close type",
        &[
            (1, "TIME_LIMIT", CloseType::TimeLimit),
            (2, "STOP_LOSS", CloseType::StopLoss),
            (3, "TAKE_PROFIT", CloseType::TakeProfit),
            (4, "EXPIRED", CloseType::Expired),
            (5, "EARLY_STOP", CloseType::EarlyStop),
            (6, "TRAILING_STOP", CloseType::TrailingStop),
            (7, "INSUFFICIENT_BALANCE", CloseType::InsufficientBalance),
            (8, "FAILED", CloseType::Failed),
            (9, "COMPLETED", CloseType::Completed),
        ],
    )
});

pub static RUN_STATUSES: Lazy<EnumTable<RunStatus>> = Lazy::new(|| {
    EnumTable::new(
        "run status",
        &[
            (1, "NOT_STARTED", RunStatus::NotStarted),
            (2, "RUNNING", RunStatus::Running),
            (3, "SHUTTING_DOWN", RunStatus::ShuttingDown),
            (4, "TERMINATED", RunStatus::Terminated),
        ],
    )
});

pub static TRADE_SIDES: Lazy<EnumTable<TradeSide>> = Lazy::new(|| {
    EnumTable::new(
        "trade side",
        &[
            (1, "BUY", TradeSide::Buy),
            (2, "SELL", TradeSide::Sell),
            (3, "RANGE", TradeSide::Range),
        ],
    )
});

// Bots persist the name of the last order event rather than a status.
pub static ORDER_STATUSES: Lazy<EnumTable<OrderStatus>> = Lazy::new(|| {
    EnumTable::names_only(
        "order status",
        &[
            ("OPEN", OrderStatus::Open),
            ("BuyOrderCreated", OrderStatus::Open),
            ("SellOrderCreated", OrderStatus::Open),
            ("PARTIALLY_FILLED", OrderStatus::PartiallyFilled),
            ("OrderFilled", OrderStatus::PartiallyFilled),
            ("FILLED", OrderStatus::Filled),
            ("BuyOrderCompleted", OrderStatus::Filled),
            ("SellOrderCompleted", OrderStatus::Filled),
            ("CANCELLED", OrderStatus::Cancelled),
            ("CANCELED", OrderStatus::Cancelled),
            ("OrderCancelled", OrderStatus::Cancelled),
            ("OrderExpired", OrderStatus::Cancelled),
            ("FAILED", OrderStatus::Failed),
            ("OrderFailure", OrderStatus::Failed),
        ],
    )
});

pub static POSITION_ROLES: Lazy<EnumTable<PositionRole>> = Lazy::new(|| {
    EnumTable::names_only(
        "position role",
        &[
            ("OPEN", PositionRole::Open),
            ("CLOSE", PositionRole::Close),
            ("NIL", PositionRole::Nil),
        ],
    )
});

impl TableEnum for CloseType {
    fn table() -> &'static EnumTable<Self> {
        &CLOSE_TYPES
    }
}

impl TableEnum for RunStatus {
    fn table() -> &'static EnumTable<Self> {
        &RUN_STATUSES
    }
}

impl TableEnum for TradeSide {
    fn table() -> &'static EnumTable<Self> {
        &TRADE_SIDES
    }
}

impl TableEnum for OrderStatus {
    fn table() -> &'static EnumTable<Self> {
        &ORDER_STATUSES
    }
}

impl TableEnum for PositionRole {
    fn table() -> &'static EnumTable<Self> {
        &POSITION_ROLES
    }
}

/// Parses one of the JSON blobs a bot embeds in its tables.
///
/// The storage layer hands these over as raw text; interpretation happens only here.
pub fn parse_embedded_blob<T: DeserializeOwned>(blob: &'static str, raw: &str) -> Result<T, CoreError> {
    serde_json::from_str(raw).map_err(|source| CoreError::MalformedEmbeddedBlob { blob, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_every_declared_close_type() {
        for code in 1..=9 {
            let first = decode_enum(code, &*CLOSE_TYPES).unwrap();
            let second = decode_enum(code, &*CLOSE_TYPES).unwrap();
            assert_eq!(first, second);
            assert_eq!(CLOSE_TYPES.code_of(first), Some(code));
        }
        assert_eq!(CloseType::from_code(3).unwrap(), CloseType::TakeProfit);
    }

    #[test]
    fn unknown_codes_fail_instead_of_defaulting() {
        for code in [0, 10, -1, 42] {
            assert!(matches!(
                decode_enum(code, &*CLOSE_TYPES),
                Err(CoreError::UnknownEnumCode { kind: "close type", .. })
            ));
        }
        assert!(RunStatus::from_code(5).is_err());
        assert!(TradeSide::from_code(0).is_err());
    }

    #[test]
    fn decodes_names_and_event_aliases() {
        assert_eq!(TradeSide::from_name("BUY").unwrap(), TradeSide::Buy);
        assert_eq!(TradeSide::from_name("sell").unwrap(), TradeSide::Sell);
        assert_eq!(OrderStatus::from_name("SellOrderCompleted").unwrap(), OrderStatus::Filled);
        assert_eq!(OrderStatus::from_name("FILLED").unwrap(), OrderStatus::Filled);
        assert_eq!(OrderStatus::from_name("OrderCancelled").unwrap(), OrderStatus::Cancelled);
        assert_eq!(PositionRole::from_name("nil").unwrap(), PositionRole::Nil);
        assert!(matches!(
            OrderStatus::from_name("Exploded"),
            Err(CoreError::UnknownEnumName { kind: "order status", .. })
        ));
    }

    #[test]
    fn name_only_tables_keep_the_first_spelling_as_canonical() {
        assert_eq!(ORDER_STATUSES.name_of(OrderStatus::Filled), Some("FILLED"));
        assert_eq!(ORDER_STATUSES.code_of(OrderStatus::Filled), None);
    }

    #[test]
    fn malformed_blob_is_reported() {
        let result: Result<serde_json::Value, _> = parse_embedded_blob("config", "{\"a\": ");
        assert!(matches!(
            result,
            Err(CoreError::MalformedEmbeddedBlob { blob: "config", .. })
        ));
    }
}
