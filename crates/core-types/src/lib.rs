//! # Core Types
//!
//! The shared vocabulary of the pipeline: the records read from bot databases,
//! the enums they carry, and the two leaf transformations every reader applies
//! inline.
//!
//! - `timestamp`: classifies raw timestamps by magnitude and converts them to seconds.
//! - `decoder`: explicit code/name tables for every stored enum, plus blob parsing.
//! - `blobs`: typed views of the embedded `config`, `custom_info` and `trade_fee` JSON.

pub mod blobs;
pub mod decoder;
pub mod enums;
pub mod error;
pub mod structs;
pub mod timestamp;

// Re-export the core types to provide a clean public API.
pub use blobs::{CustomInfo, ExecutorConfig, FlatFee, TradeFeeBlob, TrailingStop};
pub use decoder::{decode_enum, parse_embedded_blob, EnumTable, TableEnum};
pub use enums::{CloseType, OrderStatus, PositionRole, RunStatus, TradeSide, COMPLETED_ORDER_STATUSES};
pub use error::CoreError;
pub use structs::{Executor, GroupingKey, Order, TimeRange, TradeFill};
pub use timestamp::{normalize, RawTimestamp, TimestampUnit};
