//! # Record Sources
//!
//! This crate is the boundary to the stores trading bots write to. It turns
//! raw rows into the typed records of `core-types` and never writes back.
//!
//! ## Architectural Principles
//!
//! - **Adapter:** `RecordSource` hides how a store is laid out. `SqliteRecordSource`
//!   reads a bot's SQLite file; `InMemoryRecordSource` serves records that were
//!   decoded elsewhere.
//! - **All or nothing:** a read that meets a record it cannot decode fails as a
//!   whole. Cumulative figures downstream are meaningless over partial data.
//! - **Explicit fan-out:** `SourceAggregator` is a plain value handed to the
//!   pipeline. It probes and reads sources concurrently and merges them in a
//!   deterministic order.
//!
//! ## Public API
//!
//! - `connect`: opens a read-only pool onto a bot database file.
//! - `RecordSource`, `RecordFilter`, `SourceStatus`, `TableCheck`, `TableKind`.
//! - `SourceAggregator`, `AggregatedRecords`, `SourceExclusion`.
//! - `DbError`: the specific error types that can be returned from this crate.

pub mod aggregator;
pub mod connection;
pub mod error;
pub mod memory;
pub mod source;
pub mod sqlite;

pub use aggregator::{AggregatedRecords, SourceAggregator, SourceExclusion};
pub use connection::connect;
pub use error::DbError;
pub use memory::InMemoryRecordSource;
pub use source::{RecordFilter, RecordSource, SourceStatus, TableCheck, TableKind, DEFAULT_PROBE_TIMEOUT};
pub use sqlite::SqliteRecordSource;
