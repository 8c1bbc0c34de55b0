//! # Botlens Analytics
//!
//! Turns aggregated bot records into per-fill PnL attribution, executor level
//! analysis and summary performance statistics.
//!
//! ## Architectural Principles
//!
//! - **Pure Logic:** This crate has no knowledge of storage. It depends only on
//!   `core-types` and operates on already-normalized, already-decoded records.
//! - **Stateless Calculation:** Every processor is a stateless calculator. Running
//!   state lives inside a single call and never outlives it, so the same input
//!   always yields the same output.
//!
//! ## Public API
//!
//! - `TradeFillProcessor`: cumulative inventory, fee and PnL attribution per fill.
//! - `ExecutorLinker`: joins closed executors to their completed orders and levels.
//! - `PerformanceMetrics`: portfolio and per-group `PerformanceSnapshot`s.
//! - `Frame` / `IntoFrame`: tabular views of every result set.
//! - `AnalyticsError`: The specific error types that can be returned from this crate.

pub mod engine;
pub mod error;
pub mod fills;
pub mod linker;
pub mod report;
pub mod table;

pub use engine::PerformanceMetrics;
pub use error::AnalyticsError;
pub use fills::{summarize, FillSummary, ProcessedFill, TradeFillProcessor};
pub use linker::{ExecutorLevels, ExecutorLinker, LevelStats, LinkedFill};
pub use report::PerformanceSnapshot;
pub use table::{Frame, IntoFrame};
