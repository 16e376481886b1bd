//! Tick ingestion and aggregation for the tickframe engine.
//!
//! This crate handles:
//! - CSV and demo tick sources
//! - Normalization (validation, stable sort, dedup, dense ids)
//! - Gap measurement, weekend trimming and coverage
//! - Time-window and count-window bar building

pub mod bar_builder;
pub mod csv_source;
pub mod demo;
pub mod gap;
pub mod normalizer;

pub use bar_builder::{BarBuilder, FrameBars};
pub use csv_source::read_csv_ticks;
pub use demo::demo_ticks;
pub use gap::{analyze_gaps, GapAnalysis};
pub use normalizer::{normalize, NormalizeStats, NormalizedTickSeries};
