//! Core types and configuration for the tickframe engine.
//!
//! This crate provides shared types used across all other crates:
//! - Tick, bar and gap data types plus the fixed bar-file schema
//! - The validated run configuration
//! - Common error types with stable error codes

pub mod config;
pub mod error;
pub mod types;

pub use config::{CsvConfig, FrameConfig, NegativeSpreadPolicy, RunConfig};
pub use error::{Error, Result};
pub use types::*;
