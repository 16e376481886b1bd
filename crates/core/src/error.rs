//! Error types for the tickframe engine.
//!
//! Every failure surfaces a stable machine-readable code (see
//! [`Error::code`]) plus contextual detail such as the offending row or
//! the observed vs. configured values.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the tickframe engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Unknown, missing or malformed configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Required input columns are absent.
    #[error("missing required column(s): {columns:?}")]
    MissingColumn { columns: Vec<String> },

    /// A timestamp could not be parsed or resolved to UTC.
    #[error("row {row}: cannot resolve timestamp {value:?} to UTC: {reason}")]
    Timezone {
        row: u64,
        value: String,
        reason: String,
    },

    /// Crossed quote under the abort policy.
    #[error("row {row}: crossed quote, ask {ask} < bid {bid}")]
    NegativeSpread { row: u64, bid: f64, ask: f64 },

    /// Input required reordering while strict ordering was requested.
    #[error("input not sorted by timestamp, first out-of-order row {row}")]
    UnsortedInput { row: u64 },

    /// Flagged gap time exceeds the configured fatal ratio.
    #[error("flagged gap ratio {observed:.4} exceeds fatal limit {limit:.4}")]
    GapExcess { observed: f64, limit: f64 },

    /// Invalid bar frame specification.
    #[error("invalid bar spec {spec:?}: {reason}")]
    BarSpecInvalid { spec: String, reason: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read/write error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Stable error code; part of the external contract.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::MissingColumn { .. } => "MISSING_COLUMN",
            Error::Timezone { .. } => "TIMEZONE_ERROR",
            Error::NegativeSpread { .. } => "NEGATIVE_SPREAD",
            Error::UnsortedInput { .. } => "UNSORTED_INPUT",
            Error::GapExcess { .. } => "GAP_EXCESS",
            Error::BarSpecInvalid { .. } => "BAR_SPEC_INVALID",
            Error::Io(_) | Error::Csv(_) | Error::Json(_) => "IO_ERROR",
        }
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a missing-column error.
    pub fn missing_columns(columns: Vec<String>) -> Self {
        Error::MissingColumn { columns }
    }

    /// Create a timestamp resolution error.
    pub fn timezone(row: u64, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Timezone {
            row,
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a bar-spec error.
    pub fn bar_spec(spec: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::BarSpecInvalid {
            spec: spec.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_codes() {
        assert_eq!(Error::config("x").code(), "CONFIG_ERROR");
        assert_eq!(
            Error::missing_columns(vec!["ask".to_string()]).code(),
            "MISSING_COLUMN"
        );
        assert_eq!(Error::timezone(3, "nope", "parse").code(), "TIMEZONE_ERROR");
        assert_eq!(
            Error::NegativeSpread {
                row: 1,
                bid: 1.1,
                ask: 1.0
            }
            .code(),
            "NEGATIVE_SPREAD"
        );
        assert_eq!(Error::UnsortedInput { row: 2 }.code(), "UNSORTED_INPUT");
        assert_eq!(
            Error::GapExcess {
                observed: 0.5,
                limit: 0.25
            }
            .code(),
            "GAP_EXCESS"
        );
        assert_eq!(Error::bar_spec("0m", "bad").code(), "BAR_SPEC_INVALID");
        let io = Error::from(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert_eq!(io.code(), "IO_ERROR");
    }

    #[test]
    fn test_detail_in_message() {
        let err = Error::NegativeSpread {
            row: 42,
            bid: 1.10002,
            ask: 1.10000,
        };
        let msg = err.to_string();
        assert!(msg.contains("42"));
        assert!(msg.contains("1.10002"));
    }
}
