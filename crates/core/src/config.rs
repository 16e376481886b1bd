//! Run configuration: every recognized option, validated at entry.
//!
//! The configuration is an explicit structure rather than a free-form
//! dict; unknown or malformed keys are rejected with `CONFIG_ERROR`
//! before any processing begins.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::types::{BarSpec, PriceBasis, NS_PER_SEC};

/// What to do when a row quotes ask below bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NegativeSpreadPolicy {
    /// Abort the run on the first crossed quote.
    #[default]
    Abort,
    /// Drop offending rows and count them.
    Drop,
}

/// CSV input source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CsvConfig {
    /// Path to the delimited tick file.
    pub path: PathBuf,
}

/// One configured bar frame, as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", deny_unknown_fields)]
pub enum FrameConfig {
    /// Fixed-time windows, e.g. `{"type": "time", "unit": "1m"}`.
    Time { unit: String },
    /// Fixed-count windows, e.g. `{"type": "tick", "count": 100}`.
    Tick { count: i64 },
}

impl FrameConfig {
    /// Resolve to a validated [`BarSpec`].
    pub fn to_spec(&self) -> Result<BarSpec> {
        match self {
            FrameConfig::Time { unit } => BarSpec::time(unit),
            FrameConfig::Tick { count } => BarSpec::tick_count(*count),
        }
    }
}

/// Full run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Instrument symbol stamped into every bar row.
    #[serde(default = "default_symbol")]
    pub symbol: String,
    /// Root directory; the run writes to `out_dir/<run_id>/`.
    pub out_dir: PathBuf,
    /// Explicit run id. Generated when absent.
    #[serde(default)]
    pub run_id: Option<String>,
    /// CSV input source. Mutually exclusive with `demo`.
    #[serde(default)]
    pub csv: Option<CsvConfig>,
    /// Use the deterministic built-in demo series instead of a file.
    #[serde(default)]
    pub demo: bool,
    /// Bar frames to emit.
    #[serde(default)]
    pub bar_frames: Vec<FrameConfig>,
    /// Gap threshold in seconds.
    #[serde(default = "default_max_gap_seconds")]
    pub max_missing_gap_seconds: u64,
    /// Exclude the Sat 00:00 - Mon 00:00 UTC window from gap accounting.
    #[serde(default = "default_true")]
    pub trim_weekend: bool,
    /// Quote series driving O/H/L/C.
    #[serde(default)]
    pub price_basis: PriceBasis,
    /// Seed for the demo generator; recorded in the manifest.
    #[serde(default)]
    pub seed: u64,
    /// Fail with UNSORTED_INPUT instead of resorting.
    #[serde(default)]
    pub strict_sorted_input: bool,
    /// Crossed-quote policy.
    #[serde(default)]
    pub negative_spread_policy: NegativeSpreadPolicy,
    /// Remove exact `(timestamp, bid, ask)` duplicates.
    #[serde(default = "default_true")]
    pub dedup: bool,
    /// Flagged-gap share of total duration above which the run aborts.
    #[serde(default = "default_gap_fatal_ratio")]
    pub gap_fatal_ratio: f64,
}

fn default_symbol() -> String {
    "EURUSD".to_string()
}

fn default_max_gap_seconds() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_gap_fatal_ratio() -> f64 {
    0.25
}

impl RunConfig {
    /// Parse a JSON configuration document.
    ///
    /// Unknown keys, wrong types and malformed frames all surface as
    /// `CONFIG_ERROR` here, before any I/O.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::config(e.to_string()))
    }

    /// Gap threshold in nanoseconds.
    pub fn gap_threshold_ns(&self) -> i64 {
        self.max_missing_gap_seconds as i64 * NS_PER_SEC
    }

    /// Validate the configuration and resolve the bar frames.
    ///
    /// Performed before any filesystem access.
    pub fn validate(&self) -> Result<Vec<BarSpec>> {
        if self.symbol.trim().is_empty() {
            return Err(Error::config("symbol must not be empty"));
        }
        if self.out_dir.as_os_str().is_empty() {
            return Err(Error::config("out_dir must not be empty"));
        }
        match (&self.csv, self.demo) {
            (Some(_), true) => {
                return Err(Error::config(
                    "csv.path and demo are mutually exclusive, configure exactly one",
                ))
            }
            (None, false) => {
                return Err(Error::config(
                    "no input source: configure csv.path or demo: true",
                ))
            }
            _ => {}
        }
        if let Some(run_id) = &self.run_id {
            if run_id.trim().is_empty()
                || run_id
                    .chars()
                    .any(|c| !c.is_ascii_alphanumeric() && c != '-' && c != '_')
            {
                return Err(Error::config(format!(
                    "run_id {run_id:?} must be non-empty and [A-Za-z0-9_-]"
                )));
            }
        }
        if self.max_missing_gap_seconds == 0 {
            return Err(Error::config("max_missing_gap_seconds must be >= 1"));
        }
        if !(0.0..=1.0).contains(&self.gap_fatal_ratio) {
            return Err(Error::config(format!(
                "gap_fatal_ratio {} outside [0, 1]",
                self.gap_fatal_ratio
            )));
        }

        let mut specs = Vec::with_capacity(self.bar_frames.len());
        let mut labels = HashSet::new();
        for frame in &self.bar_frames {
            let spec = frame.to_spec()?;
            if !labels.insert(spec.label().to_string()) {
                return Err(Error::config(format!(
                    "duplicate bar frame {:?}",
                    spec.label()
                )));
            }
            specs.push(spec);
        }
        Ok(specs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_config() -> RunConfig {
        RunConfig::from_json(
            r#"{
                "out_dir": "/tmp/runs",
                "demo": true,
                "bar_frames": [
                    {"type": "time", "unit": "1m"},
                    {"type": "tick", "count": 100}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = demo_config();
        assert_eq!(config.symbol, "EURUSD");
        assert_eq!(config.max_missing_gap_seconds, 60);
        assert!(config.trim_weekend);
        assert!(config.dedup);
        assert!(!config.strict_sorted_input);
        assert_eq!(config.price_basis, PriceBasis::Mid);
        assert_eq!(config.negative_spread_policy, NegativeSpreadPolicy::Abort);
        assert_eq!(config.gap_fatal_ratio, 0.25);
        assert_eq!(config.seed, 0);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = RunConfig::from_json(
            r#"{"out_dir": "/tmp/runs", "demo": true, "bar_frames": [], "frobnicate": 1}"#,
        )
        .unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_unknown_frame_type_rejected() {
        let err = RunConfig::from_json(
            r#"{"out_dir": "/tmp/runs", "demo": true,
                "bar_frames": [{"type": "volume", "count": 10}]}"#,
        )
        .unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_validate_resolves_frames() {
        let specs = demo_config().validate().unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].label(), "1m");
        assert_eq!(specs[1].label(), "100t");
    }

    #[test]
    fn test_validate_requires_one_input() {
        let mut config = demo_config();
        config.demo = false;
        assert_eq!(config.validate().unwrap_err().code(), "CONFIG_ERROR");

        config.csv = Some(CsvConfig {
            path: PathBuf::from("ticks.csv"),
        });
        config.demo = true;
        assert_eq!(config.validate().unwrap_err().code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_validate_duplicate_frames() {
        let mut config = demo_config();
        config.bar_frames = vec![
            FrameConfig::Time {
                unit: "1m".to_string(),
            },
            FrameConfig::Time {
                unit: "1m".to_string(),
            },
        ];
        assert_eq!(config.validate().unwrap_err().code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_validate_bad_frame_is_bar_spec_error() {
        let mut config = demo_config();
        config.bar_frames = vec![FrameConfig::Tick { count: 0 }];
        assert_eq!(config.validate().unwrap_err().code(), "BAR_SPEC_INVALID");
    }

    #[test]
    fn test_validate_gap_ratio_bounds() {
        let mut config = demo_config();
        config.gap_fatal_ratio = 1.5;
        assert_eq!(config.validate().unwrap_err().code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_config_roundtrip_is_stable() {
        let config = demo_config();
        let json = serde_json::to_string(&config).unwrap();
        let back = RunConfig::from_json(&json).unwrap();
        assert_eq!(back, config);
    }
}
