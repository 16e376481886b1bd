//! Quality report aggregation.
//!
//! Pure aggregation over the outputs of normalization, gap analysis and
//! bar building; no side effects beyond producing the report structure.

use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Distribution, OrderStatistics};

use tickframe_ingestion::{FrameBars, GapAnalysis, NormalizedTickSeries};
use tickframe_core::GapRecord;

/// Spread statistics over the normalized series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpreadStats {
    pub mean: f64,
    pub std_dev: f64,
    pub p95: f64,
}

/// Gap scan summary embedded in the report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GapSummary {
    /// Intervals above threshold, flagged or weekend-excused.
    pub n_recorded: u64,
    /// Intervals counting against coverage.
    pub n_flagged: u64,
    /// Largest inter-tick interval observed.
    pub max_gap_ns: i64,
    /// Sum of flagged gap durations.
    pub flagged_duration_ns: i64,
    /// The individual records.
    pub records: Vec<GapRecord>,
}

/// Per-frame bar counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSummary {
    pub frame: String,
    pub n_bars: u64,
    pub partial_ticks_dropped: u64,
}

/// The quality report artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub n_raw_rows: u64,
    pub n_normalized_rows: u64,
    pub dropped_duplicates: u64,
    pub dropped_negative_spread: u64,
    pub resorted: bool,
    pub gap_coverage_percent: f64,
    pub gaps: GapSummary,
    pub spread: SpreadStats,
    pub frames: Vec<FrameSummary>,
}

/// Aggregate one run's statistics into the report.
pub fn build_report(
    series: &NormalizedTickSeries,
    gaps: &GapAnalysis,
    frames: &[FrameBars],
) -> QualityReport {
    let stats = series.stats();
    QualityReport {
        n_raw_rows: stats.n_raw_rows,
        n_normalized_rows: stats.n_normalized_rows,
        dropped_duplicates: stats.dropped_duplicates,
        dropped_negative_spread: stats.dropped_negative_spread,
        resorted: stats.resorted,
        gap_coverage_percent: gaps.coverage_percent,
        gaps: GapSummary {
            n_recorded: gaps.records.len() as u64,
            n_flagged: gaps.n_flagged(),
            max_gap_ns: gaps.max_gap_ns,
            flagged_duration_ns: gaps.flagged_duration_ns,
            records: gaps.records.clone(),
        },
        spread: spread_stats(series),
        frames: frames
            .iter()
            .map(|frame| FrameSummary {
                frame: frame.label.clone(),
                n_bars: frame.bars.len() as u64,
                partial_ticks_dropped: frame.partial_ticks_dropped,
            })
            .collect(),
    }
}

fn spread_stats(series: &NormalizedTickSeries) -> SpreadStats {
    if series.is_empty() {
        return SpreadStats::default();
    }
    let spreads: Vec<f64> = series.ticks().iter().map(|tick| tick.spread()).collect();
    let mut data = Data::new(spreads);
    SpreadStats {
        mean: data.mean().unwrap_or(0.0),
        std_dev: data.std_dev().unwrap_or(0.0),
        p95: data.percentile(95),
    }
}
