//! The pipeline runner.
//!
//! One synchronous call per run id. The run owns its output directory
//! exclusively for its lifetime; on any error the caller must treat
//! every partial artifact as untrusted.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use rayon::prelude::*;
use serde::Serialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::output::write_bars;
use tickframe_core::{BarSpec, Error, Result, RunConfig};
use tickframe_ingestion::{
    analyze_gaps, demo_ticks, normalize, read_csv_ticks, BarBuilder, FrameBars,
};
use tickframe_report::{build_report, write_json, InputDescriptor, Manifest, ProgressLogger};

/// Paths produced by a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    pub run_id: String,
    pub run_dir: PathBuf,
    /// Frame label to bar file path.
    pub frame_paths: BTreeMap<String, PathBuf>,
    pub quality_report_path: PathBuf,
    pub manifest_path: PathBuf,
    pub progress_log_path: PathBuf,
}

/// Exclusive ownership of a run directory, released on drop.
struct RunDirLock {
    path: PathBuf,
}

impl RunDirLock {
    fn acquire(run_dir: &Path) -> Result<Self> {
        let path = run_dir.join(".run.lock");
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(_) => Ok(Self { path }),
            Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!(
                        "run directory {} is owned by another run",
                        run_dir.display()
                    ),
                )))
            }
            Err(error) => Err(error.into()),
        }
    }
}

impl Drop for RunDirLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Execute one pipeline run.
///
/// Config and bar-spec validation happen before any filesystem access;
/// every later abort appends a final `failed` progress event carrying
/// the stable error code.
pub fn run(config: RunConfig) -> Result<RunOutput> {
    let specs = config.validate()?;

    let run_id = config.run_id.clone().unwrap_or_else(generate_run_id);
    let run_dir = config.out_dir.join(&run_id);
    if run_dir.join("manifest.json").exists() {
        return Err(Error::config(format!(
            "run directory {} is already finalized; pick a fresh run id",
            run_dir.display()
        )));
    }
    fs::create_dir_all(&run_dir)?;
    let _lock = RunDirLock::acquire(&run_dir)?;

    let progress = ProgressLogger::new(run_dir.join("progress.jsonl"));
    progress.run_started(&format!("run {run_id}"))?;
    let started = Instant::now();

    match run_stages(&config, &specs, &run_id, &run_dir, &progress) {
        Ok(output) => {
            progress.run_completed(elapsed_ms(started))?;
            info!(run_id = %output.run_id, run_dir = %output.run_dir.display(), "run complete");
            Ok(output)
        }
        Err(error) => {
            progress.run_failed(error.code(), &error.to_string());
            Err(error)
        }
    }
}

fn run_stages(
    config: &RunConfig,
    specs: &[BarSpec],
    run_id: &str,
    run_dir: &Path,
    progress: &ProgressLogger,
) -> Result<RunOutput> {
    // normalize
    let stage = Instant::now();
    let (raw, input) = match &config.csv {
        Some(csv) => (read_csv_ticks(&csv.path)?, InputDescriptor::csv(&csv.path)?),
        None => (demo_ticks(config.seed), InputDescriptor::demo()),
    };
    let series = normalize(raw, config)?;
    let stats = series.stats().clone();
    progress.stage_completed(
        "normalize",
        elapsed_ms(stage),
        json!({
            "n_raw_rows": stats.n_raw_rows,
            "n_normalized_rows": stats.n_normalized_rows,
            "dropped_duplicates": stats.dropped_duplicates,
            "dropped_negative_spread": stats.dropped_negative_spread,
            "resorted": stats.resorted,
        }),
        "ticks normalized",
    )?;

    // gap analysis
    let stage = Instant::now();
    let gaps = analyze_gaps(&series, config);
    if gaps.flagged_ratio() > config.gap_fatal_ratio {
        return Err(Error::GapExcess {
            observed: gaps.flagged_ratio(),
            limit: config.gap_fatal_ratio,
        });
    }
    progress.stage_completed(
        "gap_analysis",
        elapsed_ms(stage),
        json!({
            "n_recorded": gaps.records.len(),
            "n_flagged": gaps.n_flagged(),
            "coverage_percent": gaps.coverage_percent,
        }),
        "gap scan complete",
    )?;

    // bars: frames are independent over the immutable series
    let stage = Instant::now();
    let resume_ids = gaps.flagged_resume_ids();
    let builder = BarBuilder::new(&config.symbol, config.price_basis, &resume_ids);
    let built: Vec<(FrameBars, PathBuf)> = specs
        .par_iter()
        .map(|spec| {
            let frame = builder.build(series.ticks(), spec);
            let path = run_dir.join(format!("bars_{}.csv", frame.label));
            write_bars(&path, &frame.bars)?;
            Ok((frame, path))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut frame_paths = BTreeMap::new();
    let mut frames = Vec::with_capacity(built.len());
    for (frame, path) in built {
        frame_paths.insert(frame.label.clone(), path);
        frames.push(frame);
    }
    progress.stage_completed(
        "bars",
        elapsed_ms(stage),
        json!({
            "frames": frames.len(),
            "bars": frames.iter().map(|f| f.bars.len()).sum::<usize>(),
        }),
        "bar frames built",
    )?;

    // quality report
    let stage = Instant::now();
    let report = build_report(&series, &gaps, &frames);
    let quality_report_path = run_dir.join("quality_report.json");
    write_json(&quality_report_path, &report)?;
    progress.stage_completed(
        "quality_report",
        elapsed_ms(stage),
        json!({"gap_coverage_percent": report.gap_coverage_percent}),
        "quality report written",
    )?;

    // manifest
    let stage = Instant::now();
    let mut manifest = Manifest::new(run_id, config, input);
    for (label, path) in &frame_paths {
        manifest.add_output(format!("bars_{label}"), path)?;
    }
    manifest.add_output("quality_report", &quality_report_path)?;
    let manifest_path = run_dir.join("manifest.json");
    manifest.write(&manifest_path)?;
    progress.stage_completed(
        "manifest",
        elapsed_ms(stage),
        json!({"outputs": manifest.outputs.len()}),
        "manifest written",
    )?;

    Ok(RunOutput {
        run_id: run_id.to_string(),
        run_dir: run_dir.to_path_buf(),
        frame_paths,
        quality_report_path,
        manifest_path,
        progress_log_path: progress.path().to_path_buf(),
    })
}

fn generate_run_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}", Utc::now().format("%Y%m%dT%H%M%S"), &suffix[..6])
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
