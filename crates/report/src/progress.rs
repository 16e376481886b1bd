//! Append-only structured progress log.
//!
//! One JSON object per line, one event per pipeline stage. Every abort
//! still gets a final `failed` event carrying the stable error code, so
//! the audit trail survives even for runs that produced no artifacts.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use tickframe_core::{Result, MODULE_NAME};

/// Event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Start,
    Complete,
    Failed,
}

/// One progress event line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// RFC-3339 UTC timestamp.
    pub timestamp: String,
    pub module: String,
    pub stage: String,
    pub status: EventStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counters: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub message: String,
}

/// Appends events to `progress.jsonl` inside the run directory.
#[derive(Debug, Clone)]
pub struct ProgressLogger {
    path: PathBuf,
}

impl ProgressLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record the start of the run.
    pub fn run_started(&self, message: &str) -> Result<()> {
        self.append(ProgressEvent {
            timestamp: now(),
            module: MODULE_NAME.to_string(),
            stage: "run".to_string(),
            status: EventStatus::Start,
            elapsed_ms: None,
            counters: None,
            error_code: None,
            message: message.to_string(),
        })
    }

    /// Record a completed stage with its counters.
    pub fn stage_completed(
        &self,
        stage: &str,
        elapsed_ms: u64,
        counters: serde_json::Value,
        message: &str,
    ) -> Result<()> {
        self.append(ProgressEvent {
            timestamp: now(),
            module: MODULE_NAME.to_string(),
            stage: stage.to_string(),
            status: EventStatus::Complete,
            elapsed_ms: Some(elapsed_ms),
            counters: Some(counters),
            error_code: None,
            message: message.to_string(),
        })
    }

    /// Record successful completion of the whole run.
    pub fn run_completed(&self, elapsed_ms: u64) -> Result<()> {
        self.append(ProgressEvent {
            timestamp: now(),
            module: MODULE_NAME.to_string(),
            stage: "run".to_string(),
            status: EventStatus::Complete,
            elapsed_ms: Some(elapsed_ms),
            counters: None,
            error_code: None,
            message: "done".to_string(),
        })
    }

    /// Record an aborted run. Best-effort: a logging failure must not
    /// mask the error being reported.
    pub fn run_failed(&self, code: &str, message: &str) {
        let event = ProgressEvent {
            timestamp: now(),
            module: MODULE_NAME.to_string(),
            stage: "run".to_string(),
            status: EventStatus::Failed,
            elapsed_ms: None,
            counters: None,
            error_code: Some(code.to_string()),
            message: message.to_string(),
        };
        if let Err(error) = self.append(event) {
            warn!(%error, "could not append failure event to progress log");
        }
    }

    fn append(&self, event: ProgressEvent) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut line = serde_json::to_vec(&event)?;
        line.push(b'\n');
        file.write_all(&line)?;
        Ok(())
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_events(path: &Path) -> Vec<ProgressEvent> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_events_append_one_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let logger = ProgressLogger::new(dir.path().join("progress.jsonl"));

        logger.run_started("run start").unwrap();
        logger
            .stage_completed(
                "normalize",
                12,
                serde_json::json!({"n_raw_rows": 6}),
                "normalized",
            )
            .unwrap();
        logger.run_completed(40).unwrap();

        let events = read_events(logger.path());
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].status, EventStatus::Start);
        assert_eq!(events[1].stage, "normalize");
        assert_eq!(events[1].elapsed_ms, Some(12));
        assert_eq!(
            events[1].counters.as_ref().unwrap()["n_raw_rows"],
            serde_json::json!(6)
        );
        assert_eq!(events[2].status, EventStatus::Complete);
    }

    #[test]
    fn test_failed_event_carries_code() {
        let dir = tempfile::tempdir().unwrap();
        let logger = ProgressLogger::new(dir.path().join("progress.jsonl"));
        logger.run_started("run start").unwrap();
        logger.run_failed("NEGATIVE_SPREAD", "row 3: crossed quote");

        let events = read_events(logger.path());
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].status, EventStatus::Failed);
        assert_eq!(events[1].error_code.as_deref(), Some("NEGATIVE_SPREAD"));
    }

    #[test]
    fn test_append_only() {
        let dir = tempfile::tempdir().unwrap();
        let logger = ProgressLogger::new(dir.path().join("progress.jsonl"));
        logger.run_started("first").unwrap();
        let first = std::fs::read_to_string(logger.path()).unwrap();
        logger.run_completed(1).unwrap();
        let second = std::fs::read_to_string(logger.path()).unwrap();
        assert!(second.starts_with(&first));
    }
}
