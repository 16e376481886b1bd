//! Run manifest: provenance record binding artifacts to the exact
//! configuration and versions that produced them.
//!
//! Downstream modules must verify the per-file SHA-256 hashes recorded
//! here before trusting a run's outputs.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use tickframe_core::{
    Result, RunConfig, BAR_RULES_ID, MODULE_NAME, MODULE_VERSION, SCHEMA_VERSION,
};

/// Where the ticks came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDescriptor {
    /// "csv" or "demo".
    pub kind: String,
    /// Source path for csv inputs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Content hash of the source file for csv inputs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl InputDescriptor {
    /// Describe a csv input, hashing the source file.
    pub fn csv(path: &Path) -> Result<Self> {
        Ok(Self {
            kind: "csv".to_string(),
            path: Some(path.display().to_string()),
            sha256: Some(sha256_of_file(path)?),
        })
    }

    /// Describe the seeded demo input.
    pub fn demo() -> Self {
        Self {
            kind: "demo".to_string(),
            path: None,
            sha256: None,
        }
    }
}

/// One hashed output artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    /// File name inside the run directory.
    pub file: String,
    /// Lowercase hex SHA-256 of the file contents.
    pub sha256: String,
}

/// The manifest artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub run_id: String,
    /// RFC-3339 creation time; the only field excluded from
    /// reproducibility comparisons.
    pub created_at: String,
    pub module: String,
    pub module_version: String,
    pub schema_version: String,
    pub bar_rules_id: String,
    pub seed: u64,
    pub input: InputDescriptor,
    /// Artifact name (e.g. "bars_1m", "quality_report") to hash entry,
    /// in deterministic order.
    pub outputs: BTreeMap<String, ArtifactEntry>,
    /// The fully resolved configuration this run executed with.
    pub config: RunConfig,
}

impl Manifest {
    /// Start a manifest for a run, stamped with the current time.
    pub fn new(run_id: impl Into<String>, config: &RunConfig, input: InputDescriptor) -> Self {
        Self {
            run_id: run_id.into(),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            module: MODULE_NAME.to_string(),
            module_version: MODULE_VERSION.to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            bar_rules_id: BAR_RULES_ID.to_string(),
            seed: config.seed,
            input,
            outputs: BTreeMap::new(),
            config: config.clone(),
        }
    }

    /// Hash an output artifact and record it under `name`.
    pub fn add_output(&mut self, name: impl Into<String>, path: &Path) -> Result<()> {
        let name = name.into();
        let sha256 = sha256_of_file(path)?;
        debug!(artifact = %name, %sha256, "hashed output artifact");
        let file = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.outputs.insert(name, ArtifactEntry { file, sha256 });
        Ok(())
    }

    /// Write the manifest as pretty JSON.
    pub fn write(&self, path: &Path) -> Result<()> {
        write_json(path, self)
    }
}

/// SHA-256 of a file, streamed in 1 MiB chunks, as lowercase hex.
pub fn sha256_of_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 1024 * 1024];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Write a value as pretty JSON with a trailing newline.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    std::fs::write(path, bytes)?;
    Ok(())
}
