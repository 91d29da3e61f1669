//! `run.json`: what a run read, what it wrote and what it found.

use serde::Serialize;
use sha2::{Digest, Sha256};

use sitemerge_triage::model::RunSummary;
use sitemerge_triage::{DataWarning, SourceKind, TriageResult};

pub const SCHEMA_VERSION: &str = "1";

#[derive(Debug, Serialize)]
pub struct RunManifest {
    pub schema_version: &'static str,
    pub config_name: String,
    pub engine_version: String,
    pub run_id: String,
    pub run_timestamp: i64,
    pub position_threshold: f64,
    pub inputs: Vec<InputManifest>,
    pub outputs: Vec<String>,
    pub summary: RunSummary,
    pub warnings: Vec<DataWarning>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InputManifest {
    pub source: SourceKind,
    pub file: String,
    pub rows: usize,
    pub sha256: String,
}

impl InputManifest {
    pub fn new(source: SourceKind, file: impl Into<String>, rows: usize, bytes: &[u8]) -> Self {
        Self {
            source,
            file: file.into(),
            rows,
            sha256: sha256_hex(bytes),
        }
    }
}

impl RunManifest {
    pub fn new(result: &TriageResult, inputs: Vec<InputManifest>, outputs: Vec<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            config_name: result.meta.config_name.clone(),
            engine_version: result.meta.engine_version.clone(),
            run_id: result.meta.run_id.clone(),
            run_timestamp: result.meta.run_timestamp,
            position_threshold: result.anomalies.position_threshold,
            inputs,
            outputs,
            summary: result.summary.clone(),
            warnings: result.warnings.clone(),
        }
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
