use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use fdr_cli::manifest::{self, ManifestEntry};

#[derive(Clone, Debug)]
pub struct RunRecord {
    pub manifest: ManifestEntry,
    pub path: PathBuf,
}

#[derive(Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub command: String,
    pub timestamp: String,
    pub status: String,
    pub version: String,
    pub manifest_path: String,
    pub outputs: Vec<String>,
}

impl RunSummary {
    pub fn from_record(record: &RunRecord) -> Self {
        Self {
            run_id: record.manifest.run_id.clone(),
            command: record.manifest.command.clone(),
            timestamp: record.manifest.timestamp.clone(),
            status: record.manifest.status.clone(),
            version: record.manifest.version.clone(),
            manifest_path: record.path.display().to_string(),
            outputs: record.manifest.outputs.clone(),
        }
    }
}

/// Every run manifest under `root`, oldest first.
pub fn discover_runs(root: &Path) -> Result<Vec<RunRecord>> {
    if !root.exists() {
        return Ok(vec![]);
    }

    let mut runs = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(should_enter)
    {
        let entry = entry?;
        if !entry.file_type().is_file() || !is_manifest_file(&entry) {
            continue;
        }
        let path = entry.path().to_path_buf();
        let manifest = manifest::read_manifest(&path)
            .with_context(|| format!("reading manifest {}", path.display()))?;
        runs.push(RunRecord { manifest, path });
    }
    runs.sort_by(|a, b| a.manifest.timestamp.cmp(&b.manifest.timestamp));
    Ok(runs)
}

pub fn summaries(records: &[RunRecord]) -> Vec<RunSummary> {
    records.iter().map(RunSummary::from_record).collect()
}

fn is_manifest_file(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    name.starts_with("run-") && name.ends_with(".json")
}

/// Skip hidden directories and the bulky calibration subdirectories.
fn should_enter(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return true;
    }
    match entry.file_name().to_str() {
        Some("target") | Some("csv_output") | Some("winners") | Some("losers") => false,
        Some(name) if name.starts_with('.') => false,
        _ => true,
    }
}
