use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fdr_io::mdl;
use fdr_populate::NETWORK_RECORDER;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::harness::{RunReport, SimRequest};

/// Directories the calibration loop sorts finished models into.
const SKIPPED_DIRS: [&str; 2] = ["winners", "losers"];

#[derive(Debug, Clone, PartialEq)]
pub struct BatchJob {
    pub job_id: String,
    pub model: PathBuf,
    /// Network-node recorder output, when the model declares one
    pub recorder: Option<PathBuf>,
}

impl BatchJob {
    pub fn request(&self) -> SimRequest {
        SimRequest { model: self.model.clone(), recorder: self.recorder.clone() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJobRecord {
    pub job_id: String,
    pub model: String,
    pub status: String,
    pub error: Option<String>,
    pub elapsed_ms: u64,
    pub output: String,
}

impl BatchJobRecord {
    pub fn from_report(job: &BatchJob, report: &RunReport) -> Self {
        let error = match serde_json::to_value(&report.status) {
            Ok(value) if !report.status.is_success() => Some(value.to_string()),
            _ => None,
        };
        Self {
            job_id: job.job_id.clone(),
            model: job.model.display().to_string(),
            status: report.status.label().to_string(),
            error,
            elapsed_ms: report.elapsed_ms,
            output: report.stdout.display().to_string(),
        }
    }
}

fn recorder_of(model: &Path) -> Option<PathBuf> {
    let tree = match mdl::read_file(model) {
        Ok(tree) => tree,
        Err(err) => {
            tracing::warn!(model = %model.display(), "cannot read model, output will not be checked: {err:#}");
            return None;
        }
    };
    let file = tree.by_name(NETWORK_RECORDER)?.get("file")?;
    let dir = model.parent().unwrap_or_else(|| Path::new(""));
    Some(dir.join(file.trim_matches('"')))
}

/// Every model with `extension` under `root`, sorted by path.
pub fn discover_jobs(root: &Path, extension: &str) -> Result<Vec<BatchJob>> {
    let mut models = Vec::new();
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        !(entry.file_type().is_dir()
            && entry.depth() > 0
            && SKIPPED_DIRS.iter().any(|d| entry.file_name() == *d))
    });
    for entry in walker {
        let entry = entry.with_context(|| format!("walking '{}'", root.display()))?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|e| e == extension) {
            models.push(path.to_path_buf());
        }
    }
    models.sort();
    Ok(models
        .into_iter()
        .map(|model| {
            let job_id = model
                .strip_prefix(root)
                .unwrap_or(&model)
                .with_extension("")
                .display()
                .to_string();
            BatchJob { recorder: recorder_of(&model), job_id, model }
        })
        .collect())
}
