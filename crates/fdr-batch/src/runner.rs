use crate::harness::{CancelToken, SimulatorHarness};
use crate::job::{BatchJob, BatchJobRecord};
use crate::manifest::{write_batch_manifest, BatchManifest, MANIFEST_FILE};
use anyhow::{Context, Result};
use chrono::Utc;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

pub struct BatchRunnerConfig {
    pub jobs: Vec<BatchJob>,
    pub output_root: PathBuf,
    pub simulator: PathBuf,
    /// Per-job limit
    pub timeout: Duration,
    /// Worker threads; 0 uses every CPU
    pub threads: usize,
    pub cancel: CancelToken,
}

pub struct BatchSummary {
    pub success: usize,
    pub failure: usize,
    pub cancelled: bool,
    pub manifest_path: PathBuf,
    pub jobs: Vec<BatchJobRecord>,
}

/// Run every job on its own simulator process and write the manifest.
pub fn run_batch(config: &BatchRunnerConfig) -> Result<BatchSummary> {
    fs::create_dir_all(&config.output_root).with_context(|| {
        format!("creating batch output root '{}'", config.output_root.display())
    })?;

    let thread_count = if config.threads == 0 { num_cpus::get() } else { config.threads };
    let pool = ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .build()
        .context("building Rayon thread pool for batch runs")?;
    let harness = SimulatorHarness::new(config.simulator.clone())
        .with_timeout(config.timeout)
        .with_cancel(config.cancel.clone());
    tracing::info!(jobs = config.jobs.len(), threads = thread_count, "starting batch");

    let job_records: Vec<BatchJobRecord> = pool.install(|| {
        config
            .jobs
            .par_iter()
            .map(|job| {
                let report = harness.run_one(&job.request());
                if !report.status.is_success() {
                    tracing::warn!(job = %job.job_id, status = report.status.label(), "batch job failed");
                }
                BatchJobRecord::from_report(job, &report)
            })
            .collect()
    });

    let success = job_records.iter().filter(|record| record.status == "ok").count();
    let failure = job_records.len() - success;
    let cancelled = config.cancel.is_cancelled();

    let manifest = BatchManifest {
        created_at: Utc::now(),
        simulator: config.simulator.display().to_string(),
        num_jobs: job_records.len(),
        success,
        failure,
        cancelled,
        jobs: job_records.clone(),
    };
    let manifest_path = config.output_root.join(MANIFEST_FILE);
    write_batch_manifest(&manifest_path, &manifest)?;
    Ok(BatchSummary { success, failure, cancelled, manifest_path, jobs: job_records })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::job::discover_jobs;
    use crate::manifest::load_batch_manifest;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn runs_jobs_and_counts_failures() {
        let dir = tempfile::tempdir().unwrap();
        let sim = dir.path().join("sim.sh");
        fs::write(&sim, "#!/bin/sh\ncase \"$1\" in bad*) exit 1;; esac\nexit 0\n").unwrap();
        fs::set_permissions(&sim, fs::Permissions::from_mode(0o755)).unwrap();
        let models = dir.path().join("models");
        fs::create_dir(&models).unwrap();
        for name in ["good1.glm", "good2.glm", "bad.glm"] {
            fs::write(models.join(name), "object node { name n1; };\n").unwrap();
        }

        let config = BatchRunnerConfig {
            jobs: discover_jobs(&models, "glm").unwrap(),
            output_root: dir.path().join("out"),
            simulator: sim,
            timeout: Duration::from_secs(30),
            threads: 2,
            cancel: CancelToken::new(),
        };
        let summary = run_batch(&config).unwrap();
        assert_eq!(summary.success, 2);
        assert_eq!(summary.failure, 1);
        assert!(!summary.cancelled);
        let manifest = load_batch_manifest(&summary.manifest_path).unwrap();
        assert_eq!(manifest.num_jobs, 3);
        let bad = manifest.jobs.iter().find(|j| j.job_id == "bad").unwrap();
        assert_eq!(bad.status, "failed");
        assert!(bad.error.is_some());
    }
}
