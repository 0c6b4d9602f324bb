use fdr_cli::manifest::record_manifest;
use std::{path::Path, time::Instant};

fn record_run_with_status(out: &Path, command: &str, params: &[(&str, &str)], status: &str, duration_ms: Option<u128>) {
    match record_manifest(out, command, params, status, duration_ms) {
        Ok(path) => tracing::debug!(manifest = %path.display(), "recorded run manifest"),
        Err(err) => eprintln!("Failed to record run manifest: {err}"),
    }
}

/// Record a run manifest next to `out` with the command's outcome.
pub fn record_run_timed(out: &Path, command: &str, params: &[(&str, &str)], start: Instant, result: &anyhow::Result<()>) {
    let duration_ms = start.elapsed().as_millis();
    let status = if result.is_ok() { "success" } else { "failure" };
    record_run_with_status(out, command, params, status, Some(duration_ms));
}
