use std::io::{self, Write};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use fdr_batch::{discover_jobs, run_batch, BatchRunnerConfig, BatchSummary};
use fdr_batch::manifest::MANIFEST_FILE;
use fdr_cli::BatchCommands;
use tabwriter::TabWriter;

use crate::commands::telemetry::record_run_timed;
use crate::signal::install_interrupt_handler;

fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{ms}ms")
    } else if ms < 60_000 {
        format!("{:.2}s", ms as f64 / 1000.0)
    } else {
        format!("{}m {:.1}s", ms / 60_000, (ms % 60_000) as f64 / 1000.0)
    }
}

fn print_batch_summary(summary: &BatchSummary) -> Result<()> {
    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "JOB\tSTATUS\tELAPSED\tERROR")?;
    for job in &summary.jobs {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}",
            job.job_id,
            job.status,
            format_duration(job.elapsed_ms),
            job.error.as_deref().unwrap_or("")
        )?;
    }
    writer.flush()?;
    println!(
        "Batch finished: {} ok, {} failed{}; manifest {}",
        summary.success,
        summary.failure,
        if summary.cancelled { " (cancelled)" } else { "" },
        summary.manifest_path.display()
    );
    Ok(())
}

pub fn handle(command: &BatchCommands) -> Result<()> {
    let BatchCommands::Run {
        dir,
        simulator,
        threads,
        timeout,
        out,
        extension,
    } = command;
    let start = Instant::now();
    let output_root = out.clone().unwrap_or_else(|| dir.clone());
    let mut job_count = 0;
    let res = (|| -> Result<()> {
        let jobs = discover_jobs(dir, extension)?;
        if jobs.is_empty() {
            return Err(anyhow!("no .{extension} models found under {}", dir.display()));
        }
        job_count = jobs.len();
        let config = BatchRunnerConfig {
            jobs,
            output_root: output_root.clone(),
            simulator: simulator.clone(),
            timeout: Duration::from_secs(*timeout),
            threads: *threads,
            cancel: install_interrupt_handler(),
        };
        let summary = run_batch(&config)?;
        print_batch_summary(&summary)?;
        if summary.cancelled {
            return Err(anyhow!("batch cancelled"));
        }
        Ok(())
    })();
    record_run_timed(
        &output_root.join(MANIFEST_FILE),
        "batch run",
        &[
            ("dir", &dir.display().to_string()),
            ("simulator", &simulator.display().to_string()),
            ("threads", &threads.to_string()),
            ("timeout", &timeout.to_string()),
            ("num_jobs", &job_count.to_string()),
        ],
        start,
        &res,
    );
    res
}
