use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use fdr_calib::{day_metrics, CandidateMetrics, Weights};
use fdr_cli::RunFormat;
use fdr_core::Season;
use fdr_io::{read_recorder, read_scada, DayMetrics};
use serde::Serialize;
use tabwriter::TabWriter;

#[derive(Serialize)]
struct MetricsReport {
    #[serde(flatten)]
    metrics: CandidateMetrics,
    wsm: f64,
}

pub fn handle(recorders: &[PathBuf], scada: &Path, weights: Option<&Path>, format: RunFormat) -> Result<()> {
    let [summer, winter, spring] = recorders else {
        return Err(anyhow!("expected three recorder files (summer, winter, spring)"));
    };
    let reference = read_scada(scada)?;
    let weights = match weights {
        Some(path) => Weights::from_path(path)?,
        None => Weights::default(),
    };
    let day = |path: &PathBuf| -> Result<DayMetrics> {
        let series = read_recorder(path)?;
        day_metrics(&series, None).with_context(|| format!("extracting metrics from {}", path.display()))
    };
    let metrics = CandidateMetrics::from_days([day(summer)?, day(winter)?, day(spring)?], &reference)?;
    let wsm = weights.wsm(&metrics.errors);

    match format {
        RunFormat::Json => {
            serde_json::to_writer_pretty(io::stdout(), &MetricsReport { metrics, wsm })?;
            println!();
        }
        RunFormat::Plain => {
            let mut writer = TabWriter::new(io::stdout());
            writeln!(writer, "SEASON\tPEAK kW\tPEAK TIME\tENERGY kWh\tMIN kW\tMIN TIME\tERRORS")?;
            for (season, (day, errors)) in Season::ALL.iter().zip(metrics.days.iter().zip(&metrics.errors)) {
                let errors: Vec<String> = errors.iter().map(|e| format!("{e:+.4}")).collect();
                writeln!(
                    writer,
                    "{season}\t{:.1}\t{:.2}\t{:.1}\t{:.1}\t{:.2}\t{}",
                    day.peak_kw,
                    day.peak_time_h,
                    day.total_kwh,
                    day.min_kw,
                    day.min_time_h,
                    errors.join(" ")
                )?;
            }
            writer.flush()?;
            println!("WSM {wsm:.4}");
        }
    }
    Ok(())
}
