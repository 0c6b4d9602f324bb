use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use fdr_batch::SimulatorHarness;
use fdr_calib::{CalibrationEnd, CalibrationResult, CalibrationSettings, Calibrator, Weights};
use fdr_io::{mdl, read_scada};
use fdr_populate::{Knob, TechnologyCase};
use fdr_scenarios::Scenario;
use tabwriter::TabWriter;

use crate::commands::telemetry::record_run_timed;
use crate::commands::util::{feeder_name, load_feeder_config};
use crate::signal::install_interrupt_handler;

pub const RESULT_FILE: &str = "calibration_result.json";

/// Arguments of `fdr-cli calibrate`.
pub struct CalibrateArgs<'a> {
    pub base: &'a Path,
    pub scada: &'a Path,
    pub dates: &'a str,
    pub work_dir: &'a Path,
    pub config: Option<&'a Path>,
    pub weights: Option<&'a Path>,
    pub settings: Option<&'a Path>,
    pub simulator: &'a Path,
    pub timeout: u64,
    pub max_rounds: Option<usize>,
    pub save_losers: bool,
    pub seed: Option<u64>,
    pub case: i32,
    pub region: Option<u8>,
    pub feeder: Option<&'a str>,
}

fn print_result(result: &CalibrationResult, result_path: &Path) -> Result<()> {
    let ending = match result.end {
        CalibrationEnd::Acceptable => "acceptable score reached",
        CalibrationEnd::OutOfOptions => "out of calibration options",
        CalibrationEnd::RoundLimit => "round limit reached",
        CalibrationEnd::Cancelled => "cancelled",
        CalibrationEnd::LoadShapeDone => "load-shape scalar calibrated",
    };
    match (&result.best_id, result.wsm) {
        (Some(best), Some(wsm)) => println!(
            "Calibration finished after {} round(s): {ending}. Best {best} with WSM {wsm:.4}",
            result.rounds
        ),
        _ => println!("Calibration finished after {} round(s): {ending}. No candidate was scored", result.rounds),
    }
    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "KNOB\tVALUE")?;
    for (knob, value) in Knob::VECTOR.iter().zip(result.vector.values) {
        writeln!(writer, "{}\t{value}", knob.name())?;
    }
    if let Some(scalar) = result.vector.load_shape_scalar {
        writeln!(writer, "{}\t{scalar}", Knob::LoadShapeScalar.name())?;
    }
    writer.flush()?;
    println!("Result written to {}", result_path.display());
    Ok(())
}

fn calibrate(args: &CalibrateArgs<'_>, result_path: &Path) -> Result<()> {
    let mut settings = match args.settings {
        Some(path) => CalibrationSettings::from_path(path)?,
        None => CalibrationSettings::default(),
    };
    if let Some(max_rounds) = args.max_rounds {
        settings.max_rounds = max_rounds;
    }
    settings.save_losers |= args.save_losers;
    if args.seed.is_some() {
        settings.seed = args.seed;
    }
    settings.validate()?;

    let config = load_feeder_config(args.config, args.region, args.seed)?;
    let weights = match args.weights {
        Some(path) => Weights::from_path(path)?,
        None => Weights::default(),
    };
    let scada = read_scada(args.scada)?;
    let base = mdl::read_file(args.base)?;
    let feeder = args.feeder.map(str::to_string).unwrap_or_else(|| feeder_name(args.base));
    let scenario = Scenario::new(
        feeder,
        config.region,
        TechnologyCase::from_code(args.case),
        Scenario::parse_days(args.dates)?,
    )?;
    let harness = SimulatorHarness::new(args.simulator)
        .with_timeout(Duration::from_secs(args.timeout))
        .with_cancel(install_interrupt_handler());

    let mut calibrator = Calibrator::new(base, config, scenario, scada, weights, settings, harness, args.work_dir);
    let result = calibrator.run()?;
    let json = serde_json::to_string_pretty(&result)?;
    fs::write(result_path, json).with_context(|| format!("writing {}", result_path.display()))?;
    print_result(&result, result_path)
}

pub fn handle(args: &CalibrateArgs<'_>) -> Result<()> {
    let start = Instant::now();
    let result_path: PathBuf = args.work_dir.join(RESULT_FILE);
    let res = calibrate(args, &result_path);
    record_run_timed(
        &result_path,
        "calibrate",
        &[
            ("base", &args.base.display().to_string()),
            ("scada", &args.scada.display().to_string()),
            ("dates", args.dates),
            ("simulator", &args.simulator.display().to_string()),
            ("case", &args.case.to_string()),
            ("seed", &args.seed.map(|s| s.to_string()).unwrap_or_default()),
        ],
        start,
        &res,
    );
    res
}
