//! Calibration logs and the sorting of finished models.
//!
//! `calibration_log.csv` gets one line per round, `results_log.csv` one line
//! per scored candidate. Both are appended to, so repeated calibrations in
//! one working directory keep their history.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::{Writer, WriterBuilder};

use crate::metrics::ErrorMatrix;
use crate::record::RoundRecord;
use crate::vector::ConfigVector;

pub const CALIBRATION_LOG: &str = "calibration_log.csv";
pub const RESULTS_LOG: &str = "results_log.csv";
pub const WINNERS_DIR: &str = "winners";
pub const LOSERS_DIR: &str = "losers";

const ROUND_HEADER: [&str; 8] =
    ["ID", "WSM", "ActionID", "WSMeval", "PeakSummer", "EnergySummer", "PeakWinter", "EnergyWinter"];

const KNOB_COLUMNS: [&str; 13] = [
    "Avg. House",
    "Avg. Comm.",
    "Base Load Scalar",
    "Cooling Offset",
    "Heating Offset",
    "COP high scalar",
    "COP low scalar",
    "Res. Skew Shift",
    "Decrease Gas Heat",
    "Sched. Skew Std. Dev.",
    "Window Wall Ratio",
    "Additional Heat Degrees",
    "Load Shape Scalar",
];

const METRIC_COLUMNS: [&str; 5] = ["Peak Val.", "Peak Time", "Total Energy", "Min. Val.", "Min. Time"];

fn open_append(path: &Path) -> Result<Writer<File>> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log {}", path.display()))?;
    Ok(WriterBuilder::new().flexible(true).from_writer(file))
}

pub struct CalibrationLogs {
    rounds: Writer<File>,
    results: Writer<File>,
}

impl CalibrationLogs {
    /// Open both logs in `dir` and write a header block for this run.
    pub fn open(dir: &Path) -> Result<Self> {
        let mut rounds = open_append(&dir.join(CALIBRATION_LOG))?;
        rounds.write_record(["-- Begin Calibration Log --"])?;
        rounds.write_record(ROUND_HEADER)?;
        rounds.flush()?;

        let mut results = open_append(&dir.join(RESULTS_LOG))?;
        results.write_record(["-- Begin Results Log --"])?;
        let mut groups = vec!["ID", "WSM Score", "Calibration Parameters"];
        groups.extend(std::iter::repeat("").take(KNOB_COLUMNS.len() - 1));
        for season in ["Summer", "Winter", "Spring"] {
            groups.push(season);
            groups.extend(std::iter::repeat("").take(METRIC_COLUMNS.len() - 1));
        }
        results.write_record(&groups)?;
        let mut columns = vec!["", ""];
        columns.extend(KNOB_COLUMNS);
        for _ in 0..3 {
            columns.extend(METRIC_COLUMNS);
        }
        results.write_record(&columns)?;
        results.flush()?;
        Ok(Self { rounds, results })
    }

    /// Append a round; `main` is absent when nothing was scored.
    pub fn round(&mut self, entry: &RoundRecord, main: Option<[f64; 4]>) -> Result<()> {
        let mut row = vec![
            entry.candidate_id.clone(),
            entry.wsm.map_or_else(|| "N/A".to_string(), |w| w.to_string()),
            entry.action.to_string(),
            entry.eval.map_or_else(|| "N/A".to_string(), |e| e.code().to_string()),
        ];
        match main {
            Some(main) => row.extend(main.iter().map(|m| m.to_string())),
            None => row.extend(std::iter::repeat("N/A".to_string()).take(4)),
        }
        self.rounds.write_record(&row)?;
        self.rounds.flush().context("writing calibration log")
    }

    /// Append one scored candidate.
    pub fn result(&mut self, id: &str, wsm: f64, vector: &ConfigVector, errors: &ErrorMatrix) -> Result<()> {
        let mut row = vec![id.to_string(), wsm.to_string()];
        row.extend(vector.values.iter().map(|v| v.to_string()));
        row.push(vector.load_shape_scalar.map(|s| s.to_string()).unwrap_or_default());
        row.extend(errors.iter().flatten().map(|e| e.to_string()));
        self.results.write_record(&row)?;
        self.results.flush().context("writing results log")
    }

    /// Note a round whose every candidate failed in the results log.
    pub fn no_results(&mut self) -> Result<()> {
        self.results.write_record(["*all runs failed to run or record complete simulation output"])?;
        self.results.flush().context("writing results log")
    }
}

fn models_in(dir: &Path, extension: &str, prefix: &str) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        tracing::warn!(dir = %dir.display(), "cannot list working directory");
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == extension))
        .filter(|p| p.file_name().is_some_and(|n| n.to_string_lossy().starts_with(prefix)))
        .collect()
}

fn move_into(files: &[PathBuf], target: &Path) -> usize {
    if let Err(err) = fs::create_dir_all(target) {
        tracing::warn!(dir = %target.display(), "cannot create directory: {err}");
        return 0;
    }
    let mut moved = 0;
    for file in files {
        let Some(name) = file.file_name() else { continue };
        match fs::rename(file, target.join(name)) {
            Ok(()) => moved += 1,
            Err(err) => tracing::warn!(file = %file.display(), "cannot move model: {err}"),
        }
    }
    moved
}

/// Move a round winner's models into `winners/`.
pub fn move_to_winners(dir: &Path, candidate_id: &str, extension: &str) -> usize {
    let files = models_in(dir, extension, &format!("{candidate_id}_"));
    move_into(&files, &dir.join(WINNERS_DIR))
}

/// Delete the remaining models, or move them to `losers/`.
pub fn clean_up(dir: &Path, extension: &str, save_losers: bool) -> usize {
    let files = models_in(dir, extension, "");
    if save_losers {
        return move_into(&files, &dir.join(LOSERS_DIR));
    }
    let mut removed = 0;
    for file in &files {
        match fs::remove_file(file) {
            Ok(()) => removed += 1,
            Err(err) => tracing::warn!(file = %file.display(), "cannot remove model: {err}"),
        }
    }
    if removed < files.len() {
        tracing::warn!(failed = files.len() - removed, "some models could not be removed");
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::WsmEval;

    #[test]
    fn logs_append_rounds_and_results() {
        let dir = tempfile::tempdir().unwrap();
        let mut logs = CalibrationLogs::open(dir.path()).unwrap();
        let entry = RoundRecord {
            round: 1,
            candidate_id: "Calib_ID1_Config_ID2".into(),
            wsm: Some(0.25),
            action: -1,
            eval: Some(WsmEval::Improved),
        };
        logs.round(&entry, Some([0.1, 0.2, -0.1, 0.05])).unwrap();
        let failed = RoundRecord { candidate_id: crate::record::ALL_FAILED.into(), eval: Some(WsmEval::NoImprovement), ..entry.clone() };
        logs.round(&failed, None).unwrap();
        logs.result("Calib_ID1_Config_ID2", 0.25, &ConfigVector::default(), &[[0.0; 5]; 3]).unwrap();

        let text = fs::read_to_string(dir.path().join(CALIBRATION_LOG)).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "ID,WSM,ActionID,WSMeval,PeakSummer,EnergySummer,PeakWinter,EnergyWinter");
        assert_eq!(lines[2], "Calib_ID1_Config_ID2,0.25,-1,0,0.1,0.2,-0.1,0.05");
        assert_eq!(lines[3], "*all runs failed,0.25,-1,2,N/A,N/A,N/A,N/A");

        let results = fs::read_to_string(dir.path().join(RESULTS_LOG)).unwrap();
        let last = results.lines().last().unwrap();
        assert_eq!(last.split(',').count(), 2 + 13 + 15);
    }

    #[test]
    fn winners_are_kept_and_the_rest_removed() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["Calib_ID1_Config_ID0_2013-07-31.glm", "Calib_ID1_Config_ID1_2013-07-31.glm", "notes.txt"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        assert_eq!(move_to_winners(dir.path(), "Calib_ID1_Config_ID0", "glm"), 1);
        assert_eq!(clean_up(dir.path(), "glm", true), 1);
        assert!(dir.path().join("winners/Calib_ID1_Config_ID0_2013-07-31.glm").is_file());
        assert!(dir.path().join("losers/Calib_ID1_Config_ID1_2013-07-31.glm").is_file());
        assert!(dir.path().join("notes.txt").is_file());
        assert_eq!(clean_up(dir.path(), "glm", false), 0);
    }
}
