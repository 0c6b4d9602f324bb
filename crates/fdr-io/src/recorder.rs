//! Simulator recorder CSV files.
//!
//! A recorder file starts with `#` metadata lines, followed by rows of
//! `timestamp,measured_real_power,measured_real_energy`. Timestamps carry a
//! timezone abbreviation (`2013-07-31 14:05:00 PDT`) that is dropped: all
//! metrics are computed on local wall-clock time.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use csv::ReaderBuilder;
use thiserror::Error;

/// Rows in one day at the 5-minute recording interval.
pub const MIN_DAY_ROWS: usize = 288;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Reasons a recorder file cannot be used.
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("recorder output {0} is missing")]
    Missing(PathBuf),
    #[error("recorder output {path} has {found} data rows, need {required}")]
    TooFewRows {
        path: PathBuf,
        found: usize,
        required: usize,
    },
    #[error("recorder output {path}: bad row {row}: {message}")]
    BadRow {
        path: PathBuf,
        row: usize,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecorderRow {
    pub time: NaiveDateTime,
    /// Watts
    pub power: f64,
    /// Watt-hours, cumulative since the simulation started
    pub energy: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecorderSeries {
    pub rows: Vec<RecorderRow>,
}

impl RecorderSeries {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Parse `YYYY-MM-DD HH:MM:SS [TZ]`.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let mut parts = text.split_whitespace();
    let date = parts.next()?;
    let time = parts.next()?;
    NaiveDateTime::parse_from_str(&format!("{date} {time}"), TIME_FORMAT).ok()
}

/// Read every data row of a recorder file.
pub fn read_recorder(path: &Path) -> Result<RecorderSeries> {
    if !path.exists() {
        return Err(RecorderError::Missing(path.to_path_buf()).into());
    }
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening recorder {}", path.display()))?;

    let mut series = RecorderSeries::default();
    for (row, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("reading recorder {}", path.display()))?;
        let bad = |message: String| RecorderError::BadRow {
            path: path.to_path_buf(),
            row,
            message,
        };
        if record.len() < 3 {
            return Err(bad(format!("expected 3 columns, got {}", record.len())).into());
        }
        let time = parse_timestamp(&record[0])
            .ok_or_else(|| bad(format!("unparseable timestamp '{}'", &record[0])))?;
        let power: f64 = record[1]
            .parse()
            .map_err(|_| bad(format!("unparseable power '{}'", &record[1])))?;
        let energy: f64 = record[2]
            .parse()
            .map_err(|_| bad(format!("unparseable energy '{}'", &record[2])))?;
        series.rows.push(RecorderRow { time, power, energy });
    }
    Ok(series)
}

/// Count data rows without parsing them.
pub fn count_data_rows(path: &Path) -> Result<usize> {
    if !path.exists() {
        return Err(RecorderError::Missing(path.to_path_buf()).into());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading recorder {}", path.display()))?;
    Ok(text
        .lines()
        .filter(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'))
        .count())
}

/// Fail unless the file exists and holds at least a day of samples.
pub fn verify_day_output(path: &Path) -> Result<usize> {
    let found = count_data_rows(path)?;
    if found < MIN_DAY_ROWS {
        return Err(RecorderError::TooFewRows {
            path: path.to_path_buf(),
            found,
            required: MIN_DAY_ROWS,
        }
        .into());
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write as _;

    fn day_file(dir: &Path, rows: usize) -> PathBuf {
        let mut text = String::from("# file...: out.csv\n# timestamp,measured_real_power,measured_real_energy\n");
        for i in 0..rows {
            let minutes = i * 5;
            let _ = writeln!(
                text,
                "2013-07-31 {:02}:{:02}:00 PDT,{:.1},{:.1}",
                minutes / 60,
                minutes % 60,
                1000.0 + i as f64,
                i as f64 * 100.0
            );
        }
        let path = dir.join("out.csv");
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn strips_timezone_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = day_file(dir.path(), 3);
        let series = read_recorder(&path).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.rows[1].time.to_string(), "2013-07-31 00:05:00");
        assert_eq!(series.rows[2].power, 1002.0);
    }

    #[test]
    fn verify_requires_a_full_day() {
        let dir = tempfile::tempdir().unwrap();
        let path = day_file(dir.path(), 287);
        let err = verify_day_output(&path).unwrap_err();
        assert!(err.to_string().contains("287 data rows, need 288"));

        let path = day_file(dir.path(), 288);
        assert_eq!(verify_day_output(&path).unwrap(), 288);
    }

    #[test]
    fn missing_file_is_reported() {
        let err = verify_day_output(Path::new("/nonexistent/rec.csv")).unwrap_err();
        assert!(err.downcast_ref::<RecorderError>().is_some());
    }

    #[test]
    fn bad_numbers_name_the_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "2013-07-31 00:00:00 PDT,abc,1\n").unwrap();
        let err = read_recorder(&path).unwrap_err();
        assert!(err.to_string().contains("bad row 0"));
    }
}
