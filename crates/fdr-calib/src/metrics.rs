//! Metrics of a simulated day and their errors against SCADA.

use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDateTime, Timelike};
use fdr_core::Season;
use fdr_io::recorder::{read_recorder, RecorderRow, RecorderSeries, MIN_DAY_ROWS};
use fdr_io::scada::{DayMetrics, ScadaReference};
use fdr_scenarios::{ClockWindow, SeasonFile};
use serde::{Deserialize, Serialize};

/// Errors per season (summer, winter, spring) in pv, pt, te, mv, mt order.
pub type ErrorMatrix = [[f64; 5]; 3];

pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn fractional_hour(time: NaiveDateTime) -> f64 {
    f64::from(time.hour()) + f64::from(time.minute()) / 60.0
}

/// Extract the five metrics from a recorder series.
///
/// Peak and minimum come from the rows of the recorded day when the window
/// matches any. The energy column is cumulative from the simulation start,
/// so the day's energy is the reading at the window stop minus the reading
/// at the day's start; without a matching window it spans the whole series.
pub fn day_metrics(series: &RecorderSeries, window: Option<&ClockWindow>) -> Result<DayMetrics> {
    let first = series.rows.first().ok_or_else(|| anyhow!("recorder series is empty"))?;
    let last = series.rows.last().unwrap_or(first);
    let in_window: Vec<&RecorderRow> = match window {
        Some(window) => series.rows.iter().filter(|row| window.records(row.time)).collect(),
        None => Vec::new(),
    };
    let (rows, energy) = match (window, in_window.is_empty()) {
        (Some(window), false) => {
            let at_or_before = |limit: NaiveDateTime| series.rows.iter().rev().find(|row| row.time <= limit);
            let start = at_or_before(window.record_start).unwrap_or(first);
            let end = at_or_before(window.stop).unwrap_or(last);
            (in_window, end.energy - start.energy)
        }
        _ => (series.rows.iter().collect(), last.energy - first.energy),
    };

    let mut peak = rows[0];
    let mut min = rows[0];
    for row in &rows {
        if row.power > peak.power {
            peak = row;
        }
        if row.power < min.power {
            min = row;
        }
    }
    Ok(DayMetrics {
        peak_kw: peak.power / 1000.0,
        peak_time_h: fractional_hour(peak.time),
        total_kwh: energy / 1000.0,
        min_kw: min.power / 1000.0,
        min_time_h: fractional_hour(min.time),
    })
}

/// `(m - r) / r` for values and `(m - r) / 24` for times, rounded to four
/// decimals.
pub fn metric_errors(measured: &DayMetrics, reference: &DayMetrics) -> [f64; 5] {
    let value = |m: f64, r: f64| if r == 0.0 { 0.0 } else { round4((m - r) / r) };
    let time = |m: f64, r: f64| round4((m - r) / 24.0);
    [
        value(measured.peak_kw, reference.peak_kw),
        time(measured.peak_time_h, reference.peak_time_h),
        value(measured.total_kwh, reference.total_kwh),
        value(measured.min_kw, reference.min_kw),
        time(measured.min_time_h, reference.min_time_h),
    ]
}

/// Metrics of one candidate across all three seasons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMetrics {
    pub days: [DayMetrics; 3],
    pub errors: ErrorMatrix,
}

impl CandidateMetrics {
    pub fn from_days(days: [DayMetrics; 3], scada: &ScadaReference) -> Result<Self> {
        let mut errors = [[0.0; 5]; 3];
        for (season, row) in Season::ALL.into_iter().zip(errors.iter_mut()) {
            let reference = scada
                .day(season)
                .ok_or_else(|| anyhow!("SCADA reference has no {season} day"))?;
            *row = metric_errors(&days[season.index()], reference);
        }
        Ok(Self { days, errors })
    }

    /// Summer peak, summer energy, winter peak and winter energy errors.
    pub fn main(&self) -> [f64; 4] {
        [self.errors[0][0], self.errors[0][2], self.errors[1][0], self.errors[1][2]]
    }
}

/// Read the three recorder outputs of a candidate and score them.
pub fn glean_candidate(files: &[SeasonFile], scada: &ScadaReference) -> Result<CandidateMetrics> {
    let mut days: [Option<DayMetrics>; 3] = [None; 3];
    for file in files {
        let series = read_recorder(&file.recorder)?;
        if series.len() < MIN_DAY_ROWS {
            return Err(anyhow!(
                "{} has {} rows, need {MIN_DAY_ROWS}",
                file.recorder.display(),
                series.len()
            ));
        }
        let metrics = day_metrics(&series, Some(&file.window))
            .with_context(|| format!("extracting metrics from {}", file.recorder.display()))?;
        days[file.season.index()] = Some(metrics);
    }
    let [Some(summer), Some(winter), Some(spring)] = days else {
        return Err(anyhow!("candidate is missing a season"));
    };
    CandidateMetrics::from_days([summer, winter, spring], scada)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use fdr_scenarios::clock_window;

    fn row(day: NaiveDate, h: u32, m: u32, power: f64, energy: f64) -> RecorderRow {
        RecorderRow { time: day.and_hms_opt(h, m, 0).unwrap(), power, energy }
    }

    #[test]
    fn metrics_use_the_recorded_day() {
        let day = NaiveDate::from_ymd_opt(2013, 7, 31).unwrap();
        let before = NaiveDate::from_ymd_opt(2013, 7, 30).unwrap();
        let after = NaiveDate::from_ymd_opt(2013, 8, 1).unwrap();
        let series = RecorderSeries {
            rows: vec![
                row(before, 12, 0, 9_000_000.0, 100_000.0),
                row(day, 0, 0, 2_500_000.0, 150_000.0),
                row(day, 3, 30, 1_500_000.0, 200_000.0),
                row(day, 17, 15, 4_000_000.0, 300_000.0),
                row(day, 23, 55, 2_000_000.0, 400_000.0),
                row(after, 0, 0, 9_500_000.0, 410_000.0),
            ],
        };
        let metrics = day_metrics(&series, Some(&clock_window(day))).unwrap();
        assert_eq!(metrics.peak_kw, 4000.0);
        assert_eq!(metrics.peak_time_h, 17.25);
        assert_eq!(metrics.min_kw, 1500.0);
        assert_eq!(metrics.min_time_h, 3.5);
        assert_eq!(metrics.total_kwh, 260.0);
    }

    #[test]
    fn warm_up_energy_is_not_counted() {
        let day = NaiveDate::from_ymd_opt(2013, 1, 15).unwrap();
        let before = NaiveDate::from_ymd_opt(2013, 1, 14).unwrap();
        // 1 MW for two days at hourly rows; energy accumulates from the warm-up start.
        let mut rows = Vec::new();
        for (offset, date) in [(0.0, before), (24.0, day)] {
            for h in 0..24 {
                let hours = offset + f64::from(h);
                rows.push(row(date, h, 0, 1_000_000.0, 1_000_000.0 * hours));
            }
        }
        rows.push(row(NaiveDate::from_ymd_opt(2013, 1, 16).unwrap(), 0, 0, 1_000_000.0, 48_000_000.0));
        let series = RecorderSeries { rows };
        let metrics = day_metrics(&series, Some(&clock_window(day))).unwrap();
        assert_eq!(metrics.total_kwh, 24_000.0);
        assert_eq!(metrics.peak_kw, 1000.0);
        assert_eq!(metrics.peak_time_h, 0.0);

        let whole = day_metrics(&series, None).unwrap();
        assert_eq!(whole.total_kwh, 48_000.0);
    }

    #[test]
    fn errors_are_relative_and_rounded() {
        let reference = DayMetrics { peak_kw: 3000.0, peak_time_h: 18.0, total_kwh: 60.0, min_kw: 1000.0, min_time_h: 4.0 };
        let measured = DayMetrics { peak_kw: 3300.0, peak_time_h: 17.0, total_kwh: 45.0, min_kw: 1000.0, min_time_h: 4.5 };
        let errors = metric_errors(&measured, &reference);
        assert_eq!(errors, [0.1, round4(-1.0 / 24.0), -0.25, 0.0, round4(0.5 / 24.0)]);
        assert_eq!(errors[1], -0.0417);
    }

    #[test]
    fn main_metrics_pick_peaks_and_energy() {
        let day = DayMetrics { peak_kw: 1.0, peak_time_h: 1.0, total_kwh: 1.0, min_kw: 1.0, min_time_h: 1.0 };
        let scada = ScadaReference::new(day, day, day).unwrap();
        let mut metrics = CandidateMetrics::from_days([day; 3], &scada).unwrap();
        metrics.errors[0] = [0.1, 0.2, 0.3, 0.4, 0.5];
        metrics.errors[1] = [0.6, 0.7, 0.8, 0.9, 1.0];
        assert_eq!(metrics.main(), [0.1, 0.3, 0.6, 0.8]);
    }
}
