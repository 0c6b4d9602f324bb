//! Measured SCADA reference metrics.
//!
//! The reference is a small CSV with one row per season:
//!
//! ```text
//! season,peak_kw,peak_time_h,total_kwh,min_kw,min_time_h
//! summer,5120.4,17.25,88031.2,1830.0,4.5
//! winter,3980.1,18.75,70210.9,1602.3,3.75
//! spring,3010.6,19.0,55120.4,1311.8,4.0
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use csv::ReaderBuilder;
use fdr_core::Season;
use serde::{Deserialize, Serialize};

/// The five per-day metrics, in canonical order pv, pt, te, mv, mt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DayMetrics {
    pub peak_kw: f64,
    /// Fractional hour of day
    pub peak_time_h: f64,
    pub total_kwh: f64,
    pub min_kw: f64,
    pub min_time_h: f64,
}

impl DayMetrics {
    pub fn as_array(&self) -> [f64; 5] {
        [
            self.peak_kw,
            self.peak_time_h,
            self.total_kwh,
            self.min_kw,
            self.min_time_h,
        ]
    }

    /// Check the invariants a measured day must satisfy.
    pub fn validate(&self) -> Result<()> {
        if self.total_kwh < 0.0 {
            bail!("total energy {} is negative", self.total_kwh);
        }
        for (label, t) in [("peak", self.peak_time_h), ("minimum", self.min_time_h)] {
            if !(0.0..24.0).contains(&t) {
                bail!("{label} time {t} is outside [0, 24)");
            }
        }
        if self.peak_kw == 0.0 || self.min_kw == 0.0 || self.total_kwh == 0.0 {
            bail!("reference values must be nonzero to compute relative errors");
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ScadaRow {
    season: Season,
    peak_kw: f64,
    peak_time_h: f64,
    total_kwh: f64,
    min_kw: f64,
    min_time_h: f64,
}

/// Measured metrics for all three seasons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScadaReference {
    pub days: BTreeMap<Season, DayMetrics>,
}

impl ScadaReference {
    pub fn new(summer: DayMetrics, winter: DayMetrics, spring: DayMetrics) -> Result<Self> {
        let days: BTreeMap<_, _> = [
            (Season::Summer, summer),
            (Season::Winter, winter),
            (Season::Spring, spring),
        ]
        .into_iter()
        .collect();
        let reference = Self { days };
        reference.validate()?;
        Ok(reference)
    }

    pub fn day(&self, season: Season) -> Option<&DayMetrics> {
        self.days.get(&season)
    }

    pub fn validate(&self) -> Result<()> {
        for season in Season::ALL {
            let day = self
                .days
                .get(&season)
                .ok_or_else(|| anyhow!("SCADA reference has no {season} row"))?;
            day.validate()
                .with_context(|| format!("SCADA reference for {season}"))?;
        }
        Ok(())
    }
}

/// Load a SCADA reference CSV.
pub fn read_scada(path: &Path) -> Result<ScadaReference> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening SCADA reference {}", path.display()))?;
    let mut days = BTreeMap::new();
    for result in rdr.deserialize() {
        let row: ScadaRow = result.context("parsing SCADA reference row")?;
        let metrics = DayMetrics {
            peak_kw: row.peak_kw,
            peak_time_h: row.peak_time_h,
            total_kwh: row.total_kwh,
            min_kw: row.min_kw,
            min_time_h: row.min_time_h,
        };
        if days.insert(row.season, metrics).is_some() {
            bail!("SCADA reference lists {} twice", row.season);
        }
    }
    let reference = ScadaReference { days };
    reference
        .validate()
        .with_context(|| format!("validating {}", path.display()))?;
    Ok(reference)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = "season,peak_kw,peak_time_h,total_kwh,min_kw,min_time_h\n\
        summer,5120.4,17.25,88031.2,1830.0,4.5\n\
        winter,3980.1,18.75,70210.9,1602.3,3.75\n\
        spring,3010.6,19.0,55120.4,1311.8,4.0\n";

    #[test]
    fn reads_three_seasons() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scada.csv");
        std::fs::write(&path, GOOD).unwrap();
        let scada = read_scada(&path).unwrap();
        assert_eq!(scada.day(Season::Winter).unwrap().peak_time_h, 18.75);
        assert_eq!(scada.day(Season::Summer).unwrap().as_array()[2], 88031.2);
    }

    #[test]
    fn rejects_bad_times_and_missing_seasons() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scada.csv");
        std::fs::write(&path, GOOD.replace("17.25", "24.0")).unwrap();
        let err = format!("{:#}", read_scada(&path).unwrap_err());
        assert!(err.contains("outside [0, 24)"));

        let short: String = GOOD.lines().take(3).map(|l| format!("{l}\n")).collect();
        std::fs::write(&path, short).unwrap();
        let err = format!("{:#}", read_scada(&path).unwrap_err());
        assert!(err.contains("no spring row"));
    }
}
