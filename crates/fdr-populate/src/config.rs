//! Feeder population settings and the calibration knobs.
//!
//! A [`FeederConfig`] starts from [`Default`] and is then overlaid with a
//! user dictionary (TOML or JSON). Unknown keys are reported as warnings and
//! ignored; knob values outside their range are clipped.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use fdr_core::{Diagnostics, FdrError};
use serde::{Deserialize, Serialize};

// ============================================================================
// Knobs
// ============================================================================

/// One calibration knob. The first twelve form the configuration vector;
/// the load-shape scalar is only used by the load-shape case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Knob {
    AvgHouse,
    AvgCommercial,
    BaseLoadScalar,
    CoolingOffset,
    HeatingOffset,
    CopHighScalar,
    CopLowScalar,
    ResidentialSkewShift,
    DecreaseGas,
    SchedSkewStd,
    WindowWallRatio,
    AddtlHeatDegrees,
    LoadShapeScalar,
}

impl Knob {
    /// The twelve knobs of the configuration vector, in vector order.
    pub const VECTOR: [Knob; 12] = [
        Knob::AvgHouse,
        Knob::AvgCommercial,
        Knob::BaseLoadScalar,
        Knob::CoolingOffset,
        Knob::HeatingOffset,
        Knob::CopHighScalar,
        Knob::CopLowScalar,
        Knob::ResidentialSkewShift,
        Knob::DecreaseGas,
        Knob::SchedSkewStd,
        Knob::WindowWallRatio,
        Knob::AddtlHeatDegrees,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Knob::AvgHouse => "avg_house",
            Knob::AvgCommercial => "avg_commercial",
            Knob::BaseLoadScalar => "base_load_scalar",
            Knob::CoolingOffset => "cooling_offset",
            Knob::HeatingOffset => "heating_offset",
            Knob::CopHighScalar => "cop_high_scalar",
            Knob::CopLowScalar => "cop_low_scalar",
            Knob::ResidentialSkewShift => "residential_skew_shift",
            Knob::DecreaseGas => "decrease_gas",
            Knob::SchedSkewStd => "sched_skew_std",
            Knob::WindowWallRatio => "window_wall_ratio",
            Knob::AddtlHeatDegrees => "addtl_heat_degrees",
            Knob::LoadShapeScalar => "load_shape_scalar",
        }
    }

    /// Look a knob up by its name or by the key older configuration files
    /// used for it.
    pub fn from_name(name: &str) -> Option<Knob> {
        let knob = match name {
            "avg_house" => Knob::AvgHouse,
            "avg_commercial" => Knob::AvgCommercial,
            "base_load_scalar" => Knob::BaseLoadScalar,
            "cooling_offset" => Knob::CoolingOffset,
            "heating_offset" => Knob::HeatingOffset,
            "cop_high_scalar" | "COP_high_scalar" => Knob::CopHighScalar,
            "cop_low_scalar" | "COP_low_scalar" => Knob::CopLowScalar,
            "residential_skew_shift" => Knob::ResidentialSkewShift,
            "decrease_gas" => Knob::DecreaseGas,
            "sched_skew_std" | "residential_skew_std" => Knob::SchedSkewStd,
            "window_wall_ratio" => Knob::WindowWallRatio,
            "addtl_heat_degrees" => Knob::AddtlHeatDegrees,
            "load_shape_scalar" | "normalized_loadshape_scalar" => Knob::LoadShapeScalar,
            _ => return None,
        };
        Some(knob)
    }

    /// Inclusive `(lo, hi)` range.
    pub fn range(self) -> (f64, f64) {
        match self {
            Knob::AvgHouse => (7500.0, 30000.0),
            Knob::AvgCommercial => (10000.0, 80000.0),
            Knob::BaseLoadScalar => (-0.5, 1.0),
            Knob::CoolingOffset | Knob::HeatingOffset => (-4.0, 4.0),
            Knob::CopHighScalar | Knob::CopLowScalar => (-0.5, 0.5),
            Knob::ResidentialSkewShift => (-8100.0, 8100.0),
            Knob::DecreaseGas => (-0.5, 0.5),
            Knob::SchedSkewStd => (900.0, 8100.0),
            Knob::WindowWallRatio => (0.05, 0.6),
            Knob::AddtlHeatDegrees => (-5.0, 5.0),
            Knob::LoadShapeScalar => (0.01, 10.0),
        }
    }

    pub fn default_value(self) -> f64 {
        match self {
            Knob::AvgHouse => 15000.0,
            Knob::AvgCommercial => 35000.0,
            Knob::CoolingOffset | Knob::HeatingOffset => 2.0,
            Knob::SchedSkewStd => 2700.0,
            Knob::WindowWallRatio => 0.15,
            Knob::LoadShapeScalar => 1.0,
            _ => 0.0,
        }
    }

    /// Clamp into range, logging when the value moved.
    pub fn clip(self, value: f64) -> f64 {
        let (lo, hi) = self.range();
        let clipped = if value.is_nan() { self.default_value() } else { value.clamp(lo, hi) };
        if clipped != value {
            tracing::debug!(knob = self.name(), value, clipped, "clipped knob to range");
        }
        clipped
    }
}

// ============================================================================
// Dictionary values
// ============================================================================

/// A value in a user configuration dictionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl ConfigValue {
    fn as_number(&self, key: &str) -> Result<f64> {
        match self {
            ConfigValue::Number(n) => Ok(*n),
            ConfigValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| FdrError::Config(format!("'{key}' expects a number, got '{s}'")).into()),
            ConfigValue::List(_) => bail!(FdrError::Config(format!("'{key}' expects a number, got a list"))),
        }
    }

    fn as_text(&self, key: &str) -> Result<String> {
        match self {
            ConfigValue::Text(s) => Ok(s.clone()),
            ConfigValue::Number(n) => Ok(n.to_string()),
            ConfigValue::List(_) => bail!(FdrError::Config(format!("'{key}' expects text, got a list"))),
        }
    }
}

// ============================================================================
// Feeder configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeederConfig {
    /// Weather file read by the climate object (`.csv` or `.tmy2`)
    pub weather: String,
    pub timezone: String,
    pub start_date: String,
    pub stop_date: String,
    /// Directory holding the appliance, setpoint and commercial schedules
    pub schedules_dir: String,
    /// Climate region, 1 to 6
    pub region: u8,
    /// Substation rating in MVA
    pub feeder_rating: f64,
    /// Transmission-side nominal voltage of the substation transformer
    pub nom_volt: f64,
    pub voltage_players: [String; 3],
    /// Normalized feeder load shape played by the load-shape case
    pub load_shape_file: String,
    /// Feeder peak in kVA used to size PV penetration
    pub emissions_peak: f64,
    /// PV capacity as a percentage of `emissions_peak`
    pub solar_penetration: f64,
    /// PV already on the feeder in kW, subtracted from the target
    pub existing_pv: f64,
    /// Share of the PV target placed on homes when both sectors get PV
    pub pv_residential_share: f64,
    /// Share of buildings (percent) that get thermal storage
    pub ts_penetration: f64,
    /// Added to every population stage's fixed seed
    pub seed: u64,
    pub knobs: BTreeMap<Knob, f64>,
}

impl Default for FeederConfig {
    fn default() -> Self {
        let mut knobs: BTreeMap<Knob, f64> =
            Knob::VECTOR.iter().map(|k| (*k, k.default_value())).collect();
        knobs.insert(Knob::LoadShapeScalar, Knob::LoadShapeScalar.default_value());
        Self {
            weather: "schedules/SCADA_weather_NC_gld_shifted.csv".to_string(),
            timezone: "PST+8PDT".to_string(),
            start_date: "2013-01-01 0:00:00".to_string(),
            stop_date: "2014-01-01 0:00:00".to_string(),
            schedules_dir: "schedules".to_string(),
            region: 4,
            feeder_rating: 1.15 * 14.0,
            nom_volt: 14400.0,
            voltage_players: [
                "schedules/VA.player".to_string(),
                "schedules/VB.player".to_string(),
                "schedules/VC.player".to_string(),
            ],
            load_shape_file: "schedules/load_shape_player.player".to_string(),
            emissions_peak: 13910.0,
            solar_penetration: 0.0,
            existing_pv: 0.0,
            pv_residential_share: 0.5,
            ts_penetration: 10.0,
            seed: 0,
            knobs,
        }
    }
}

impl FeederConfig {
    /// Defaults overlaid with the dictionary in `path` (`.toml` or `.json`).
    pub fn from_path(path: &Path, diagnostics: &mut Diagnostics) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading feeder configuration {}", path.display()))?;
        let overrides: BTreeMap<String, ConfigValue> = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&text)
                .with_context(|| format!("parsing JSON configuration {}", path.display()))?,
            _ => toml::from_str(&text)
                .with_context(|| format!("parsing TOML configuration {}", path.display()))?,
        };
        let mut config = FeederConfig::default();
        config.apply_overrides(&overrides, diagnostics)?;
        Ok(config)
    }

    /// Merge a user dictionary over the current values.
    pub fn apply_overrides(
        &mut self,
        overrides: &BTreeMap<String, ConfigValue>,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        for (key, value) in overrides {
            if let Some(knob) = Knob::from_name(key) {
                let raw = value.as_number(key)?;
                self.set_knob(knob, raw);
                continue;
            }
            match key.as_str() {
                "weather" => self.weather = value.as_text(key)?.replace('\\', "/"),
                "timezone" => self.timezone = value.as_text(key)?,
                "start_date" | "startdate" => self.start_date = value.as_text(key)?,
                "stop_date" | "stopdate" => self.stop_date = value.as_text(key)?,
                "schedules_dir" => self.schedules_dir = value.as_text(key)?.replace('\\', "/"),
                "region" => {
                    let region = value.as_number(key)?;
                    if !(1.0..=6.0).contains(&region) || region.fract() != 0.0 {
                        bail!(FdrError::Config(format!("unknown region {region}; expected 1 to 6")));
                    }
                    self.region = region as u8;
                }
                "feeder_rating" => self.feeder_rating = value.as_number(key)?,
                "nom_volt" => self.nom_volt = value.as_number(key)?,
                "voltage_players" => match value {
                    ConfigValue::List(items) if items.len() == 3 => {
                        for (slot, item) in self.voltage_players.iter_mut().zip(items) {
                            *slot = item.replace('\\', "/");
                        }
                    }
                    _ => bail!(FdrError::Config(
                        "'voltage_players' expects a list of three player files".to_string()
                    )),
                },
                "load_shape_file" | "load_shape_norm" => {
                    self.load_shape_file = value.as_text(key)?.replace('\\', "/")
                }
                "emissions_peak" => self.emissions_peak = value.as_number(key)?,
                "solar_penetration" => {
                    self.solar_penetration = value.as_number(key)?.clamp(0.0, 100.0)
                }
                "existing_pv" => self.existing_pv = value.as_number(key)?.max(0.0),
                "pv_residential_share" => {
                    self.pv_residential_share = value.as_number(key)?.clamp(0.0, 1.0)
                }
                "ts_penetration" => self.ts_penetration = value.as_number(key)?.clamp(0.0, 100.0),
                "seed" => self.seed = value.as_number(key)?.max(0.0) as u64,
                _ => {
                    tracing::warn!(key = key.as_str(), "ignoring unknown configuration key");
                    diagnostics.add_warning_with_entity("config", "unknown configuration key ignored", key);
                }
            }
        }
        Ok(())
    }

    pub fn knob(&self, knob: Knob) -> f64 {
        self.knobs.get(&knob).copied().unwrap_or_else(|| knob.default_value())
    }

    /// Set a knob, clipped to its range.
    pub fn set_knob(&mut self, knob: Knob, value: f64) {
        self.knobs.insert(knob, knob.clip(value));
    }

    /// The twelve-element configuration vector in [`Knob::VECTOR`] order.
    pub fn vector(&self) -> [f64; 12] {
        let mut out = [0.0; 12];
        for (slot, knob) in out.iter_mut().zip(Knob::VECTOR) {
            *slot = self.knob(knob);
        }
        out
    }

    /// Copy with the configuration vector replaced.
    pub fn with_vector(&self, values: &[f64; 12]) -> Self {
        let mut out = self.clone();
        for (knob, value) in Knob::VECTOR.iter().zip(values) {
            out.set_knob(*knob, *value);
        }
        out
    }

    /// PV capacity in kW the solar stage must place.
    pub fn solar_target_kw(&self) -> f64 {
        (self.emissions_peak * self.solar_penetration / 100.0 - self.existing_pv).max(0.0)
    }

    /// Multiplier applied to responsive and unresponsive end-use loads.
    pub fn base_load_factor(&self) -> f64 {
        1.0 + self.knob(Knob::BaseLoadScalar)
    }

    pub fn cop_high_factor(&self) -> f64 {
        1.0 + self.knob(Knob::CopHighScalar)
    }

    pub fn cop_low_factor(&self) -> f64 {
        1.0 + self.knob(Knob::CopLowScalar)
    }

    /// Share of gas heating kept; the rest moves to heat pumps.
    pub fn gas_factor(&self) -> f64 {
        1.0 - self.knob(Knob::DecreaseGas)
    }
}
