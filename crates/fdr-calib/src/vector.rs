use std::fmt;

use fdr_populate::{FeederConfig, Knob};
use serde::{Deserialize, Serialize};

/// The twelve calibration knobs, plus the load-shape scalar when the
/// load-shape case is calibrated. Every value is kept inside its knob range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfigVector {
    pub values: [f64; 12],
    pub load_shape_scalar: Option<f64>,
}

impl Default for ConfigVector {
    fn default() -> Self {
        Self { values: Knob::VECTOR.map(Knob::default_value), load_shape_scalar: None }
    }
}

impl ConfigVector {
    /// Build from raw values, clipping each into range.
    pub fn new(values: [f64; 12]) -> Self {
        let mut vector = Self { values, load_shape_scalar: None };
        vector.clip();
        vector
    }

    pub fn from_config(config: &FeederConfig) -> Self {
        Self::new(config.vector())
    }

    pub fn with_load_shape(mut self, scalar: f64) -> Self {
        self.load_shape_scalar = Some(Knob::LoadShapeScalar.clip(scalar));
        self
    }

    pub fn get(&self, knob: Knob) -> f64 {
        match Knob::VECTOR.iter().position(|k| *k == knob) {
            Some(index) => self.values[index],
            None => self.load_shape_scalar.unwrap_or_else(|| knob.default_value()),
        }
    }

    pub fn set(&mut self, knob: Knob, value: f64) {
        match Knob::VECTOR.iter().position(|k| *k == knob) {
            Some(index) => self.values[index] = knob.clip(value),
            None => self.load_shape_scalar = Some(knob.clip(value)),
        }
    }

    pub fn clip(&mut self) {
        for (value, knob) in self.values.iter_mut().zip(Knob::VECTOR) {
            *value = knob.clip(*value);
        }
        if let Some(scalar) = self.load_shape_scalar.as_mut() {
            *scalar = Knob::LoadShapeScalar.clip(*scalar);
        }
    }

    /// `base` with this vector's knobs applied.
    pub fn apply(&self, base: &FeederConfig) -> FeederConfig {
        let mut config = base.with_vector(&self.values);
        if let Some(scalar) = self.load_shape_scalar {
            config.set_knob(Knob::LoadShapeScalar, scalar);
        }
        config
    }

    /// Bitwise equality, used to drop duplicate candidates.
    pub fn same_as(&self, other: &ConfigVector) -> bool {
        self.values.iter().zip(&other.values).all(|(a, b)| a.to_bits() == b.to_bits())
            && self.load_shape_scalar.map(f64::to_bits) == other.load_shape_scalar.map(f64::to_bits)
    }
}

impl fmt::Display for ConfigVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        write!(f, "[{}]", parts.join(", "))?;
        if let Some(scalar) = self.load_shape_scalar {
            write!(f, " load shape {scalar}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_the_knob_defaults() {
        let vector = ConfigVector::default();
        assert_eq!(vector.values, [15000.0, 35000.0, 0.0, 2.0, 2.0, 0.0, 0.0, 0.0, 0.0, 2700.0, 0.15, 0.0]);
        assert_eq!(vector, ConfigVector::from_config(&FeederConfig::default()));
    }

    #[test]
    fn values_are_clipped() {
        let mut vector = ConfigVector::new([1.0e6, 0.0, 5.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 100.0, 0.15, 0.0]);
        assert_eq!(vector.get(Knob::AvgHouse), 30000.0);
        assert_eq!(vector.get(Knob::AvgCommercial), 10000.0);
        assert_eq!(vector.get(Knob::BaseLoadScalar), 1.0);
        assert_eq!(vector.get(Knob::SchedSkewStd), 900.0);
        vector.set(Knob::LoadShapeScalar, 50.0);
        assert_eq!(vector.load_shape_scalar, Some(10.0));
    }

    #[test]
    fn applies_to_a_feeder_config() {
        let vector = ConfigVector::default().with_load_shape(0.5);
        let mut tweaked = vector;
        tweaked.set(Knob::WindowWallRatio, 0.3);
        let config = tweaked.apply(&FeederConfig::default());
        assert_eq!(config.knob(Knob::WindowWallRatio), 0.3);
        assert_eq!(config.knob(Knob::LoadShapeScalar), 0.5);
        assert!(!vector.same_as(&tweaked));
    }
}
