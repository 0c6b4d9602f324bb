//! Weighted-sum-of-metrics scoring.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use fdr_core::FdrError;
use serde::{Deserialize, Serialize};

use crate::metrics::ErrorMatrix;

const SUM_TOLERANCE: f64 = 1e-9;

/// Per-season weights in pv, pt, te, mv, mt order.
///
/// ```toml
/// summer = [0.2, 0.05, 0.15, 0.025, 0.025]
/// winter = [0.2, 0.05, 0.15, 0.025, 0.025]
/// spring = [0.04, 0.01, 0.03, 0.01, 0.01]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub summer: [f64; 5],
    pub winter: [f64; 5],
    pub spring: [f64; 5],
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            summer: [0.2, 0.05, 0.15, 0.025, 0.025],
            winter: [0.2, 0.05, 0.15, 0.025, 0.025],
            spring: [0.04, 0.01, 0.03, 0.01, 0.01],
        }
    }
}

impl Weights {
    pub fn matrix(&self) -> [[f64; 5]; 3] {
        [self.summer, self.winter, self.spring]
    }

    /// Weights must be nonnegative and sum to one.
    pub fn validate(&self) -> Result<(), FdrError> {
        let matrix = self.matrix();
        if let Some(w) = matrix.iter().flatten().find(|w| !(**w >= 0.0)) {
            return Err(FdrError::Validation(format!("weight {w} is negative")));
        }
        let sum: f64 = matrix.iter().flatten().sum();
        if (sum - 1.0).abs() > SUM_TOLERANCE {
            return Err(FdrError::Validation(format!("weights sum to {sum}, expected 1")));
        }
        Ok(())
    }

    /// Load and validate weights from TOML or JSON.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading weights {}", path.display()))?;
        let weights: Weights = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&text)
                .with_context(|| format!("parsing weights {}", path.display()))?,
            _ => toml::from_str(&text).with_context(|| format!("parsing weights {}", path.display()))?,
        };
        weights.validate()?;
        Ok(weights)
    }

    /// Σ W[s][i]·|err[s][i]|
    pub fn wsm(&self, errors: &ErrorMatrix) -> f64 {
        self.matrix()
            .iter()
            .zip(errors)
            .flat_map(|(w, e)| w.iter().zip(e))
            .map(|(w, e)| w * e.abs())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid_and_favor_summer_and_winter() {
        let weights = Weights::default();
        weights.validate().unwrap();
        assert!(weights.summer[0] > weights.spring[0]);
        assert!(weights.winter[2] > weights.winter[1]);
    }

    #[test]
    fn score_is_weighted_absolute_error() {
        let weights = Weights::default();
        let mut errors = [[0.0; 5]; 3];
        errors[0][0] = -0.5;
        errors[2][2] = 1.0;
        assert!((weights.wsm(&errors) - (0.2 * 0.5 + 0.03)).abs() < 1e-12);
    }

    #[test]
    fn bad_sum_is_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "summer = [0.5, 0, 0, 0, 0]\nwinter = [0.5, 0, 0, 0, 0]\nspring = [0.5, 0, 0, 0, 0]").unwrap();
        let err = Weights::from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("sum"), "{err}");
    }
}
