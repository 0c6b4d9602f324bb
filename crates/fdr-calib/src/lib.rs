//! # fdr-calib: feeder calibration
//!
//! Searches the twelve-knob configuration space for the populated feeder
//! whose simulated summer, winter and spring days best match SCADA.
//!
//! - [`metrics`]: day metrics from recorder output and their errors
//! - [`weights`]: weighted-sum-of-metrics (WSM) scoring
//! - [`vector`]: the configuration vector and its clipping
//! - [`actions`]: candidate generators per action
//! - [`planner`]: action selection, fail counts and the fallback table
//! - [`record`]: the calibration record and WSM evaluation
//! - [`logs`]: CSV logs and winners/losers housekeeping
//! - [`calibrator`]: the loop tying it all together

pub mod actions;
pub mod calibrator;
pub mod logs;
pub mod metrics;
pub mod planner;
pub mod record;
pub mod vector;
pub mod weights;

pub use calibrator::{CalibrationEnd, CalibrationResult, CalibrationSettings, Calibrator};
pub use metrics::{day_metrics, glean_candidate, metric_errors, CandidateMetrics, ErrorMatrix};
pub use planner::Planner;
pub use record::{RoundRecord, WsmEval};
pub use vector::ConfigVector;
pub use weights::Weights;
