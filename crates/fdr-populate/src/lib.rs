//! # fdr-populate: feeder population
//!
//! Turns a bare network (lines, transformers, spot loads) into a populated
//! feeder model for one technology case:
//!
//! - [`config`]: feeder configuration dictionary and the calibration knobs
//! - [`region`]: per-region load-class tables
//! - [`tech`]: technology cases and their fixed parameters
//! - [`residential`], [`commercial`]: house and building generators
//! - [`solar`], [`storage`], [`loadshape`]: case-specific additions
//! - [`recorders`]: measurement objects
//! - [`feeder`]: [`populate_feeder`], which runs all of the above in order

pub mod commercial;
pub mod config;
pub mod feeder;
pub mod loads;
pub mod loadshape;
pub mod recorders;
pub mod region;
pub mod residential;
pub mod sampling;
pub mod solar;
pub mod storage;
pub mod tech;
pub mod units;

pub use config::{ConfigValue, FeederConfig, Knob};
pub use feeder::{populate_feeder, PopulateOutput, PopulateStats};
pub use recorders::{RecorderOptions, NETWORK_RECORDER};
pub use tech::{TechParameters, TechnologyCase};
