pub mod batch;
pub mod calibrate;
pub mod completions;
pub mod import;
pub mod mdl;
pub mod metrics;
pub mod populate;
pub mod runs;
pub mod scenarios;
pub mod telemetry;
pub mod util;
