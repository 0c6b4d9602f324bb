//! # fdr-io: file formats
//!
//! - [`mdl`]: lexer, parser, printer and de-embedder for MDL model files
//! - [`gis`]: importer for CSV exports of a utility GIS database
//! - [`recorder`]: simulator recorder CSV reader and day-output check
//! - [`scada`]: per-season SCADA reference metrics

pub mod gis;
pub mod mdl;
pub mod recorder;
pub mod scada;

pub use gis::{import_gis, ImportResult};
pub use recorder::{read_recorder, verify_day_output, RecorderError, RecorderRow, RecorderSeries};
pub use scada::{read_scada, DayMetrics, ScadaReference};
