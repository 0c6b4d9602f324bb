//! Scenario handling for feeder runs.
//!
//! [`scenario`] holds the reference days of a calibration and the clock
//! window around each one; [`seasons`] writes the per-season models a
//! candidate is simulated with; [`study`] generates Monte-Carlo PV
//! penetration studies and their batch scripts.

pub mod scenario;
pub mod seasons;
pub mod study;

pub use scenario::{clock_window, ClockWindow, Scenario};
pub use seasons::{season_stem, write_season_files, SeasonFile};
pub use study::{generate_study, load_spec_from_path, ScenarioSet, StudyManifest};
