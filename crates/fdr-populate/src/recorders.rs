//! Measurement objects appended to a populated feeder.
//!
//! The network-node recorder is always present: calibration compares its
//! `measured_real_power` column against SCADA. Everything else is opt-in.

use fdr_core::{ObjectTree, Record};
use serde::{Deserialize, Serialize};

use crate::tech::TechParameters;

/// Name of the substation-head recorder.
pub const NETWORK_RECORDER: &str = "network_node_recorder";
/// Directory the simulator writes recorder output into.
pub const OUTPUT_DIR: &str = "csv_output";

/// Optional recorders beyond the network node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecorderOptions {
    pub substation_power: bool,
    pub climate: bool,
    pub collectors: bool,
}

impl RecorderOptions {
    pub fn all() -> Self {
        Self { substation_power: true, climate: true, collectors: true }
    }
}

/// Recorder file name for `case`, relative to the model directory.
pub fn recorder_file(case: &str, what: &str) -> String {
    format!("{OUTPUT_DIR}/{case}_{what}.csv")
}

fn recorder(name: &str, parent: &str, property: &str, file: String, tech: &TechParameters) -> Record {
    Record::object("recorder")
        .with("name", name)
        .with("parent", parent)
        .with("property", property)
        .with("file", file)
        .with("interval", tech.meas_interval.to_string())
        .with("limit", tech.meas_limit.to_string())
}

fn collector(group: &str, property: &str, file: String, tech: &TechParameters) -> Record {
    Record::object("collector")
        .with("group", group)
        .with("property", property)
        .with("file", file)
        .with("interval", tech.meas_interval.to_string())
        .with("limit", tech.meas_limit.to_string())
}

/// Append the recorders for `case` and return how many were added.
pub fn attach_recorders(
    tree: &mut ObjectTree,
    case: &str,
    swing: &str,
    options: RecorderOptions,
    tech: &TechParameters,
) -> usize {
    let before = tree.len();
    tree.push(recorder(
        NETWORK_RECORDER,
        "network_node",
        "measured_real_power,measured_real_energy",
        recorder_file(case, "network_node_recorder"),
        tech,
    ));
    if options.substation_power {
        tree.push(recorder(
            "substation_power_recorder",
            "substation_transformer",
            "power_in_A.real,power_in_B.real,power_in_C.real,power_losses.real",
            recorder_file(case, "substation_power"),
            tech,
        ));
        tree.push(recorder(
            "swing_voltage_recorder",
            swing,
            "voltage_A,voltage_B,voltage_C",
            recorder_file(case, "swing_voltage"),
            tech,
        ));
    }
    if options.climate {
        tree.push(recorder(
            "climate_recorder",
            "ClimateWeather",
            "temperature,solar_flux",
            recorder_file(case, "climate"),
            tech,
        ));
    }
    if options.collectors {
        let groups = [
            ("groupid=Responsive_load", "sum(base_power)", "responsive_load"),
            ("groupid=Unresponsive_load", "sum(base_power)", "unresponsive_load"),
            ("class=waterheater", "sum(actual_load)", "waterheater"),
            ("groupid=Lights", "sum(base_power)", "lights"),
            ("groupid=Plugs", "sum(base_power)", "plugs"),
            ("groupid=Gas_waterheater", "sum(base_power)", "gas_waterheater"),
            ("groupid=Occupancy", "sum(base_power)", "occupancy"),
        ];
        for (group, property, what) in groups {
            tree.push(collector(group, property, recorder_file(case, what), tech));
        }
    }
    tree.len() - before
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tech::TechnologyCase;

    #[test]
    fn network_node_recorder_is_always_added() {
        let tech = TechParameters::for_case(TechnologyCase::Base);
        let mut tree = ObjectTree::new();
        let added = attach_recorders(&mut tree, "0", "n650", RecorderOptions::default(), &tech);
        assert_eq!(added, 1);
        let rec = tree.by_name(NETWORK_RECORDER).unwrap();
        assert_eq!(rec.parent(), Some("network_node"));
        assert_eq!(rec.get("file"), Some("csv_output/0_network_node_recorder.csv"));
        assert_eq!(rec.get("interval"), Some("300"));
    }

    #[test]
    fn full_options_add_collectors() {
        let tech = TechParameters::for_case(TechnologyCase::Base);
        let mut tree = ObjectTree::new();
        let added = attach_recorders(&mut tree, "13", "n650", RecorderOptions::all(), &tech);
        assert_eq!(added, 11);
        assert_eq!(tree.count_kind("collector"), 7);
        assert_eq!(tree.by_name("swing_voltage_recorder").unwrap().parent(), Some("n650"));
    }
}
