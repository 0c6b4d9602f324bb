//! Registry of known MDL object kinds.
//!
//! Each kind declares an ordered attribute list. The order is the canonical
//! one used by positional construction ([`ObjectLibrary::build`]) and it is
//! also the order the populator writes attributes in, which keeps generated
//! files diffable between runs.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::error::{FdrError, FdrResult};
use crate::tree::Record;

/// Coarse role of a kind in the electrical network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KindClass {
    /// Buses: node, meter, triplex_node, triplex_meter, load, ...
    Node,
    /// Two-terminal branches with `from` and `to`
    Link,
    /// Conductor, spacing and line/transformer configurations
    Configuration,
    /// End-use models parented to a meter or house
    EndUse,
    /// Distributed generation and storage
    Generator,
    /// Tape recorders and players
    Recorder,
    Other,
}

/// Schema of one object kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KindSpec {
    pub kind: String,
    pub class: KindClass,
    pub attributes: Vec<String>,
}

impl KindSpec {
    pub fn new(kind: &str, class: KindClass, attributes: &[&str]) -> Self {
        Self {
            kind: kind.to_string(),
            class,
            attributes: attributes.iter().map(|a| a.to_string()).collect(),
        }
    }
}

static STANDARD: Lazy<ObjectLibrary> = Lazy::new(ObjectLibrary::standard);

/// Kind name → schema registry.
#[derive(Debug, Clone, Default)]
pub struct ObjectLibrary {
    kinds: HashMap<String, KindSpec>,
}

impl ObjectLibrary {
    /// Shared read-only library with the standard kinds.
    pub fn global() -> &'static ObjectLibrary {
        &STANDARD
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Add or replace a kind.
    pub fn register(&mut self, spec: KindSpec) {
        self.kinds.insert(spec.kind.clone(), spec);
    }

    pub fn schema(&self, kind: &str) -> FdrResult<&KindSpec> {
        self.kinds
            .get(kind)
            .ok_or_else(|| FdrError::Schema(format!("unknown object kind '{kind}'")))
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    pub fn class_of(&self, kind: &str) -> Option<KindClass> {
        self.kinds.get(kind).map(|s| s.class)
    }

    pub fn is_link(&self, kind: &str) -> bool {
        self.class_of(kind) == Some(KindClass::Link)
    }

    pub fn is_node(&self, kind: &str) -> bool {
        self.class_of(kind) == Some(KindClass::Node)
    }

    /// Kind names in sorted order.
    pub fn kinds(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.kinds.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build a record from values given in schema order. Empty values are
    /// skipped so optional attributes can be left out positionally.
    pub fn build<S: AsRef<str>>(&self, kind: &str, values: &[S]) -> FdrResult<Record> {
        let spec = self.schema(kind)?;
        if values.len() != spec.attributes.len() {
            return Err(FdrError::Schema(format!(
                "{kind} takes {} positional values ({}), got {}",
                spec.attributes.len(),
                spec.attributes.join(", "),
                values.len()
            )));
        }
        let mut record = Record::object(kind);
        for (attr, value) in spec.attributes.iter().zip(values) {
            let value = value.as_ref();
            if !value.is_empty() {
                record.set(attr.as_str(), value);
            }
        }
        Ok(record)
    }

    pub fn standard() -> Self {
        use KindClass::*;
        let table: &[(&str, KindClass, &[&str])] = &[
            ("node", Node, &["name", "parent", "phases", "nominal_voltage", "bustype"]),
            ("meter", Node, &["name", "parent", "phases", "nominal_voltage", "bustype"]),
            ("load", Node, &[
                "name", "parent", "phases", "nominal_voltage", "load_class",
                "constant_power_A", "constant_power_B", "constant_power_C",
            ]),
            ("capacitor", Node, &[
                "name", "parent", "phases", "pt_phase", "phases_connected",
                "capacitor_A", "capacitor_B", "capacitor_C", "control", "control_level",
                "switchA", "switchB", "switchC", "nominal_voltage",
            ]),
            ("triplex_node", Node, &[
                "name", "parent", "phases", "nominal_voltage", "power_1", "power_12",
            ]),
            ("triplex_meter", Node, &[
                "name", "parent", "phases", "nominal_voltage", "groupid", "meter_power_consumption",
            ]),
            ("triplex_load", Node, &[
                "name", "parent", "phases", "nominal_voltage", "load_class", "base_power_12",
                "power_pf_12", "current_pf_12", "impedance_pf_12", "power_fraction_12",
                "current_fraction_12", "impedance_fraction_12",
            ]),
            ("overhead_line", Link, &["name", "phases", "from", "to", "length", "configuration"]),
            ("underground_line", Link, &["name", "phases", "from", "to", "length", "configuration"]),
            ("triplex_line", Link, &["name", "phases", "from", "to", "length", "configuration"]),
            ("switch", Link, &["name", "phases", "from", "to", "status", "operating_mode"]),
            ("fuse", Link, &["name", "phases", "from", "to", "current_limit", "mean_replacement_time", "status"]),
            ("recloser", Link, &["name", "phases", "from", "to", "retry_time", "max_number_of_tries", "status"]),
            ("sectionalizer", Link, &["name", "phases", "from", "to", "status"]),
            ("regulator", Link, &["name", "phases", "from", "to", "configuration", "sense_node"]),
            ("transformer", Link, &["name", "phases", "from", "to", "configuration"]),
            ("overhead_line_conductor", Configuration, &["name", "geometric_mean_radius", "resistance"]),
            ("underground_line_conductor", Configuration, &[
                "name", "outer_diameter", "conductor_gmr", "conductor_diameter", "conductor_resistance",
                "neutral_gmr", "neutral_diameter", "neutral_resistance", "neutral_strands",
                "shield_gmr", "shield_resistance",
            ]),
            ("triplex_line_conductor", Configuration, &["name", "resistance", "geometric_mean_radius"]),
            ("line_spacing", Configuration, &[
                "name", "distance_AB", "distance_AC", "distance_AN", "distance_BC", "distance_BN",
                "distance_CN",
            ]),
            ("line_configuration", Configuration, &[
                "name", "conductor_A", "conductor_B", "conductor_C", "conductor_N", "spacing",
            ]),
            ("triplex_line_configuration", Configuration, &[
                "name", "conductor_1", "conductor_2", "conductor_N", "insulation_thickness", "diameter",
            ]),
            ("transformer_configuration", Configuration, &[
                "name", "connect_type", "install_type", "power_rating", "powerA_rating",
                "powerB_rating", "powerC_rating", "primary_voltage", "secondary_voltage",
                "resistance", "reactance", "shunt_impedance",
            ]),
            ("regulator_configuration", Configuration, &[
                "name", "connect_type", "band_center", "band_width", "time_delay",
                "raise_taps", "lower_taps", "regulation", "Control", "Type",
                "tap_pos_A", "tap_pos_B", "tap_pos_C",
            ]),
            ("house", EndUse, &[
                "name", "parent", "groupid", "schedule_skew", "floor_area", "number_of_stories",
                "ceiling_height", "over_sizing_factor", "Rroof", "Rwall", "Rfloor", "glazing_layers",
                "glass_type", "glazing_treatment", "window_frame", "Rdoors", "airchange_per_hour",
                "cooling_COP", "air_temperature", "mass_temperature", "total_thermal_mass_per_floor_area",
                "heating_system_type", "heating_COP", "cooling_system_type", "auxiliary_strategy",
                "auxiliary_system_type", "motor_model", "motor_efficiency", "hvac_breaker_rating",
                "breaker_amps", "cooling_setpoint", "heating_setpoint", "window_wall_ratio",
            ]),
            ("ZIPload", EndUse, &[
                "name", "parent", "groupid", "schedule_skew", "base_power", "heatgain_fraction",
                "power_pf", "current_pf", "impedance_pf", "impedance_fraction", "current_fraction",
                "power_fraction", "is_240", "duty_cycle", "phase", "period",
            ]),
            ("waterheater", EndUse, &[
                "name", "parent", "schedule_skew", "heating_element_capacity", "tank_setpoint",
                "temperature", "thermostat_deadband", "location", "tank_UA", "demand", "tank_volume",
            ]),
            ("thermal_storage", EndUse, &["name", "parent", "SOC", "k", "discharge_schedule_type", "recharge_schedule_type"]),
            ("inverter", Generator, &[
                "name", "parent", "phases", "generator_status", "inverter_type", "generator_mode",
                "four_quadrant_control_mode", "inverter_efficiency", "rated_power", "V_base",
                "V1", "Q1", "V2", "Q2", "V3", "Q3", "V4", "Q4",
            ]),
            ("solar", Generator, &[
                "name", "parent", "phases", "generator_status", "generator_mode", "panel_type",
                "efficiency", "area", "tilt_angle", "orientation_azimuth", "orientation",
            ]),
            ("recorder", Recorder, &["name", "parent", "property", "file", "interval", "limit"]),
            ("group_recorder", Recorder, &["name", "group", "property", "file", "interval", "limit"]),
            ("collector", Recorder, &["name", "group", "property", "file", "interval", "limit"]),
            ("multi_recorder", Recorder, &["name", "property", "file", "interval", "limit"]),
            ("violation_recorder", Recorder, &[
                "name", "file", "summary", "interval", "strict", "echo", "violation_delay",
                "xfrmr_thermal_limit_upper", "xfrmr_thermal_limit_lower", "line_thermal_limit_upper",
                "line_thermal_limit_lower", "node_instantaneous_voltage_limit_upper",
                "node_instantaneous_voltage_limit_lower", "node_continuous_voltage_limit_upper",
                "node_continuous_voltage_limit_lower", "node_continuous_voltage_interval",
                "secondary_dist_voltage_rise_upper_limit", "secondary_dist_voltage_rise_lower_limit",
                "substation_breaker_A_limit", "substation_breaker_B_limit", "substation_breaker_C_limit",
                "substation_pf_lower_limit", "substation_breaker_A", "substation_breaker_B",
                "substation_breaker_C", "substation_link", "inverter_v_chng_per_interval_upper_bound",
                "inverter_v_chng_per_interval_lower_bound", "inverter_v_chng_interval", "violation_flag",
            ]),
            ("player", Recorder, &["name", "parent", "property", "file", "loop"]),
            ("climate", Other, &["name", "tmyfile", "interpolate"]),
            ("csv_reader", Other, &["name", "filename"]),
            ("volt_var_control", Other, &["name", "control_method", "capacitor_delay", "regulator_delay"]),
            ("metrics_collector", Other, &["name", "parent", "interval"]),
        ];
        let mut lib = ObjectLibrary::empty();
        for (kind, class, attrs) in table {
            lib.register(KindSpec::new(kind, *class, attrs));
        }
        lib
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_library_has_core_kinds() {
        let lib = ObjectLibrary::global();
        assert!(lib.kinds().len() >= 40);
        assert!(lib.is_link("regulator"));
        assert!(lib.is_node("triplex_meter"));
        assert!(!lib.is_link("house"));
    }

    #[test]
    fn build_positional_skips_empty_values() {
        let lib = ObjectLibrary::global();
        let rec = lib
            .build("line_spacing", &["ls1", "2.5", "", "", "", "", "4.0"])
            .unwrap();
        assert_eq!(rec.attribute_count(), 3);
        assert_eq!(rec.get("distance_CN"), Some("4.0"));
    }

    #[test]
    fn build_rejects_arity_mismatch_and_unknown_kind() {
        let lib = ObjectLibrary::global();
        let err = lib.build("meter", &["m1"]).unwrap_err();
        assert!(err.to_string().contains("meter takes 5 positional values"));
        let err = lib.build("flux_capacitor", &["x"]).unwrap_err();
        assert!(matches!(err, FdrError::Schema(_)));
    }

    #[test]
    fn register_extends_a_private_library() {
        let mut lib = ObjectLibrary::standard();
        lib.register(KindSpec::new("evcharger", KindClass::EndUse, &["name", "parent"]));
        assert!(lib.build("evcharger", &["ev1", "house1"]).is_ok());
        assert!(!ObjectLibrary::global().contains("evcharger"));
    }
}
