//! Load-shape case: every spot load follows one normalized feeder player.

use fdr_core::{ObjectTree, Record};

use crate::loads::{CommercialLoad, ResidentialLoad};
use crate::tech::ZipFractions;

/// Name of the player every load-shape load multiplies its base power by.
pub const LOADSHAPE_PLAYER: &str = "norm_feeder_loadshape";
/// Loop count of the load-shape player, roughly forty years of days.
const PLAYER_LOOP: &str = "14600";

/// `player` looping the normalized feeder load shape.
pub fn loadshape_player(file: &str) -> Record {
    Record::object("player")
        .with("name", LOADSHAPE_PLAYER)
        .with("property", "value")
        .with("file", file)
        .with("loop", PLAYER_LOOP)
}

fn zip_suffixed(mut record: Record, suffix: &str, base_power: f64, zip: &ZipFractions) -> Record {
    record.set(format!("base_power_{suffix}"), format!("{LOADSHAPE_PLAYER}.value*{base_power:.6}"));
    record.set(format!("power_pf_{suffix}"), format!("{:.6}", zip.p_pf));
    record.set(format!("current_pf_{suffix}"), format!("{:.6}", zip.i_pf));
    record.set(format!("impedance_pf_{suffix}"), format!("{:.6}", zip.z_pf));
    record.set(format!("power_fraction_{suffix}"), format!("{:.6}", zip.p_frac));
    record.set(format!("current_fraction_{suffix}"), format!("{:.6}", zip.i_frac));
    record.set(format!("impedance_fraction_{suffix}"), format!("{:.6}", zip.z_frac));
    record
}

/// One `triplex_load` per residential load. Returns the number emitted.
pub fn residential_loadshapes(
    tree: &mut ObjectTree,
    loads: &[ResidentialLoad],
    scalar: f64,
    zip: &ZipFractions,
) -> usize {
    for load in loads {
        let mut record = Record::object("triplex_load")
            .with("name", format!("{}_loadshape", load.name))
            .with("parent", load.site_parent())
            .with("phases", load.phases.clone())
            .with("nominal_voltage", "120.0");
        let base_power = load.load * scalar;
        if base_power > 0.0 {
            record = zip_suffixed(record, "12", base_power, zip);
        }
        tree.push(record);
    }
    loads.len()
}

/// One three-phase `load` per commercial load. Returns the number emitted.
pub fn commercial_loadshapes(
    tree: &mut ObjectTree,
    loads: &[CommercialLoad],
    scalar: f64,
    zip: &ZipFractions,
) -> usize {
    for load in loads {
        let mut record = Record::object("load")
            .with("name", format!("{}_loadshape", load.name))
            .with("parent", load.name.clone())
            .with("phases", load.phases.clone())
            .with("nominal_voltage", format!("{:.6}", load.nominal_voltage));
        for (index, phase) in ["A", "B", "C"].iter().enumerate() {
            let base_power = load.load[index] * scalar;
            if load.phases.contains(phase) && base_power > 0.0 {
                record = zip_suffixed(record, phase, base_power, zip);
            }
        }
        tree.push(record);
    }
    loads.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::LoadClass;
    use crate::tech::{TechParameters, TechnologyCase};

    #[test]
    fn residential_base_power_references_player() {
        let tech = TechParameters::for_case(TechnologyCase::LoadShapes);
        let load = ResidentialLoad {
            name: "tpn1".into(),
            parent: None,
            phases: "AS".into(),
            load: 5000.0,
            houses: 2,
            large_vs_small: 0.5,
            class: LoadClass::residential(1).unwrap(),
            care: None,
            usage_bin: None,
        };
        let mut tree = ObjectTree::new();
        residential_loadshapes(&mut tree, &[load], 0.5, &tech.loadshape_residential_zip);
        let shape = tree.by_name("tpn1_loadshape").unwrap();
        assert_eq!(shape.parent(), Some("tpn1"));
        assert_eq!(shape.get("base_power_12"), Some("norm_feeder_loadshape.value*2500.000000"));
        assert_eq!(shape.get("power_fraction_12"), Some("1.000000"));
    }

    #[test]
    fn commercial_skips_absent_phases() {
        let tech = TechParameters::for_case(TechnologyCase::LoadShapes);
        let load = CommercialLoad {
            name: "ld7".into(),
            parent: None,
            phases: "ACN".into(),
            nominal_voltage: 7200.0,
            load: [1000.0, 0.0, 2000.0],
            counts: [1, 0, 1],
            class: None,
            building_type: None,
        };
        let mut tree = ObjectTree::new();
        commercial_loadshapes(&mut tree, &[load], 1.0, &tech.loadshape_commercial_zip);
        let shape = tree.by_name("ld7_loadshape").unwrap();
        assert!(shape.contains("base_power_A"));
        assert!(!shape.contains("base_power_B"));
        assert_eq!(shape.get("base_power_C"), Some("norm_feeder_loadshape.value*2000.000000"));
        assert_eq!(loadshape_player("shape.player").get("loop"), Some("14600"));
    }
}
