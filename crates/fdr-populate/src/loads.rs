//! Spot loads found in the base feeder.
//!
//! Residential loads are `triplex_node`s carrying `power_1`/`power_12`;
//! commercial loads are `load` objects. Collecting them also rewrites the
//! base records: the load attributes move into [`ResidentialLoad`] /
//! [`CommercialLoad`] and commercial `load`s become plain `node`s.

use anyhow::{Context, Result};
use fdr_core::{Diagnostics, FdrError, ObjectTree, RecordKind};
use rand::Rng;

use crate::config::{FeederConfig, Knob};
use crate::region::LoadClass;
use crate::sampling::randint;
use crate::tech::TechParameters;
use crate::units::{magnitude, parse_number, standard_rating};

const PHASES: [char; 3] = ['A', 'B', 'C'];

/// A residential spot load and the houses it will be split into.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidentialLoad {
    pub name: String,
    pub parent: Option<String>,
    pub phases: String,
    /// Total |S| in VA
    pub load: f64,
    pub houses: usize,
    /// `load/avg_house - houses`; negative when the count was rounded up
    pub large_vs_small: f64,
    pub class: LoadClass,
    /// CARE program enrolment, when the source tagged the load
    pub care: Option<bool>,
    /// Energy usage sextile 1..=6, when the source tagged the load
    pub usage_bin: Option<u8>,
}

impl ResidentialLoad {
    /// Stem used in generated object names.
    pub fn site_name(&self) -> String {
        match &self.parent {
            Some(parent) => format!("{parent}_{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Object the generated meters hang from.
    pub fn site_parent(&self) -> &str {
        self.parent.as_deref().unwrap_or(&self.name)
    }
}

/// A commercial spot load with per-phase VA and building counts.
#[derive(Debug, Clone, PartialEq)]
pub struct CommercialLoad {
    pub name: String,
    pub parent: Option<String>,
    pub phases: String,
    pub nominal_voltage: f64,
    /// Per-phase |S| in VA, `[A, B, C]`
    pub load: [f64; 3],
    /// Per-phase building counts
    pub counts: [usize; 3],
    /// `None` when the load is too small for any building
    pub class: Option<LoadClass>,
    /// Building type code used by commercial PV allocation
    pub building_type: Option<u32>,
}

impl CommercialLoad {
    pub fn site_name(&self) -> String {
        match &self.parent {
            Some(parent) => format!("{parent}_{}", self.name),
            None => self.name.clone(),
        }
    }

    pub fn site_parent(&self) -> &str {
        self.parent.as_deref().unwrap_or(&self.name)
    }

    pub fn total_count(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn total_load(&self) -> f64 {
        self.load.iter().sum()
    }

    /// Present phases in `ABC` order, e.g. `"AC"`.
    pub fn phase_letters(&self) -> String {
        PHASES.iter().filter(|p| self.phases.contains(**p)).collect()
    }
}

/// Read a `load_class` label: `ResidentialN`, `CommercialN` or a class
/// index. Other labels (`R`, `C`, `residential`) leave the class to be
/// inferred.
pub fn parse_class_label(label: &str) -> Result<Option<LoadClass>> {
    let label = label.trim().trim_matches('"');
    if let Some(n) = label.strip_prefix("Residential").and_then(|n| n.parse().ok()) {
        return LoadClass::residential(n).map(Some);
    }
    if let Some(n) = label.strip_prefix("Commercial").and_then(|n| n.parse().ok()) {
        return LoadClass::commercial(n).map(Some);
    }
    if !label.is_empty() && label.bytes().all(|b| b.is_ascii_digit()) {
        let index = label.parse().map_err(|_| FdrError::Config(format!("bad load class '{label}'")))?;
        return LoadClass::new(index).map(Some);
    }
    Ok(None)
}

/// Residential class drawn from the service transformer rating.
pub fn infer_residential_class(rating: Option<f64>, rng: &mut impl Rng) -> usize {
    let draw = rng.gen::<f64>() * 100.0;
    let table: &[(f64, usize)] = match rating {
        Some(r) if r == 10.0 => &[(6.0, 5), (24.0, 0), (f64::INFINITY, 1)],
        Some(r) if r == 15.0 => &[(14.0, 1), (57.0, 0), (f64::INFINITY, 5)],
        Some(r) if r == 25.0 => &[(1.5, 2), (3.7, 3), (16.6, 5), (38.7, 0), (f64::INFINITY, 1)],
        Some(r) if r == 37.5 => &[(f64::INFINITY, 2)],
        Some(r) if r == 50.0 => &[(3.1, 2), (16.7, 5), (30.6, 0), (51.6, 3), (f64::INFINITY, 1)],
        Some(r) if r == 75.0 => &[(7.9, 1), (15.8, 2), (26.2, 0), (56.7, 5), (f64::INFINITY, 3)],
        Some(r) if r == 100.0 => &[(4.0, 1), (12.0, 0), (38.0, 3), (68.0, 2), (f64::INFINITY, 5)],
        Some(r) if r == 167.0 => &[(1.0, 1), (2.0, 2), (4.0, 0), (13.0, 3), (f64::INFINITY, 5)],
        _ => return randint(rng, 0, 5) as usize,
    };
    table
        .iter()
        .find(|(upper, _)| draw <= *upper)
        .map(|(_, class)| *class)
        .unwrap_or(0)
}

fn parse_care(value: &str) -> Option<bool> {
    match value.trim().trim_matches('"').to_ascii_uppercase().as_str() {
        "TRUE" | "1" | "YES" => Some(true),
        "FALSE" | "0" | "NO" => Some(false),
        _ => None,
    }
}

/// Collect residential loads and strip their load attributes.
pub fn collect_residential(
    tree: &mut ObjectTree,
    config: &FeederConfig,
    rng: &mut impl Rng,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<ResidentialLoad>> {
    let avg_house = config.knob(Knob::AvgHouse);
    let mut loads = Vec::new();
    for key in tree.keys_of_kind("triplex_node") {
        let Some(record) = tree.get_mut(key) else { continue };
        if !record.contains("power_1") && !record.contains("power_12") {
            continue;
        }
        let name = record
            .name()
            .map(str::to_string)
            .ok_or_else(|| FdrError::Validation(format!("triplex_node at key {key} has no name")))?;
        let phases = record
            .get("phases")
            .map(str::to_string)
            .ok_or_else(|| FdrError::MissingReference(format!("phases of triplex_node '{name}'")))?;

        let mut load = 0.0;
        for attr in ["power_1", "power_12"] {
            if let Some(value) = record.remove(attr) {
                match magnitude(&value) {
                    Some(va) => load += va,
                    None => diagnostics.add_warning_with_entity(
                        "populate",
                        &format!("unparseable {attr} '{value}' read as zero"),
                        &name,
                    ),
                }
            }
        }
        let label = record.remove("load_class");
        let care = record.remove("care").as_deref().and_then(parse_care);
        let usage_bin = record
            .remove("usage_bin")
            .and_then(|b| b.trim().parse::<u8>().ok())
            .filter(|b| (1..=6).contains(b));

        let mut houses = (load / avg_house).round() as usize;
        if houses == 0 && load > 0.0 {
            houses = 1;
        }
        let large_vs_small = load / avg_house - houses as f64;

        let class = match label.as_deref().map(parse_class_label).transpose()?.flatten() {
            Some(class) if class.is_residential() => class,
            Some(class) => {
                diagnostics.add_warning_with_entity(
                    "populate",
                    &format!("{} on a residential load; inferring a residential class", class.label()),
                    &name,
                );
                LoadClass::new(infer_residential_class(standard_rating(load / 1000.0), rng))?
            }
            None => LoadClass::new(infer_residential_class(standard_rating(load / 1000.0), rng))?,
        };

        loads.push(ResidentialLoad {
            parent: record.parent().map(str::to_string),
            name,
            phases,
            load,
            houses,
            large_vs_small,
            class,
            care,
            usage_bin,
        });
    }
    tracing::debug!(count = loads.len(), "collected residential loads");
    Ok(loads)
}

/// Collect commercial loads, turning each `load` into a `node`.
pub fn collect_commercial(
    tree: &mut ObjectTree,
    config: &FeederConfig,
    tech: &TechParameters,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<CommercialLoad>> {
    let avg_commercial = config.knob(Knob::AvgCommercial);
    let mut loads = Vec::new();
    for key in tree.keys_of_kind("load") {
        let Some(record) = tree.get_mut(key) else { continue };
        let name = record
            .name()
            .map(str::to_string)
            .ok_or_else(|| FdrError::Validation(format!("load at key {key} has no name")))?;
        let phases = record
            .get("phases")
            .map(str::to_string)
            .ok_or_else(|| FdrError::MissingReference(format!("phases of load '{name}'")))?;
        let voltage_text = record
            .get("nominal_voltage")
            .ok_or_else(|| FdrError::MissingReference(format!("nominal_voltage of load '{name}'")))?;
        let nominal_voltage = parse_number(voltage_text)
            .with_context(|| format!("parsing nominal_voltage '{voltage_text}' of load '{name}'"))?;

        let mut load = [0.0; 3];
        for (slot, phase) in load.iter_mut().zip(PHASES) {
            if let Some(s) = record.remove(&format!("constant_power_{phase}")).as_deref().and_then(magnitude) {
                *slot += s;
            }
            if let Some(z) = record.remove(&format!("constant_impedance_{phase}")).as_deref().and_then(magnitude) {
                if z > 0.0 {
                    *slot += nominal_voltage.powi(2) / (3.0 * z);
                }
            }
            if let Some(i) = record.remove(&format!("constant_current_{phase}")).as_deref().and_then(magnitude) {
                *slot += nominal_voltage * i;
            }
        }
        let mut counts = [0usize; 3];
        for (count, va) in counts.iter_mut().zip(load) {
            if va >= tech.load_cutoff {
                *count = (va / avg_commercial).ceil() as usize;
            }
        }
        let total: usize = counts.iter().sum();

        let label = record.remove("load_class");
        let building_type = record.remove("building_type").and_then(|b| b.trim().parse().ok());
        let class = match label.as_deref().map(parse_class_label).transpose()?.flatten() {
            Some(class) => Some(class),
            None if total >= 15 => Some(LoadClass::commercial(3)?),
            None if total >= 6 => Some(LoadClass::commercial(2)?),
            None if total > 0 => Some(LoadClass::commercial(1)?),
            None => None,
        };
        if class.is_some_and(LoadClass::is_residential) {
            diagnostics.add_warning_with_entity(
                "populate",
                "residential class on a commercial load; no buildings generated",
                &name,
            );
        }
        record.kind = RecordKind::object("node");

        loads.push(CommercialLoad {
            parent: record.parent().map(str::to_string),
            name,
            phases,
            nominal_voltage: nominal_voltage.trunc(),
            load,
            counts,
            class,
            building_type,
        });
    }
    tracing::debug!(count = loads.len(), "collected commercial loads");
    Ok(loads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fdr_core::Record;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn class_labels() {
        assert_eq!(parse_class_label("Residential3").unwrap(), Some(LoadClass::new(2).unwrap()));
        assert_eq!(parse_class_label("Commercial1").unwrap(), Some(LoadClass::new(6).unwrap()));
        assert_eq!(parse_class_label("4").unwrap(), Some(LoadClass::new(4).unwrap()));
        assert_eq!(parse_class_label("R").unwrap(), None);
        assert!(parse_class_label("Residential9").is_err());
        assert!(parse_class_label("12").is_err());
    }

    #[test]
    fn inferred_class_follows_rating_table() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            assert_eq!(infer_residential_class(Some(37.5), &mut rng), 2);
            let c = infer_residential_class(Some(10.0), &mut rng);
            assert!([0, 1, 5].contains(&c));
            assert!(infer_residential_class(None, &mut rng) <= 5);
        }
    }

    #[test]
    fn residential_loads_are_counted_and_stripped() {
        let mut tree: ObjectTree = vec![
            Record::object("triplex_meter").with("name", "tpm1A").with("phases", "AS"),
            Record::object("triplex_node")
                .with("name", "tpn1A")
                .with("parent", "tpm1A")
                .with("phases", "AS")
                .with("power_12", "30000+4000j")
                .with("load_class", "Residential2"),
            Record::object("triplex_node").with("name", "plain").with("phases", "BS"),
        ]
        .into_iter()
        .collect();
        let mut rng = StdRng::seed_from_u64(3);
        let mut diag = Diagnostics::new();
        let loads = collect_residential(&mut tree, &FeederConfig::default(), &mut rng, &mut diag).unwrap();

        assert_eq!(loads.len(), 1);
        let l = &loads[0];
        assert_eq!(l.houses, 2);
        assert_eq!(l.class.index(), 1);
        assert_eq!(l.site_name(), "tpm1A_tpn1A");
        assert_eq!(l.site_parent(), "tpm1A");
        let node = tree.by_name("tpn1A").unwrap();
        assert!(!node.contains("power_12") && !node.contains("load_class"));
    }

    #[test]
    fn small_nonzero_load_still_gets_a_house() {
        let mut tree: ObjectTree = vec![Record::object("triplex_node")
            .with("name", "tiny")
            .with("phases", "AS")
            .with("power_1", "500")]
        .into_iter()
        .collect();
        let mut rng = StdRng::seed_from_u64(3);
        let loads =
            collect_residential(&mut tree, &FeederConfig::default(), &mut rng, &mut Diagnostics::new()).unwrap();
        assert_eq!(loads[0].houses, 1);
        assert!(loads[0].large_vs_small < 0.0);
    }

    #[test]
    fn commercial_loads_become_nodes() {
        let mut tree: ObjectTree = vec![Record::object("load")
            .with("name", "L1")
            .with("phases", "ABCN")
            .with("nominal_voltage", "7200")
            .with("constant_power_A", "100000+0j")
            .with("constant_power_B", "3000")
            .with("constant_current_C", "10")]
        .into_iter()
        .collect();
        let tech = TechParameters::for_case(crate::tech::TechnologyCase::Base);
        let loads =
            collect_commercial(&mut tree, &FeederConfig::default(), &tech, &mut Diagnostics::new()).unwrap();
        let l = &loads[0];
        assert_eq!(l.counts, [3, 0, 3]);
        assert_eq!(l.class, Some(LoadClass::commercial(2).unwrap()));
        assert_eq!(l.phase_letters(), "ABC");
        let node = tree.by_name("L1").unwrap();
        assert!(node.is_object("node"));
        assert!(!node.contains("constant_power_A"));
    }

    #[test]
    fn commercial_load_without_voltage_is_fatal() {
        let mut tree: ObjectTree = vec![Record::object("load").with("name", "L1").with("phases", "A")]
            .into_iter()
            .collect();
        let tech = TechParameters::for_case(crate::tech::TechnologyCase::Base);
        let err = collect_commercial(&mut tree, &FeederConfig::default(), &tech, &mut Diagnostics::new())
            .unwrap_err();
        assert!(err.to_string().contains("nominal_voltage"));
    }
}
