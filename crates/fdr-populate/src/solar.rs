//! Weighted PV allocation and emission.
//!
//! Residential meters are binned by CARE enrolment and usage sextile;
//! commercial meters by building type. A uniform draw into a fixed range
//! selects a bin through contiguous weighted sub-ranges, then a meter is
//! taken from that bin without replacement. Allocation stops once the
//! target capacity is placed. If eligible meters run out first, the
//! shortfall is spread proportionally over the units already placed.

use std::collections::BTreeMap;

use fdr_core::{Diagnostics, ObjectTree, Record};
use rand::Rng;

use crate::commercial::CommercialSite;
use crate::residential::HomeSite;
use crate::sampling::{normal, randint, take_random, uniform};
use crate::tech::TechParameters;

/// Capacity tolerance of the residential loop in kW.
const RESIDENTIAL_TOLERANCE: f64 = 0.1;
/// Capacity tolerance of the commercial loop in kW.
const COMMERCIAL_TOLERANCE: f64 = 0.2;
/// Draws without a placement before the allocator gives up.
const MAX_IDLE_DRAWS: usize = 1_000_000;

/// Residential bin: CARE flag and usage sextile.
type HomeBin = (bool, u8);

/// Upper end (exclusive) of each residential draw sub-range and its bin.
const RESIDENTIAL_RANGES: [(u32, HomeBin); 9] = [
    (46, (true, 2)),
    (92, (true, 3)),
    (162, (true, 4)),
    (231, (true, 5)),
    (520, (true, 6)),
    (956, (false, 3)),
    (1634, (false, 4)),
    (2081, (false, 5)),
    (u32::MAX, (false, 6)),
];

/// Residential PV size in kW per bin.
fn residential_size(bin: HomeBin) -> f64 {
    match bin {
        (true, 2) | (true, 3) | (false, 3) => 2.0,
        (true, 4) | (true, 5) | (false, 4) | (false, 5) => 3.0,
        (_, 6) => 6.0,
        _ => 1.0,
    }
}

/// Commercial building types: (type, PV size kW, upper end of the draw
/// sub-range out of 100000).
const COMMERCIAL_TYPES: [(u32, f64, u32); 28] = [
    (1, 194.0, 2860),
    (2, 91.0, 5683),
    (3, 149.0, 15154),
    (4, 363.0, 19443),
    (6, 232.0, 20658),
    (7, 118.0, 21015),
    (8, 47.0, 21122),
    (9, 18.0, 21372),
    (10, 318.0, 21944),
    (11, 45.0, 22659),
    (12, 28.0, 26447),
    (13, 101.0, 27090),
    (14, 8.0, 27161),
    (15, 23.0, 27340),
    (17, 141.0, 31200),
    (18, 255.0, 31736),
    (19, 131.0, 38705),
    (20, 111.0, 42493),
    (21, 30.0, 84595),
    (23, 16.0, 85667),
    (25, 68.0, 85774),
    (26, 19.0, 86239),
    (27, 331.0, 89241),
    (28, 205.0, 93994),
    (29, 39.0, 95459),
    (31, 267.0, 95495),
    (32, 185.0, 99820),
    (33, 607.0, 100_000),
];

fn commercial_size(building_type: u32) -> Option<f64> {
    COMMERCIAL_TYPES
        .iter()
        .find(|(t, _, _)| *t == building_type)
        .map(|(_, size, _)| *size)
}

/// Derate factor of a panel from its tilt and azimuth in degrees.
pub fn derate(tilt: u32, azimuth: f64) -> f64 {
    let row: [f64; 5] = match tilt {
        0 => return 0.89,
        1..=15 => [0.88, 0.95, 0.97, 0.97, 0.97],
        16..=30 => [0.84, 0.96, 1.0, 0.96, 0.84],
        31..=45 => [0.78, 0.93, 0.97, 0.93, 0.78],
        46..=60 => [0.70, 0.85, 0.89, 0.85, 0.70],
        _ => [0.52, 0.60, 0.58, 0.60, 0.52],
    };
    let column = if azimuth <= 112.5 {
        0
    } else if azimuth <= 157.5 {
        1
    } else if azimuth <= 202.5 {
        2
    } else if azimuth <= 247.5 {
        3
    } else {
        4
    };
    row[column]
}

/// One placed PV system.
#[derive(Debug, Clone, PartialEq)]
pub struct SolarUnit {
    pub meter: String,
    pub phases: String,
    pub nominal_voltage: f64,
    pub size_kw: f64,
    pub tilt: u32,
    pub azimuth: f64,
}

/// Scale `units` so their sizes add up to `target`.
fn redistribute(units: &mut [SolarUnit], target: f64) {
    let installed: f64 = units.iter().map(|u| u.size_kw).sum();
    if installed <= 0.0 || installed >= target {
        return;
    }
    let factor = target / installed;
    for unit in units.iter_mut() {
        unit.size_kw *= factor;
    }
    tracing::info!(installed, target, "eligible meters exhausted; spread the shortfall over placed units");
}

/// Usage sextile of every home: its own tag, else its floor-area rank.
fn usage_bins(homes: &[HomeSite]) -> Vec<u8> {
    let mut order: Vec<usize> = (0..homes.len()).collect();
    order.sort_by(|a, b| homes[*a].floor_area.total_cmp(&homes[*b].floor_area));
    let mut bins = vec![1u8; homes.len()];
    for (rank, index) in order.into_iter().enumerate() {
        bins[index] = homes[index]
            .usage_bin
            .unwrap_or_else(|| (rank * 6 / homes.len()) as u8 + 1);
    }
    bins
}

fn draw_azimuth(rng: &mut impl Rng, std: f64) -> f64 {
    loop {
        let azimuth = normal(rng, 180.0, std).round();
        if azimuth > 0.0 && azimuth < 360.0 {
            return azimuth;
        }
    }
}

/// Place residential PV until `target_kw` is reached.
pub fn allocate_residential(
    homes: &[HomeSite],
    target_kw: f64,
    rng: &mut impl Rng,
    diagnostics: &mut Diagnostics,
) -> Vec<SolarUnit> {
    let mut units = Vec::new();
    if target_kw <= 0.0 {
        return units;
    }
    let mut bins: BTreeMap<HomeBin, Vec<usize>> = BTreeMap::new();
    for (index, bin) in usage_bins(homes).into_iter().enumerate() {
        bins.entry((homes[index].care, bin)).or_default().push(index);
    }
    let drawable = |bins: &BTreeMap<HomeBin, Vec<usize>>| {
        RESIDENTIAL_RANGES
            .iter()
            .any(|(_, bin)| bins.get(bin).is_some_and(|m| !m.is_empty()))
    };

    let mut installed = 0.0;
    let mut idle = 0;
    while target_kw - installed > RESIDENTIAL_TOLERANCE && drawable(&bins) && idle < MAX_IDLE_DRAWS {
        let std = if installed / target_kw < 0.5 { 30.0 } else { 60.0 };
        let azimuth = draw_azimuth(rng, std);
        let tilt = randint(rng, 1, 39) as u32;
        let false_six = bins.get(&(false, 6)).is_some_and(|m| !m.is_empty());
        let limit = if false_six { 10_000 } else { 2082 };
        let selection: u32 = rng.gen_range(0..limit);
        let Some(&(_, bin)) = RESIDENTIAL_RANGES.iter().find(|(upper, _)| selection < *upper) else {
            continue;
        };
        let Some(index) = bins.get_mut(&bin).and_then(|meters| take_random(rng, meters)) else {
            idle += 1;
            continue;
        };
        idle = 0;
        let size = residential_size(bin);
        let home = &homes[index];
        units.push(SolarUnit {
            meter: home.meter.clone(),
            phases: home.phases.clone(),
            nominal_voltage: 120.0,
            size_kw: size,
            tilt,
            azimuth,
        });
        installed += size;
    }
    if target_kw - installed > RESIDENTIAL_TOLERANCE {
        if units.is_empty() {
            diagnostics.add_warning("solar", "no eligible residential meters for PV");
        }
        redistribute(&mut units, target_kw);
    }
    units
}

/// Place commercial PV until `target_kw` is reached.
pub fn allocate_commercial(
    sites: &[CommercialSite],
    target_kw: f64,
    rng: &mut impl Rng,
    diagnostics: &mut Diagnostics,
) -> Vec<SolarUnit> {
    let mut units = Vec::new();
    if target_kw <= 0.0 {
        return units;
    }
    let mut by_type: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (index, site) in sites.iter().enumerate() {
        if commercial_size(site.building_type).is_some() {
            by_type.entry(site.building_type).or_default().push(index);
        } else {
            diagnostics.add_warning_with_entity("solar", "unknown building type; meter skipped for PV", &site.meter);
        }
    }
    let unit_for = |index: usize, size_kw: f64| SolarUnit {
        meter: sites[index].meter.clone(),
        phases: sites[index].phases.clone(),
        nominal_voltage: sites[index].nominal_voltage,
        size_kw,
        tilt: 0,
        azimuth: 0.0,
    };

    let mut installed = 0.0;
    let mut idle = 0;
    while installed < target_kw - COMMERCIAL_TOLERANCE && idle < MAX_IDLE_DRAWS {
        by_type.retain(|_, meters| !meters.is_empty());
        if by_type.is_empty() {
            break;
        }
        let available = target_kw - installed;
        let min_size = by_type
            .keys()
            .filter_map(|t| commercial_size(*t))
            .fold(f64::INFINITY, f64::min);
        if available < min_size {
            let types: Vec<u32> = by_type.keys().copied().collect();
            let chosen = types[rng.gen_range(0..types.len())];
            let meters = &by_type[&chosen];
            let index = meters[rng.gen_range(0..meters.len())];
            units.push(unit_for(index, available));
            installed += available;
            break;
        }
        let selection = randint(rng, 0, 99_999) as u32;
        let Some(&(building_type, size, _)) = COMMERCIAL_TYPES.iter().find(|(_, _, upper)| selection < *upper) else {
            continue;
        };
        let Some(index) = by_type.get_mut(&building_type).and_then(|meters| take_random(rng, meters)) else {
            idle += 1;
            continue;
        };
        idle = 0;
        let added = size.min(available);
        units.push(unit_for(index, added));
        installed += added;
    }
    if installed < target_kw - COMMERCIAL_TOLERANCE {
        if units.is_empty() {
            diagnostics.add_warning("solar", "no eligible commercial meters for PV");
        }
        redistribute(&mut units, target_kw);
    }
    units
}

fn volt_var_inverter(name: &str, parent: &str, phases: &str, size_kw: f64, v_base: f64) -> Record {
    Record::object("inverter")
        .with("name", name)
        .with("parent", parent)
        .with("phases", phases)
        .with("generator_status", "ONLINE")
        .with("inverter_type", "FOUR_QUADRANT")
        .with("generator_mode", "SUPPLY_DRIVEN")
        .with("four_quadrant_control_mode", "VOLT_VAR")
        .with("inverter_efficiency", "0.95")
        .with("rated_power", format!("{size_kw:.3} kVA"))
        .with("V_base", format!("{v_base:.0}"))
        .with("V1", "0.88")
        .with("Q1", "1")
        .with("V2", "0.99")
        .with("Q2", "0")
        .with("V3", "1.01")
        .with("Q3", "0")
        .with("V4", "1.1")
        .with("Q4", "-1")
}

fn flat_plate(name: &str, parent: &str, phases: &str, rated_kw: f64, unit: &SolarUnit, tech: &TechParameters) -> Record {
    let area = rated_kw * 1000.0 / (tech.rated_insolation * tech.solar_efficiency);
    Record::object("solar")
        .with("name", name)
        .with("parent", parent)
        .with("phases", phases)
        .with("generator_status", "ONLINE")
        .with("generator_mode", "SUPPLY_DRIVEN")
        .with("SOLAR_POWER_MODEL", "FLATPLATE")
        .with("panel_type", "SINGLE_CRYSTAL_SILICON")
        .with("efficiency", format!("{:.2}", tech.solar_efficiency))
        .with("rated_power", format!("{rated_kw:.3} kW"))
        .with("area", format!("{area:.1}"))
        .with("tilt_angle", format!("{}", unit.tilt))
        .with("orientation_azimuth", format!("{:.0}", unit.azimuth))
        .with("orientation", "FIXED_AXIS")
}

/// Emit meter, inverter and panel for every residential unit.
pub fn emit_residential(tree: &mut ObjectTree, units: &[SolarUnit], tech: &TechParameters, rng: &mut impl Rng) {
    for (count, unit) in units.iter().enumerate() {
        let meter = format!("triplex_{}_{count}", unit.meter);
        tree.push(
            Record::object("triplex_meter")
                .with("name", meter.clone())
                .with("parent", unit.meter.clone())
                .with("groupid", "solar_groupid")
                .with("bustype", "PV")
                .with("phases", unit.phases.clone())
                .with("nominal_voltage", "120"),
        );
        let inverter = format!("inv_{meter}");
        tree.push(volt_var_inverter(&inverter, &meter, &unit.phases, unit.size_kw, 240.0));
        let rated = unit.size_kw * uniform(rng, 1.10, 1.25) / derate(unit.tilt, unit.azimuth);
        tree.push(flat_plate(&format!("solar_{meter}"), &inverter, &unit.phases, rated, unit, tech));
    }
}

/// Emit meter, inverter and panel for every commercial unit.
pub fn emit_commercial(tree: &mut ObjectTree, units: &[SolarUnit], tech: &TechParameters) {
    for unit in units {
        let meter = format!("com_{}", unit.meter);
        let split_phase = unit.phases.contains('S');
        let (kind, v_base) = if split_phase { ("triplex_meter", 240.0) } else { ("meter", unit.nominal_voltage) };
        tree.push(
            Record::object(kind)
                .with("name", meter.clone())
                .with("groupid", "com_solar_groupid")
                .with("parent", unit.meter.clone())
                .with("phases", unit.phases.clone())
                .with("nominal_voltage", format!("{:.2}", unit.nominal_voltage)),
        );
        let inverter = format!("inv_{meter}");
        tree.push(volt_var_inverter(&inverter, &meter, &unit.phases, unit.size_kw, v_base));
        tree.push(flat_plate(&format!("solar_{meter}"), &inverter, &unit.phases, unit.size_kw, unit, tech));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tech::TechnologyCase;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn homes(n: usize, care: bool) -> Vec<HomeSite> {
        (0..n)
            .map(|i| HomeSite {
                meter: format!("tpm{i}_x"),
                house: format!("house{i}_x"),
                phases: "AS".into(),
                floor_area: 1000.0 + i as f64,
                care,
                usage_bin: None,
            })
            .collect()
    }

    fn sites(n: usize, building_type: u32) -> Vec<CommercialSite> {
        (0..n)
            .map(|i| CommercialSite {
                meter: format!("m{i}"),
                phases: "ABCN".into(),
                nominal_voltage: 7200.0,
                building_type,
            })
            .collect()
    }

    #[test]
    fn derate_table_lookups() {
        assert_eq!(derate(0, 180.0), 0.89);
        assert_eq!(derate(20, 180.0), 1.0);
        assert_eq!(derate(20, 90.0), 0.84);
        assert_eq!(derate(40, 300.0), 0.78);
        assert_eq!(derate(10, 140.0), 0.95);
    }

    #[test]
    fn residential_allocation_meets_target_without_reuse() {
        let homes = homes(600, false);
        let mut rng = StdRng::seed_from_u64(1);
        let units = allocate_residential(&homes, 100.0, &mut rng, &mut Diagnostics::new());
        let total: f64 = units.iter().map(|u| u.size_kw).sum();
        assert!((total - 100.0).abs() <= 6.0, "installed {total}");
        let mut meters: Vec<_> = units.iter().map(|u| u.meter.clone()).collect();
        meters.sort();
        meters.dedup();
        assert_eq!(meters.len(), units.len());
        for u in &units {
            assert!((1..=39).contains(&u.tilt));
            assert!(u.azimuth > 0.0 && u.azimuth < 360.0);
        }
    }

    #[test]
    fn residential_shortfall_is_redistributed() {
        let homes = homes(12, false);
        let mut rng = StdRng::seed_from_u64(1);
        let units = allocate_residential(&homes, 500.0, &mut rng, &mut Diagnostics::new());
        assert!(!units.is_empty());
        let total: f64 = units.iter().map(|u| u.size_kw).sum();
        assert!((total - 500.0).abs() < 1e-6, "installed {total}");
    }

    #[test]
    fn no_homes_warns() {
        let mut diag = Diagnostics::new();
        let units = allocate_residential(&[], 10.0, &mut StdRng::seed_from_u64(1), &mut diag);
        assert!(units.is_empty());
        assert_eq!(diag.warning_count(), 1);
    }

    #[test]
    fn commercial_allocation_fills_with_remainder() {
        let sites = sites(40, 21);
        let mut rng = StdRng::seed_from_u64(1);
        let units = allocate_commercial(&sites, 95.0, &mut rng, &mut Diagnostics::new());
        let total: f64 = units.iter().map(|u| u.size_kw).sum();
        assert!((total - 95.0).abs() < 1e-6, "installed {total}");
        assert!(units.iter().all(|u| u.size_kw <= 30.0 + 1e-9));
    }

    #[test]
    fn emission_builds_meter_inverter_panel_chain() {
        let tech = TechParameters::for_case(TechnologyCase::SolarCombined);
        let mut tree = ObjectTree::new();
        let unit = SolarUnit {
            meter: "tpm0_x".into(),
            phases: "AS".into(),
            nominal_voltage: 120.0,
            size_kw: 6.0,
            tilt: 20,
            azimuth: 180.0,
        };
        emit_residential(&mut tree, &[unit.clone()], &tech, &mut StdRng::seed_from_u64(1));
        let inverter = tree.by_name("inv_triplex_tpm0_x_0").unwrap();
        assert_eq!(inverter.parent(), Some("triplex_tpm0_x_0"));
        assert_eq!(inverter.get("four_quadrant_control_mode"), Some("VOLT_VAR"));
        let panel = tree.by_name("solar_triplex_tpm0_x_0").unwrap();
        let rated: f64 = panel.get("rated_power").unwrap().trim_end_matches(" kW").parse().unwrap();
        assert!((6.6..=7.5).contains(&rated), "rated {rated}");

        let mut tree = ObjectTree::new();
        let unit = SolarUnit { meter: "m0".into(), phases: "ABCN".into(), nominal_voltage: 7200.0, tilt: 0, azimuth: 0.0, ..unit };
        emit_commercial(&mut tree, &[unit], &tech);
        assert!(tree.by_name("com_m0").unwrap().is_object("meter"));
        assert_eq!(tree.by_name("inv_com_m0").unwrap().get("V_base"), Some("7200"));
        assert_eq!(tree.by_name("solar_com_m0").unwrap().get("rated_power"), Some("6.000 kW"));
    }
}
