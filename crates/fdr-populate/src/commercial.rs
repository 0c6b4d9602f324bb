//! Commercial population: offices, big boxes, strip malls and street lights.
//!
//! Each building is a set of zones. A zone is a `house` with geometry
//! derived from the building footprint plus five ZIP end uses (lights,
//! plugs, gas water heater, exterior lighting, occupancy). Buildings are
//! served through their own meter and center-tapped service transformers.

use anyhow::Result;
use fdr_core::{ObjectTree, Record};
use rand::Rng;

use crate::config::FeederConfig;
use crate::loads::CommercialLoad;
use crate::region::{BuildingType, ClassProfile, LoadClass};
use crate::residential::apply_zip;
use crate::sampling::{clip_skew, standard_normal};
use crate::tech::TechParameters;

const ABC: [char; 3] = ['A', 'B', 'C'];
/// Building type code used for PV allocation when a load carries none.
pub const DEFAULT_BUILDING_TYPE: u32 = 21;

/// A commercial service point that can host PV.
#[derive(Debug, Clone, PartialEq)]
pub struct CommercialSite {
    pub meter: String,
    pub phases: String,
    pub nominal_voltage: f64,
    pub building_type: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommercialOutcome {
    pub sites: Vec<CommercialSite>,
    /// First zone of each building, eligible for thermal storage
    pub storage_candidates: Vec<String>,
    pub offices: usize,
    pub big_boxes: usize,
    pub strip_malls: usize,
    pub street_lights: usize,
    pub zones: usize,
}

/// Envelope constants of one building archetype.
struct Envelope {
    prefix: &'static str,
    ceiling_height: f64,
    airchange: f64,
    r_floor: f64,
    internal_gains: f64,
    cooling_setpoint: &'static str,
    heating_setpoint: Option<&'static str>,
}

const OFFICE: Envelope = Envelope {
    prefix: "office",
    ceiling_height: 13.0,
    airchange: 0.69,
    r_floor: 46.0,
    internal_gains: 3.24,
    cooling_setpoint: "office_cooling",
    heating_setpoint: None,
};

const BIG_BOX: Envelope = Envelope {
    prefix: "bigbox",
    ceiling_height: 14.0,
    airchange: 1.5,
    r_floor: 46.0,
    internal_gains: 3.6,
    cooling_setpoint: "bigbox_cooling",
    heating_setpoint: Some("bigbox_heating"),
};

const STRIP_MALL: Envelope = Envelope {
    prefix: "stripmall",
    ceiling_height: 12.0,
    airchange: 1.76,
    r_floor: 40.0,
    internal_gains: 3.6,
    cooling_setpoint: "stripmall_cooling",
    heating_setpoint: Some("stripmall_heating"),
};

/// Geometry and draws of one zone.
struct Zone {
    house: String,
    parent: String,
    /// Suffix shared by the zone's ZIP loads, e.g. `L1_A_0_zone1_fl1`
    appliance_suffix: String,
    skew: f64,
    floor_area: f64,
    doors: f64,
    aspect_ratio: f64,
    mass: f64,
    interior_exterior_wall_ratio: f64,
    exterior_wall_fraction: f64,
    exterior_floor_fraction: f64,
    exterior_ceiling_fraction: f64,
    window_wall_ratio: f64,
    /// Lights multiplier on top of the per-kind randomization
    lights_scale: f64,
    /// `(lo, width)` of the U(lo, lo+width) multiplier of each end use
    spreads: [(f64, f64); 5],
}

struct Builder<'a> {
    tree: &'a mut ObjectTree,
    tech: &'a TechParameters,
    over_sizing: f64,
}

impl Builder<'_> {
    fn zone(&mut self, rng: &mut impl Rng, envelope: &Envelope, zone: Zone) {
        let init_temp = 68.0 + 4.0 * rng.gen::<f64>();
        let over_sizing = self.over_sizing * (0.8 + 0.4 * rng.gen::<f64>());
        let cop = self.tech.cooling_cop * (0.8 + 0.4 * rng.gen::<f64>());
        let area = zone.floor_area;

        let mut house = Record::object("house")
            .with("name", zone.house.clone())
            .with("parent", zone.parent.clone())
            .with("groupid", "Commercial")
            .with("schedule_skew", format!("{:.0}", zone.skew))
            .with("floor_area", format!("{area:.0}"))
            .with("design_internal_gains", format!("{:.0}", envelope.internal_gains * area * 3.413))
            .with("number_of_doors", format!("{:.0}", zone.doors))
            .with("aspect_ratio", format!("{:.2}", zone.aspect_ratio))
            .with("total_thermal_mass_per_floor_area", format!("{:.2}", zone.mass))
            .with("interior_surface_heat_transfer_coeff", "0.59")
            .with("interior_exterior_wall_ratio", format!("{:.1}", zone.interior_exterior_wall_ratio))
            .with("exterior_floor_fraction", format!("{:.3}", zone.exterior_floor_fraction))
            .with("exterior_ceiling_fraction", format!("{:.3}", zone.exterior_ceiling_fraction))
            .with("Rwall", "18.3")
            .with("Rroof", "19.0")
            .with("Rfloor", format!("{:.2}", envelope.r_floor))
            .with("Rdoors", "3.0")
            .with("exterior_wall_fraction", format!("{:.2}", zone.exterior_wall_fraction))
            .with("glazing_layers", "TWO")
            .with("glass_type", "GLASS")
            .with("glazing_treatment", "LOW_S")
            .with("window_frame", "NONE")
            .with("airchange_per_hour", format!("{:.2}", envelope.airchange))
            .with("window_wall_ratio", format!("{:.3}", zone.window_wall_ratio))
            .with("heating_system_type", "GAS")
            .with("auxiliary_system_type", "NONE")
            .with("fan_type", "ONE_SPEED")
            .with("cooling_system_type", "ELECTRIC")
            .with("air_temperature", format!("{init_temp:.2}"))
            .with("mass_temperature", format!("{init_temp:.2}"))
            .with("over_sizing_factor", format!("{over_sizing:.1}"))
            .with("cooling_COP", format!("{cop:.2}"))
            .with("cooling_setpoint", envelope.cooling_setpoint);
        if let Some(heating) = envelope.heating_setpoint {
            house = house.with("heating_setpoint", heating);
        }
        self.tree.push(house);

        let uses = [
            ("lights", "Lights", "lights", true, "1.0"),
            ("plugs", "Plugs", "plugs", true, "1.0"),
            ("wh", "Gas_waterheater", "gas", false, "1.0"),
            ("ext", "Exterior_lighting", "exterior", true, "0.0"),
            ("occ", "Occupancy", "occupancy", false, "1.0"),
        ];
        for ((kind, groupid, schedule, electric, heatgain), (lo, width)) in uses.into_iter().zip(zone.spreads) {
            let mut adj = (lo + width * rng.gen::<f64>()) * area / 1000.0;
            if kind == "lights" {
                adj *= zone.lights_scale;
            }
            let mut zipload = Record::object("ZIPload")
                .with("name", format!("{kind}_{}", zone.appliance_suffix))
                .with("parent", zone.house.clone())
                .with("groupid", groupid)
                .with("schedule_skew", format!("{:.0}", zone.skew))
                .with("heatgain_fraction", heatgain);
            zipload = if electric {
                apply_zip(zipload, &self.tech.commercial_zip, pf2)
            } else {
                zipload
                    .with("power_fraction", "0.0")
                    .with("impedance_fraction", "0.0")
                    .with("current_fraction", "0.0")
                    .with("power_pf", "1.0")
            };
            self.tree
                .push(zipload.with("base_power", format!("{}_{schedule}*{adj:.2}", envelope.prefix)));
        }
    }

    /// Line from the load's parent to a new building service point.
    fn service_line(&mut self, from: &str, to: &str, phases: &str, letters: &str) {
        self.tree.push(
            Record::object("overhead_line")
                .with("from", from)
                .with("to", to)
                .with("phases", phases)
                .with("length", "50ft")
                .with("configuration", format!("line_configuration_comm{letters}")),
        );
    }

    fn building_meter(&mut self, name: &str, phases: &str, nominal_voltage: f64) {
        self.tree.push(
            Record::object("meter")
                .with("name", name)
                .with("phases", phases)
                .with("groupid", "Commercial_Meter")
                .with("meter_power_consumption", self.tech.commercial_meter_consumption)
                .with("nominal_voltage", format!("{nominal_voltage:.6}")),
        );
    }

    fn service_configurations(
        &mut self,
        site: &str,
        letters: &str,
        nominal_voltage: f64,
        shunt: &str,
        rating: &str,
    ) {
        for phase in letters.chars() {
            self.tree.push(
                Record::object("transformer_configuration")
                    .with("name", format!("CTTF_config_{phase}_{site}"))
                    .with("connect_type", "SINGLE_PHASE_CENTER_TAPPED")
                    .with("install_type", "POLETOP")
                    .with("impedance", "0.00033+0.0022j")
                    .with("shunt_impedance", shunt)
                    .with("primary_voltage", format!("{nominal_voltage:.3}"))
                    .with("secondary_voltage", "120.000")
                    .with(format!("power{phase}_rating"), rating),
            );
        }
    }

    fn service_transformer(&mut self, site: &str, phase: char, index: usize, from: &str, to: &str) {
        self.tree.push(
            Record::object("transformer")
                .with("name", format!("{site}_CTTF_{phase}_{index}"))
                .with("phases", format!("{phase}S"))
                .with("from", from)
                .with("to", to)
                .with("groupid", "Distribution_Trans")
                .with("configuration", format!("CTTF_config_{phase}_{site}")),
        );
    }
}

fn pf2(value: f64) -> String {
    format!("{value:.2}")
}

fn building_skew(rng: &mut impl Rng, tech: &TechParameters) -> f64 {
    let draw = (2.0 * standard_normal(rng)).round();
    clip_skew(tech.commercial_skew_std * draw, tech.commercial_skew_max)
}

/// Emit the line conductors and configurations every commercial service
/// line refers to.
pub fn add_line_configurations(tree: &mut ObjectTree) {
    for conductor in ["comm_line_cfg_cnd1", "comm_line_cfg_cnd2", "comm_line_cfg_cndN"] {
        tree.push(
            Record::object("triplex_line_conductor")
                .with("name", conductor)
                .with("resistance", "0.48")
                .with("geometric_mean_radius", "0.0158"),
        );
    }
    tree.push(
        Record::object("triplex_line_configuration")
            .with("name", "commercial_line_config")
            .with("conductor_1", "comm_line_cfg_cnd1")
            .with("conductor_2", "comm_line_cfg_cnd2")
            .with("conductor_N", "comm_line_cfg_cndN")
            .with("insulation_thickness", "0.08")
            .with("diameter", "0.522"),
    );
    tree.push(
        Record::object("line_spacing")
            .with("name", "line_spacing_commABC")
            .with("distance_AB", "53.19999999996 in")
            .with("distance_BC", "53.19999999996 in")
            .with("distance_AC", "53.19999999996 in")
            .with("distance_AN", "69.80000000004 in")
            .with("distance_BN", "69.80000000004 in")
            .with("distance_CN", "69.80000000004 in"),
    );
    tree.push(
        Record::object("overhead_line_conductor")
            .with("name", "overhead_line_conductor_comm")
            .with("rating.summer.continuous", "443.0")
            .with("geometric_mean_radius", "0.02270 ft")
            .with("resistance", "0.05230"),
    );
    for letters in ["ABC", "AB", "AC", "BC", "A", "B", "C"] {
        let mut config =
            Record::object("line_configuration").with("name", format!("line_configuration_comm{letters}"));
        for phase in letters.chars() {
            config = config.with(format!("conductor_{phase}"), "overhead_line_conductor_comm");
        }
        tree.push(
            config
                .with("conductor_N", "overhead_line_conductor_comm")
                .with("spacing", "line_spacing_commABC"),
        );
    }
}

/// Populate every commercial load into `tree`.
pub fn populate_commercial(
    tree: &mut ObjectTree,
    loads: &[CommercialLoad],
    config: &FeederConfig,
    tech: &TechParameters,
    rng: &mut impl Rng,
) -> Result<CommercialOutcome> {
    let mut outcome = CommercialOutcome::default();
    if loads.is_empty() {
        return Ok(outcome);
    }
    add_line_configurations(tree);

    for load in loads {
        let total = load.total_count();
        let building = load.class.and_then(LoadClass::building);
        let mut builder = Builder { tree: &mut *tree, tech, over_sizing: 0.0 };
        if let Some(class) = load.class.filter(|_| building.is_some()) {
            builder.over_sizing = ClassProfile::new(config, class)?.over_sizing_factor[0];
        }
        match building {
            Some(BuildingType::Office) => office(&mut builder, rng, load, &mut outcome),
            Some(BuildingType::BigBox) => big_box(&mut builder, rng, load, &mut outcome),
            Some(BuildingType::StripMall) if total > 0 => strip_mall(&mut builder, rng, load, &mut outcome),
            _ if !load.class.is_some_and(LoadClass::is_residential) && total == 0 && load.total_load() > 0.0 => {
                street_light(builder.tree, load, tech);
                outcome.street_lights += 1;
            }
            _ => {}
        }
    }
    tracing::info!(
        offices = outcome.offices,
        big_boxes = outcome.big_boxes,
        strip_malls = outcome.strip_malls,
        street_lights = outcome.street_lights,
        zones = outcome.zones,
        "populated commercial loads"
    );
    Ok(outcome)
}

fn site_for(load: &CommercialLoad, meter: String) -> CommercialSite {
    CommercialSite {
        meter,
        phases: load.phases.clone(),
        nominal_voltage: load.nominal_voltage,
        building_type: load.building_type.unwrap_or(DEFAULT_BUILDING_TYPE),
    }
}

fn office(builder: &mut Builder<'_>, rng: &mut impl Rng, load: &CommercialLoad, outcome: &mut CommercialOutcome) {
    let site = load.site_name();
    let letters = load.phase_letters();
    let buildings = ((load.total_count() as f64 / 15.0).round() as usize).max(1);
    builder.service_configurations(&site, "ABC", load.nominal_voltage, "10000+10000j", "50 kVA");

    for jjj in 0..buildings {
        let footprint = 40_000.0 * (0.5 * rng.gen::<f64>() + 0.5);
        let meter = format!("{site}_office_meter{jjj}");
        builder.service_line(load.site_parent(), &meter, &load.phases, &letters);
        builder.building_meter(&meter, &load.phases, load.nominal_voltage);
        outcome.sites.push(site_for(load, meter.clone()));
        for phase in letters.chars() {
            let tm = format!("{site}_tm_{phase}_{jjj}");
            builder.service_transformer(&site, phase, jjj, &meter, &tm);
            builder.tree.push(
                Record::object("triplex_meter")
                    .with("name", tm)
                    .with("phases", format!("{phase}S"))
                    .with("nominal_voltage", "120"),
            );
        }

        // Fifteen zones spread over the present phases.
        let present: Vec<usize> = (0..3).filter(|i| letters.contains(ABC[*i])).collect();
        let mut zones_per_phase = [0usize; 3];
        match present.as_slice() {
            [a, b] => {
                let first = (7.0 + rng.gen::<f64>()).round() as usize;
                zones_per_phase[*a] = first;
                zones_per_phase[*b] = 15 - first;
            }
            [a] => zones_per_phase[*a] = 15,
            _ => zones_per_phase = [5, 5, 5],
        }

        let depth = (footprint / 4.5).sqrt();
        let width = 1.5 * depth;
        let mut first_zone = true;
        for floor in 1..=3 {
            let skew = building_skew(rng, builder.tech);
            for zone_index in 1..=5 {
                let Some(phase_index) = (0..3).find(|i| zones_per_phase[*i] > 0) else { break };
                zones_per_phase[phase_index] -= 1;
                let phase = ABC[phase_index];

                let (w, d, exterior_wall) = match zone_index {
                    5 => (depth - 30.0, width - 30.0, 0.0),
                    1 | 3 => {
                        let w = width - 15.0;
                        (w, 15.0, w / (2.0 * (w + 15.0)))
                    }
                    _ => {
                        let w = depth - 15.0;
                        (w, 15.0, w / (2.0 * (w + 15.0)))
                    }
                };
                let area = w * d;
                let window_wall = 0.33;
                let exterior_floor = if floor > 1 {
                    0.0
                } else {
                    w / (2.0 * (w + d)) / (area / (footprint / 3.0))
                };
                let mass = 3.9 * (0.5 + rng.gen::<f64>());
                let house = format!("office{site}_{phase}{jjj}_zone{zone_index}_fl{floor}");
                if first_zone {
                    outcome.storage_candidates.push(house.clone());
                    first_zone = false;
                }
                let zone = Zone {
                    house,
                    parent: format!("{site}_tm_{phase}_{jjj}"),
                    appliance_suffix: format!("{site}_{phase}_{jjj}_zone{zone_index}_fl{floor}"),
                    skew,
                    floor_area: area,
                    doors: 0.1,
                    aspect_ratio: w / d,
                    mass,
                    interior_exterior_wall_ratio: area / (OFFICE.ceiling_height * 2.0 * (w + d)) - 1.0 + window_wall * exterior_wall,
                    exterior_wall_fraction: exterior_wall,
                    exterior_floor_fraction: exterior_floor,
                    exterior_ceiling_fraction: if floor < 3 { 0.0 } else { 1.0 },
                    window_wall_ratio: window_wall,
                    lights_scale: 1.0,
                    spreads: [(0.9, 0.1), (0.9, 0.2), (0.9, 0.2), (0.9, 0.1), (0.9, 0.1)],
                };
                builder.zone(rng, &OFFICE, zone);
                outcome.zones += 1;
            }
        }
        outcome.offices += 1;
    }
}

fn big_box(builder: &mut Builder<'_>, rng: &mut impl Rng, load: &CommercialLoad, outcome: &mut CommercialOutcome) {
    const ASPECT: f64 = 1.28301275561855;
    let site = load.site_name();
    let letters = load.phase_letters();
    let buildings = ((load.total_count() as f64 / 6.0).round() as usize).max(1);
    builder.service_configurations(&site, &letters, load.nominal_voltage, "10000+10000j", "50 kVA");
    let zones_per_phase = 6 / letters.len().max(1);

    for jjj in 0..buildings {
        let footprint = 20_000.0 * (0.5 + rng.gen::<f64>());
        let meter = format!("{site}_bigbox_meter{jjj}");
        builder.service_line(load.site_parent(), &meter, &load.phases, &letters);
        builder.building_meter(&meter, &load.phases, load.nominal_voltage);
        outcome.sites.push(site_for(load, meter.clone()));
        let skew = building_skew(rng, builder.tech);

        let depth = (footprint / ASPECT).sqrt();
        let width = ASPECT * depth;
        let d = width / 3.0;
        let w = depth / 2.0;
        let area = footprint / 6.0;
        let mut total_index = 0;
        for phase in letters.chars() {
            let tm = format!("{site}_tm_{phase}_{jjj}");
            builder.service_transformer(&site, phase, jjj, &meter, &tm);
            builder.tree.push(
                Record::object("triplex_meter")
                    .with("name", tm.clone())
                    .with("phases", format!("{phase}S"))
                    .with("nominal_voltage", "120"),
            );
            for zone_index in 0..zones_per_phase {
                total_index += 1;
                let mass = 3.9 * (0.8 + 0.4 * rng.gen::<f64>());
                let (exterior_wall, exterior_floor) = if total_index == 2 || total_index == 5 {
                    (d / (2.0 * (d + w)), d / (2.0 * (width + depth)) / (area / footprint))
                } else {
                    (0.5, (w + d) / (2.0 * (width + depth)) / (area / footprint))
                };
                let window_wall = if total_index == 2 { 0.76 } else { 0.0 };
                let doors = match total_index {
                    1..=3 => 0.1,
                    4 | 6 => 1.0,
                    _ => 24.0,
                };
                let house = format!("bigbox{site}_{phase}{jjj}_zone{zone_index}");
                if total_index == 1 {
                    outcome.storage_candidates.push(house.clone());
                }
                let zone = Zone {
                    house,
                    parent: tm.clone(),
                    appliance_suffix: format!("{site}_{phase}_{jjj}_zone{zone_index}"),
                    skew,
                    floor_area: area,
                    doors,
                    aspect_ratio: ASPECT,
                    mass,
                    interior_exterior_wall_ratio: (area + doors * 20.0) / (BIG_BOX.ceiling_height * 2.0 * (w + d)) - 1.0
                        + window_wall * exterior_wall,
                    exterior_wall_fraction: exterior_wall,
                    exterior_floor_fraction: exterior_floor,
                    exterior_ceiling_fraction: 1.0,
                    window_wall_ratio: window_wall,
                    lights_scale: 1.2,
                    spreads: [(0.9, 0.1), (0.9, 0.2), (0.9, 0.2), (0.9, 0.1), (0.9, 0.1)],
                };
                builder.zone(rng, &BIG_BOX, zone);
                outcome.zones += 1;
            }
        }
        outcome.big_boxes += 1;
    }
}

fn strip_mall(builder: &mut Builder<'_>, rng: &mut impl Rng, load: &CommercialLoad, outcome: &mut CommercialOutcome) {
    let site = load.site_name();
    let letters = load.phase_letters();
    let per_phase = (load.total_count() as f64 / letters.len().max(1) as f64).ceil() as usize;
    let rating = format!("{:.0} kVA", 50.0 * per_phase as f64);
    builder.service_configurations(&site, &letters, load.nominal_voltage, "100000+100000j", &rating);

    let node = format!("{site}_strip_node");
    builder.service_line(load.site_parent(), &node, &load.phases, &letters);
    builder.tree.push(
        Record::object("node")
            .with("name", node.clone())
            .with("phases", load.phases.clone())
            .with("nominal_voltage", format!("{:.6}", load.nominal_voltage)),
    );

    let mut first_meter = true;
    for phase in letters.chars() {
        let footprint = 2400.0 * (0.7 + 0.6 * rng.gen::<f64>());
        let mass = 3.9 * (0.5 + rng.gen::<f64>());
        for jjj in 1..=per_phase {
            let skew = building_skew(rng, builder.tech);
            let anchor = jjj == 1 || jjj == per_phase / 2 + 1;
            let (area, aspect, window_wall, exterior_wall, exterior_floor, iewr) = if anchor {
                (footprint, 1.5, 0.05, 0.4, 0.8, -0.05)
            } else if jjj == per_phase {
                (footprint / 2.0, 3.0, 0.03, 0.63, 2.0, -0.40)
            } else {
                (footprint / 2.0, 3.0, 0.03, 0.25, 0.8, -0.40)
            };

            let tn = format!("{site}_tn_{phase}_{jjj}");
            let tm = format!("{site}_tm_{phase}_{jjj}");
            builder.service_transformer(&site, phase, jjj, &node, &tn);
            builder.tree.push(
                Record::object("triplex_node")
                    .with("name", tn.clone())
                    .with("phases", format!("{phase}S"))
                    .with("nominal_voltage", "120"),
            );
            builder.tree.push(
                Record::object("triplex_meter")
                    .with("name", tm.clone())
                    .with("parent", tn)
                    .with("phases", format!("{phase}S"))
                    .with("groupid", "Commercial_Meter")
                    .with("meter_power_consumption", format!("{:.6}+{:.6}j", 1.0 / 3.0, 15.0 / 3.0))
                    .with("nominal_voltage", "120"),
            );
            let house = format!("stripmall{site}_{phase}{jjj}");
            if first_meter {
                outcome.sites.push(CommercialSite {
                    phases: format!("{phase}S"),
                    nominal_voltage: 120.0,
                    ..site_for(load, tm.clone())
                });
                outcome.storage_candidates.push(house.clone());
                first_meter = false;
            }
            let zone = Zone {
                house,
                parent: tm,
                appliance_suffix: format!("{site}_{phase}_{jjj}"),
                skew,
                floor_area: area,
                doors: 1.0,
                aspect_ratio: aspect,
                mass,
                interior_exterior_wall_ratio: iewr,
                exterior_wall_fraction: exterior_wall,
                exterior_floor_fraction: exterior_floor,
                exterior_ceiling_fraction: 1.0,
                window_wall_ratio: window_wall,
                lights_scale: 1.0,
                spreads: [(0.8, 0.4); 5],
            };
            builder.zone(rng, &STRIP_MALL, zone);
            outcome.zones += 1;
        }
    }
    outcome.strip_malls += 1;
}

/// A load too small for any building becomes street lighting.
fn street_light(tree: &mut ObjectTree, load: &CommercialLoad, tech: &TechParameters) {
    let letters = load.phase_letters();
    let zip = &tech.commercial_zip;
    let mut record = Record::object("load")
        .with("name", format!("str_light_{letters}{}", load.name))
        .with("parent", load.site_parent())
        .with("nominal_voltage", format!("{:.2}", load.nominal_voltage))
        .with("phases", load.phases.clone());
    for (i, phase) in ABC.iter().enumerate() {
        if !letters.contains(*phase) || load.load[i] <= 0.0 {
            continue;
        }
        let power = tech.light_scalar_commercial * load.load[i];
        record = record
            .with(format!("base_power_{phase}"), format!("street_lighting*{power:.6}"))
            .with(format!("power_pf_{phase}"), format!("{:.6}", zip.p_pf))
            .with(format!("current_pf_{phase}"), format!("{:.6}", zip.i_pf))
            .with(format!("impedance_pf_{phase}"), format!("{:.6}", zip.z_pf))
            .with(format!("power_fraction_{phase}"), format!("{:.6}", zip.p_frac))
            .with(format!("current_fraction_{phase}"), format!("{:.6}", zip.i_frac))
            .with(format!("impedance_fraction_{phase}"), format!("{:.6}", zip.z_frac));
    }
    tree.push(record);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tech::TechnologyCase;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn load(name: &str, phases: &str, counts: [usize; 3], class: Option<usize>) -> CommercialLoad {
        CommercialLoad {
            name: name.into(),
            parent: Some("n1".into()),
            phases: phases.into(),
            nominal_voltage: 7200.0,
            load: counts.map(|c| c as f64 * 35_000.0),
            counts,
            class: class.map(|c| LoadClass::new(c).unwrap()),
            building_type: None,
        }
    }

    fn run(loads: &[CommercialLoad]) -> (ObjectTree, CommercialOutcome) {
        let mut tree = ObjectTree::new();
        let mut rng = StdRng::seed_from_u64(4);
        let tech = TechParameters::for_case(TechnologyCase::Base);
        let outcome = populate_commercial(&mut tree, loads, &FeederConfig::default(), &tech, &mut rng).unwrap();
        (tree, outcome)
    }

    fn zip_count(tree: &ObjectTree) -> usize {
        tree.count_kind("ZIPload")
    }

    #[test]
    fn office_has_fifteen_zones_per_building() {
        let (tree, outcome) = run(&[load("L1", "ABCN", [5, 5, 5], Some(8))]);
        assert_eq!(outcome.offices, 1);
        assert_eq!(tree.count_kind("house"), 15);
        assert_eq!(zip_count(&tree), 75);
        assert!(tree.by_name("officen1_L1_A0_zone1_fl1").is_some());
        assert!(tree.by_name("n1_L1_office_meter0").is_some());
        assert_eq!(tree.count_kind("transformer"), 3);
        assert_eq!(outcome.storage_candidates, vec!["officen1_L1_A0_zone1_fl1".to_string()]);
        let top = tree.by_name("officen1_L1_C0_zone5_fl3").unwrap();
        assert_eq!(top.get("exterior_ceiling_fraction"), Some("1.000"));
        assert_eq!(top.get("exterior_wall_fraction"), Some("0.00"));
    }

    #[test]
    fn two_phase_office_still_has_fifteen_zones() {
        let (tree, _) = run(&[load("L2", "ACN", [8, 0, 8], Some(8))]);
        assert_eq!(tree.count_kind("house"), 15);
        assert_eq!(tree.count_kind("transformer"), 2);
    }

    #[test]
    fn big_box_has_six_zones() {
        let (tree, outcome) = run(&[load("L3", "ABC", [2, 2, 2], Some(7))]);
        assert_eq!(outcome.big_boxes, 1);
        assert_eq!(tree.count_kind("house"), 6);
        let lights = tree.by_name("lights_n1_L3_A_0_zone0").unwrap();
        assert!(lights.get("base_power").unwrap().starts_with("bigbox_lights*"));
        let house = tree.by_name("bigboxn1_L3_A0_zone0").unwrap();
        assert_eq!(house.get("heating_setpoint"), Some("bigbox_heating"));
    }

    #[test]
    fn strip_mall_units_per_phase() {
        let (tree, outcome) = run(&[load("L4", "AB", [2, 1, 0], Some(6))]);
        assert_eq!(outcome.strip_malls, 1);
        // ceil(3 / 2) = 2 units on each of two phases
        assert_eq!(tree.count_kind("house"), 4);
        assert!(tree.by_name("n1_L4_strip_node").is_some());
        assert_eq!(outcome.sites.len(), 1);
        assert_eq!(outcome.sites[0].meter, "n1_L4_tm_A_1");
        assert_eq!(outcome.sites[0].building_type, DEFAULT_BUILDING_TYPE);
        let cfg = tree.by_name("CTTF_config_A_n1_L4").unwrap();
        assert_eq!(cfg.get("powerA_rating"), Some("100 kVA"));
    }

    #[test]
    fn tiny_load_becomes_street_light() {
        let mut tiny = load("L5", "BN", [0, 0, 0], None);
        tiny.load = [0.0, 800.0, 0.0];
        let (tree, outcome) = run(&[tiny]);
        assert_eq!(outcome.street_lights, 1);
        let light = tree.by_name("str_light_BL5").unwrap();
        assert_eq!(light.get("base_power_B"), Some("street_lighting*800.000000"));
        assert!(light.get("base_power_A").is_none());
    }

    #[test]
    fn residential_class_on_commercial_load_emits_nothing() {
        let (tree, outcome) = run(&[load("L6", "A", [3, 0, 0], Some(1))]);
        assert_eq!(tree.count_kind("house"), 0);
        assert_eq!(outcome.sites.len(), 0);
    }

    #[test]
    fn line_configurations_cover_every_phase_set() {
        let mut tree = ObjectTree::new();
        add_line_configurations(&mut tree);
        for letters in ["ABC", "AB", "AC", "BC", "A", "B", "C"] {
            assert!(tree.by_name(&format!("line_configuration_comm{letters}")).is_some());
        }
        assert_eq!(tree.count_kind("triplex_line_conductor"), 3);
    }
}
