//! Residential population: houses, their ZIP end uses and water heaters.
//!
//! Each residential spot load is split into `houses` homes. Every home
//! gets its own `triplex_meter` under the load's meter and a `house`
//! under that, so the original service drop keeps carrying the load.

use anyhow::Result;
use fdr_core::{ObjectTree, Record};
use rand::Rng;

use crate::config::FeederConfig;
use crate::loads::ResidentialLoad;
use crate::region::{
    ClassProfile, SetpointBin, COOLING_SCHEDULES, HEATING_SCHEDULES, SUBCLASS_COUNT, WATER_SCHEDULES,
};
use crate::sampling::{ceil_draw, clip_skew, randint, standard_normal};
use crate::tech::{TechParameters, ZipFractions};

/// Heating bin retries before falling back to the first bin.
const HEATING_BIN_ATTEMPTS: usize = 20;
/// Upper bound on redraws while looking for a free slot.
const SLOT_ATTEMPTS: usize = 10_000;

/// A generated home, kept for the solar and storage stages.
#[derive(Debug, Clone, PartialEq)]
pub struct HomeSite {
    pub meter: String,
    pub house: String,
    pub phases: String,
    pub floor_area: f64,
    pub care: bool,
    pub usage_bin: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResidentialOutcome {
    pub homes: Vec<HomeSite>,
    pub pool_pumps: usize,
    pub water_heaters: usize,
}

/// Remaining draw slots for one spot load.
struct Slots {
    thermal: [i64; SUBCLASS_COUNT],
    single_family: [i64; SUBCLASS_COUNT],
    pool_pumps: i64,
    cooling: Vec<Vec<i64>>,
    heating: Vec<Vec<i64>>,
}

impl Slots {
    fn new(profile: &ClassProfile, houses: usize) -> Self {
        let n = houses as f64;
        let thermal: [i64; SUBCLASS_COUNT] =
            std::array::from_fn(|i| (profile.thermal_percentages[i] * n).ceil() as i64);
        let single_family = std::array::from_fn(|i| (profile.sfh[i] * thermal[i] as f64) as i64);
        let pool_pumps = (profile.sfh.iter().sum::<f64>() * n) as i64;
        let bins = |table: &[SetpointBin]| -> Vec<Vec<i64>> {
            thermal
                .iter()
                .map(|t| table.iter().map(|b| (b.share * *t as f64).ceil() as i64).collect())
                .collect()
        };
        Self {
            thermal,
            single_family,
            pool_pumps,
            cooling: bins(&profile.cooling_setpoint),
            heating: bins(&profile.heating_setpoint),
        }
    }

    fn draw_thermal_row(&mut self, rng: &mut impl Rng) -> usize {
        let mut row = 0;
        for _ in 0..SLOT_ATTEMPTS {
            row = ceil_draw(rng, SUBCLASS_COUNT as u32) as usize % SUBCLASS_COUNT;
            if self.thermal[row] >= 1 {
                break;
            }
        }
        self.thermal[row] -= 1;
        row
    }

    fn draw_cooling_bin(&mut self, rng: &mut impl Rng, row: usize) -> usize {
        let last = self.cooling[row].len() as i64 - 1;
        let mut bin = randint(rng, 0, last) as usize;
        for _ in 0..SLOT_ATTEMPTS {
            if self.cooling[row][bin] >= 1 {
                break;
            }
            bin = randint(rng, 0, last) as usize;
        }
        self.cooling[row][bin] -= 1;
        bin
    }

    /// A heating bin whose band sits below the chosen cooling band.
    fn draw_heating_bin(
        &mut self,
        rng: &mut impl Rng,
        row: usize,
        cooling: &SetpointBin,
        table: &[SetpointBin],
    ) -> usize {
        let last = self.heating[row].len() as i64 - 1;
        let mut bin = randint(rng, 0, last) as usize;
        let mut attempts = 0;
        while self.heating[row][bin] < 1 || table[bin].high >= cooling.low {
            bin = randint(rng, 0, last) as usize;
            if attempts > HEATING_BIN_ATTEMPTS {
                bin = 0;
                break;
            }
            attempts += 1;
        }
        self.heating[row][bin] -= 1;
        bin
    }
}

/// Floor area, stories and ceiling height of one home.
fn draw_geometry(
    rng: &mut impl Rng,
    profile: &ClassProfile,
    slots: &mut Slots,
    row: usize,
    large_vs_small: f64,
) -> (f64, u32, u32) {
    let story_rand: f64 = rng.gen();
    let height_rand = randint(rng, 1, 2);
    let fa_rand: f64 = rng.gen();
    let fa = profile.floor_area;
    let (mut area, stories, height_rand) = if slots.single_family[row] > 0 {
        slots.single_family[row] -= 1;
        let area = fa + (fa / 2.0) * fa_rand * ((row as f64 - 4.0) / 3.0);
        let stories = if story_rand < profile.one_story { 1 } else { 2 };
        (area, stories, height_rand)
    } else {
        (fa + (fa / 2.0) * (0.5 - fa_rand), 1, 0)
    };
    area *= 1.0 + large_vs_small;
    if area > 4000.0 {
        area = 3800.0 + fa_rand * 200.0;
    } else if area < 300.0 {
        area = 300.0 + fa_rand * 100.0;
    }
    (area, stories, 8 + height_rand as u32)
}

/// `value` scaled by U(0.8, 1.2).
pub(crate) fn jitter(rng: &mut impl Rng, value: f64) -> f64 {
    value * (0.8 + 0.4 * rng.gen::<f64>())
}

pub(crate) fn apply_zip(record: Record, zip: &ZipFractions, pf_format: fn(f64) -> String) -> Record {
    record
        .with("power_pf", pf_format(zip.p_pf))
        .with("current_pf", pf_format(zip.i_pf))
        .with("impedance_pf", pf_format(zip.z_pf))
        .with("impedance_fraction", format!("{:.6}", zip.z_frac))
        .with("current_fraction", format!("{:.6}", zip.i_frac))
        .with("power_fraction", format!("{:.6}", zip.p_frac))
}

fn pf3(value: f64) -> String {
    format!("{value:.3}")
}

/// Populate every residential load into `tree`.
pub fn populate_residential(
    tree: &mut ObjectTree,
    loads: &[ResidentialLoad],
    config: &FeederConfig,
    tech: &TechParameters,
    rng: &mut impl Rng,
) -> Result<ResidentialOutcome> {
    let mut outcome = ResidentialOutcome::default();
    for load in loads.iter().filter(|l| l.houses > 0) {
        let profile = ClassProfile::new(config, load.class)?;
        populate_load(tree, load, &profile, tech, rng, &mut outcome);
    }
    tracing::info!(
        homes = outcome.homes.len(),
        pool_pumps = outcome.pool_pumps,
        water_heaters = outcome.water_heaters,
        "populated residential loads"
    );
    Ok(outcome)
}

fn populate_load(
    tree: &mut ObjectTree,
    load: &ResidentialLoad,
    profile: &ClassProfile,
    tech: &TechParameters,
    rng: &mut impl Rng,
    outcome: &mut ResidentialOutcome,
) {
    let site = load.site_name();
    let mut slots = Slots::new(profile, load.houses);
    let skew_max = tech.residential_skew_max;

    for y in 0..load.houses {
        let meter = format!("tpm{y}_{site}");
        tree.push(
            Record::object("triplex_meter")
                .with("name", meter.clone())
                .with("parent", load.site_parent())
                .with("phases", load.phases.clone())
                .with("groupid", "Residential_Meter")
                .with("meter_power_consumption", tech.residential_meter_consumption)
                .with("nominal_voltage", "120"),
        );

        let house = format!("house{y}_{site}");
        let std = profile.residential_skew_std;
        let skew = clip_skew(std * standard_normal(rng), skew_max) + profile.residential_skew_shift;
        let wh_skew = clip_skew(3.0 * std * standard_normal(rng), 6.0 * skew_max);
        let pp_skew = clip_skew(128.0 * std * standard_normal(rng), 128.0 * skew_max);

        let row = slots.draw_thermal_row(rng);
        let (area, stories, ceiling_height) = draw_geometry(rng, profile, &mut slots, row, load.large_vs_small);
        let props = &profile.thermal_properties[row];

        let mut record = Record::object("house")
            .with("name", house.clone())
            .with("parent", meter.clone())
            .with("groupid", "Residential")
            .with("schedule_skew", format!("{skew:.0}"))
            .with("floor_area", format!("{area:.0}"))
            .with("number_of_stories", format!("{stories}"))
            .with("ceiling_height", format!("{ceiling_height}"))
            .with("Rroof", format!("{:.2}", jitter(rng, props.r_ceiling)))
            .with("Rwall", format!("{:.2}", jitter(rng, props.r_wall)))
            .with("Rfloor", format!("{:.2}", jitter(rng, props.r_floor)))
            .with("glazing_layers", format!("{:.0}", props.glazing_layers))
            .with("glass_type", format!("{:.0}", props.glass_type))
            .with("glazing_treatment", format!("{:.0}", props.glazing_treatment))
            .with("window_frame", format!("{:.0}", props.window_frame))
            .with("Rdoors", format!("{:.2}", jitter(rng, props.r_door)))
            .with("airchange_per_hour", format!("{:.2}", jitter(rng, props.airchange)));

        let cop = props.cop_low + rng.gen::<f64>() * (props.cop_high - props.cop_low);
        let init_temp = 68.0 + 4.0 * rng.gen::<f64>();
        let mass = 2.5 + 1.5 * rng.gen::<f64>();
        record = record
            .with("cooling_COP", format!("{cop:.2}"))
            .with("air_temperature", format!("{init_temp:.2}"))
            .with("mass_temperature", format!("{init_temp:.2}"))
            .with("window_wall_ratio", format!("{:.2}", profile.window_wall_ratio))
            .with("total_thermal_mass_per_floor_area", format!("{mass:.3}"));

        let heat_type: f64 = rng.gen();
        let cool_type: f64 = rng.gen();
        let electric_cooling = cool_type <= profile.perc_ac;
        let cooling_or_none = if electric_cooling { "ELECTRIC" } else { "NONE" };
        if heat_type <= profile.perc_gas {
            record = record
                .with("heating_system_type", "GAS")
                .with("cooling_system_type", cooling_or_none);
        } else if heat_type <= profile.perc_gas + profile.perc_pump {
            record = record
                .with("heating_system_type", "HEAT_PUMP")
                .with("heating_COP", format!("{cop:.1}"))
                .with("cooling_system_type", "ELECTRIC")
                .with("auxiliary_strategy", "DEADBAND")
                .with("auxiliary_system_type", "ELECTRIC")
                .with("motor_model", "BASIC")
                .with("motor_efficiency", "VERY_GOOD");
        } else if area * f64::from(ceiling_height) > 12_000.0 {
            record = record
                .with("heating_system_type", "GAS")
                .with("cooling_system_type", cooling_or_none);
        } else {
            record = record.with("heating_system_type", "RESISTANCE");
            record = if electric_cooling {
                record
                    .with("cooling_system_type", "ELECTRIC")
                    .with("motor_model", "BASIC")
                    .with("motor_efficiency", "VERY_GOOD")
            } else {
                record.with("cooling_system_type", "NONE")
            };
        }

        let ac_unit: f64 = rng.gen();
        let over_sizing = if record.get("cooling_system_type") == Some("ELECTRIC") {
            let factor = if ac_unit <= profile.ac_type[0] {
                profile.over_sizing_factor[0]
            } else {
                profile.over_sizing_factor[1]
            };
            jitter(rng, factor)
        } else {
            0.0
        };
        record = record
            .with("over_sizing_factor", format!("{over_sizing:.1}"))
            .with("breaker_amps", "1000")
            .with("hvac_breaker_rating", "1000");

        let cooling_schedule = ceil_draw(rng, COOLING_SCHEDULES);
        let heating_schedule = ceil_draw(rng, HEATING_SCHEDULES);
        let cool_bin = slots.draw_cooling_bin(rng, row);
        let cooling = profile.cooling_setpoint[cool_bin];
        let heat_bin = slots.draw_heating_bin(rng, row, &cooling, &profile.heating_setpoint);
        let heating = profile.heating_setpoint[heat_bin];

        let cool_night = (cooling.high - cooling.low) * rng.gen::<f64>() + cooling.low + 1.0;
        let mut heat_night = (heating.high - heating.low) * rng.gen::<f64>() + heating.low - 1.0;
        let diff: f64 = rng.gen();
        let cool_diff = cooling.offset * 2.0 * diff;
        let heat_diff = heating.offset * 2.0 * diff;
        heat_night += profile.addtl_heat_degrees;
        record = record
            .with("cooling_setpoint", format!("cooling{cooling_schedule}*{cool_diff:.2}+{cool_night:.2}"))
            .with("heating_setpoint", format!("heating{heating_schedule}*{heat_diff:.2}+{heat_night:.2}"));
        tree.push(record);

        // End-use loads scale with floor area.
        let scalar1 = (324.9 / 8907.0) * area.powf(0.442) * profile.base_load_scalar;
        let scalar2 = 0.8 + 0.4 * rng.gen::<f64>();
        let scalar3 = 0.8 + 0.4 * rng.gen::<f64>();
        let resp_scalar = scalar1 * scalar2;
        let unresp_scalar = scalar1 * scalar3;
        let pp_power = 1.36 + 0.36 * rng.gen::<f64>();
        let pp_perc: f64 = rng.gen();
        let pp_duty = 1.0 / 6.0 + (1.0 / 3.0) * rng.gen::<f64>();
        let pp_period = 4.0 + 4.0 * rng.gen::<f64>();
        let pp_phase: f64 = rng.gen();
        let zip = &tech.residential_zip;

        for (suffix, groupid, schedule, scalar) in [
            ("resp", "Responsive_load", "responsive_loads", resp_scalar),
            ("unresp", "Unresponsive_load", "unresponsive_loads", unresp_scalar),
        ] {
            let zipload = Record::object("ZIPload")
                .with("name", format!("house{y}_{suffix}_{site}"))
                .with("parent", house.clone())
                .with("groupid", groupid)
                .with("schedule_skew", format!("{skew:.0}"))
                .with("base_power", format!("{schedule}*{scalar:.2}"))
                .with("heatgain_fraction", format!("{:.3}", tech.heat_fraction));
            tree.push(apply_zip(zipload, zip, pf3));
        }

        if pp_perc < 2.0 * profile.perc_poolpumps && slots.pool_pumps >= 1 && row == 0 {
            let pump = Record::object("ZIPload")
                .with("name", format!("house{y}_ppump_{site}"))
                .with("parent", house.clone())
                .with("groupid", "Pool_Pump")
                .with("schedule_skew", format!("{pp_skew:.0}"))
                .with("base_power", format!("pool_pump_season*{pp_power:.2}"))
                .with("duty_cycle", format!("{pp_duty:.2}"))
                .with("phase", format!("{pp_phase:.2}"))
                .with("period", format!("{pp_period:.2}"))
                .with("heatgain_fraction", "0.0");
            tree.push(apply_zip(pump, zip, pf3).with("is_240", "TRUE"));
            slots.pool_pumps -= 1;
            outcome.pool_pumps += 1;
        }

        let heat_element = 3.0 + 0.5 * randint(rng, 1, 5) as f64;
        let tank_set = 120.0 + 16.0 * rng.gen::<f64>();
        let deadband = 4.0 + 4.0 * rng.gen::<f64>();
        let tank_ua = 2.0 + 2.0 * rng.gen::<f64>();
        let water_schedule = ceil_draw(rng, WATER_SCHEDULES);
        let water_var = 0.95 + 0.1 * rng.gen::<f64>();
        let size_test: f64 = rng.gen();
        let size_rand = randint(rng, 1, 3) as f64;

        if tech.use_waterheaters && heat_type > 1.0 - profile.wh_electric {
            let [small, medium, _] = profile.wh_size;
            let (demand, volume) = if size_test < small {
                ("small", 20.0 + 5.0 * (size_rand - 1.0))
            } else if size_test < small + medium {
                let kind = if area < 2000.0 { "small" } else { "large" };
                (kind, 30.0 + 10.0 * (size_rand - 1.0))
            } else if area > 2000.0 {
                ("large", 50.0 + 10.0 * (size_rand - 1.0))
            } else {
                ("large", 30.0 + 10.0 * (size_rand - 1.0))
            };
            tree.push(
                Record::object("waterheater")
                    .with("name", format!("house{y}_wh_{site}"))
                    .with("parent", house.clone())
                    .with("schedule_skew", format!("{wh_skew:.0}"))
                    .with("heating_element_capacity", format!("{heat_element:.1} kW"))
                    .with("tank_setpoint", format!("{tank_set:.1}"))
                    .with("temperature", "132")
                    .with("thermostat_deadband", format!("{deadband:.1}"))
                    .with("location", "INSIDE")
                    .with("tank_UA", format!("{tank_ua:.1}"))
                    .with("demand", format!("{demand}_{water_schedule}*{water_var:.2}"))
                    .with("tank_volume", format!("{volume:.0}")),
            );
            outcome.water_heaters += 1;
        }

        outcome.homes.push(HomeSite {
            meter,
            house,
            phases: load.phases.clone(),
            floor_area: area,
            care: load.care.unwrap_or(false),
            usage_bin: load.usage_bin,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::LoadClass;
    use crate::tech::TechnologyCase;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn load(power: f64, houses: usize, class: usize) -> ResidentialLoad {
        ResidentialLoad {
            name: "tpn1A".into(),
            parent: Some("tpm1A".into()),
            phases: "AS".into(),
            load: power,
            houses,
            large_vs_small: power / 15000.0 - houses as f64,
            class: LoadClass::new(class).unwrap(),
            care: None,
            usage_bin: None,
        }
    }

    fn run(loads: &[ResidentialLoad], seed: u64) -> (ObjectTree, ResidentialOutcome) {
        let mut tree = ObjectTree::new();
        let mut rng = StdRng::seed_from_u64(seed);
        let tech = TechParameters::for_case(TechnologyCase::Base);
        let outcome = populate_residential(&mut tree, loads, &FeederConfig::default(), &tech, &mut rng).unwrap();
        (tree, outcome)
    }

    #[test]
    fn one_house_hangs_under_a_new_meter() {
        let (tree, outcome) = run(&[load(15000.0, 1, 0)], 3);
        assert_eq!(tree.count_kind("house"), 1);
        assert_eq!(tree.count_kind("triplex_meter"), 1);
        let house = tree.by_name("house0_tpm1A_tpn1A").unwrap();
        assert_eq!(house.parent(), Some("tpm0_tpm1A_tpn1A"));
        let meter = tree.by_name("tpm0_tpm1A_tpn1A").unwrap();
        assert_eq!(meter.parent(), Some("tpm1A"));
        let area: f64 = house.get("floor_area").unwrap().parse().unwrap();
        assert!((300.0..=4000.0).contains(&area));
        assert!(tree.by_name("house0_resp_tpm1A_tpn1A").is_some());
        assert!(tree.by_name("house0_unresp_tpm1A_tpn1A").is_some());
        assert_eq!(outcome.homes.len(), 1);
    }

    #[test]
    fn every_house_is_well_formed() {
        let loads: Vec<_> = (0..6).map(|c| load(150_000.0, 10, c)).collect();
        let (tree, outcome) = run(&loads, 3);
        assert_eq!(tree.count_kind("house"), 60);
        assert_eq!(outcome.homes.len(), 60);
        for key in tree.keys_of_kind("house") {
            let house = tree.get(key).unwrap();
            let area: f64 = house.get("floor_area").unwrap().parse().unwrap();
            assert!((300.0..=4000.0).contains(&area), "floor area {area}");
            let skew: f64 = house.get("schedule_skew").unwrap().parse().unwrap();
            assert!(skew.abs() <= 8100.0);
            let heating = house.get("heating_system_type").unwrap();
            assert!(["GAS", "HEAT_PUMP", "RESISTANCE"].contains(&heating));
            assert!(house.get("cooling_setpoint").unwrap().starts_with("cooling"));
            assert!(house.get("heating_setpoint").unwrap().starts_with("heating"));
        }
        for key in tree.keys_of_kind("waterheater") {
            let wh = tree.get(key).unwrap();
            let volume: f64 = wh.get("tank_volume").unwrap().parse().unwrap();
            assert!((20.0..=70.0).contains(&volume));
        }
    }

    #[test]
    fn pool_pumps_only_on_single_family_subclass() {
        let loads: Vec<_> = (0..4).map(|c| load(600_000.0, 40, c)).collect();
        let (tree, outcome) = run(&loads, 11);
        let pumps: Vec<_> = tree
            .iter()
            .filter(|(_, r)| r.get("groupid") == Some("Pool_Pump"))
            .collect();
        assert_eq!(pumps.len(), outcome.pool_pumps);
        for (_, pump) in pumps {
            assert_eq!(pump.get("is_240"), Some("TRUE"));
        }
    }

    #[test]
    fn same_seed_same_population() {
        let loads = vec![load(90_000.0, 6, 2)];
        let (a, _) = run(&loads, 3);
        let (b, _) = run(&loads, 3);
        let (c, _) = run(&loads, 4);
        let attrs = |t: &ObjectTree| -> Vec<Vec<(String, String)>> {
            t.iter()
                .map(|(_, r)| r.attributes().map(|(k, v)| (k.to_string(), v.to_string())).collect())
                .collect()
        };
        assert_eq!(attrs(&a), attrs(&b));
        assert_ne!(attrs(&a), attrs(&c));
    }
}
