//! Case assembly: header, substation, base copy and the population stages.

use anyhow::{Context, Result};
use fdr_core::{topology, Diagnostics, FdrError, ObjectTree, Record, RecordKind};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::commercial::populate_commercial;
use crate::config::{FeederConfig, Knob};
use crate::loads::{collect_commercial, collect_residential};
use crate::loadshape::{commercial_loadshapes, loadshape_player, residential_loadshapes};
use crate::recorders::{attach_recorders, RecorderOptions};
use crate::residential::populate_residential;
use crate::solar::{allocate_commercial, allocate_residential, emit_commercial, emit_residential};
use crate::storage::attach_thermal_storage;
use crate::tech::{TechParameters, TechnologyCase};

const RESIDENTIAL_SEED: u64 = 3;
const COMMERCIAL_SEED: u64 = 4;
const SOLAR_SEED: u64 = 1;
const STORAGE_SEED: u64 = 4;

/// Counts of what the populator generated.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PopulateStats {
    pub residential_loads: usize,
    pub houses: usize,
    pub pool_pumps: usize,
    pub water_heaters: usize,
    pub commercial_loads: usize,
    pub offices: usize,
    pub big_boxes: usize,
    pub strip_malls: usize,
    pub street_lights: usize,
    pub commercial_zones: usize,
    pub loadshapes: usize,
    pub pv_units: usize,
    pub pv_kw: f64,
    pub thermal_storage: usize,
    pub recorders: usize,
}

#[derive(Debug, Clone)]
pub struct PopulateOutput {
    pub tree: ObjectTree,
    pub diagnostics: Diagnostics,
    pub stats: PopulateStats,
}

fn include(path: String) -> Record {
    Record::directive("#include", format!("\"{path}\""))
}

/// Clock, includes, settings, modules and the weather reader.
fn header(config: &FeederConfig, case: TechnologyCase) -> Vec<Record> {
    let dir = &config.schedules_dir;
    let mut records = vec![
        Record::new(RecordKind::Clock)
            .with("timezone", config.timezone.clone())
            .with("starttime", format!("'{}'", config.start_date))
            .with("stoptime", format!("'{}'", config.stop_date)),
        include(format!("{dir}/appliance_schedules.glm")),
        include(format!("{dir}/water_and_setpoint_schedule_v5.glm")),
        include(format!("{dir}/commercial_schedules.glm")),
    ];
    if case.uses_thermal_storage() {
        records.push(include(format!("{dir}/thermal_storage_schedule_R{}.glm", config.region)));
    }
    records.extend([
        Record::directive("#set", "minimum_timestep=60"),
        Record::directive("#set", "profiler=1"),
        Record::directive("#set", "relax_naming_rules=1"),
        Record::directive("module", "tape"),
        Record::directive("module", "climate"),
        Record::new(RecordKind::Module { name: "residential".into() }).with("implicit_enduses", "NONE"),
        Record::new(RecordKind::Module { name: "powerflow".into() })
            .with("solver_method", "NR")
            .with("NR_iteration_limit", "50"),
    ]);
    if case.uses_solar() {
        records.push(Record::directive("module", "generators"));
    }
    records.push(Record::new(RecordKind::Class { name: "player".into() }).with("double", "value"));

    let weather = config.weather.clone();
    if weather.to_ascii_lowercase().ends_with(".csv") {
        records.push(Record::object("csv_reader").with("name", "CsvReader").with("filename", weather.clone()));
        records.push(
            Record::object("climate")
                .with("name", "ClimateWeather")
                .with("tmyfile", weather)
                .with("reader", "CsvReader"),
        );
    } else {
        records.push(
            Record::object("climate")
                .with("name", "ClimateWeather")
                .with("tmyfile", weather)
                .with("interpolate", "QUADRATIC"),
        );
    }
    records
}

/// Substation transformer, swing meter and voltage players above `swing`.
fn substation(config: &FeederConfig, case: TechnologyCase, swing: &str, swing_voltage: &str) -> Vec<Record> {
    let mut records = vec![Record::object("transformer_configuration")
        .with("name", "trans_config_to_feeder")
        .with("connect_type", "WYE_WYE")
        .with("install_type", "PADMOUNT")
        .with("primary_voltage", format!("{:.0}", config.nom_volt))
        .with("secondary_voltage", swing_voltage)
        .with("power_rating", format!("{:.1} MVA", config.feeder_rating))
        .with("impedance", "0.00033+0.0022j")];
    if case.uses_vvc() {
        records.push(
            Record::object("volt_var_control")
                .with("name", "volt_var_control")
                .with("control_method", "ACTIVE")
                .with("capacitor_delay", "60.0")
                .with("regulator_delay", "60.0")
                .with("desired_pf", "0.99")
                .with("d_max", "0.8")
                .with("d_min", "0.1")
                .with("substation_link", "substation_transformer"),
        );
    }
    records.push(
        Record::object("meter")
            .with("name", "network_node")
            .with("bustype", "SWING")
            .with("nominal_voltage", format!("{:.0}", config.nom_volt))
            .with("phases", "ABCN"),
    );
    for (phase, file) in ["A", "B", "C"].iter().zip(&config.voltage_players) {
        records.push(
            Record::object("player")
                .with("name", format!("network_node_voltage_{phase}"))
                .with("parent", "network_node")
                .with("property", format!("voltage_{phase}"))
                .with("file", file.clone())
                .with("loop", "10"),
        );
    }
    records.push(
        Record::object("transformer")
            .with("name", "substation_transformer")
            .with("from", "network_node")
            .with("to", swing)
            .with("phases", "ABCN")
            .with("configuration", "trans_config_to_feeder"),
    );
    records
}

/// Whether a base record is dropped when copying under the new header.
fn replaced_by_header(record: &Record) -> bool {
    match &record.kind {
        RecordKind::Clock | RecordKind::Module { .. } => true,
        RecordKind::Directive { kind, .. } => matches!(kind.as_str(), "module" | "#set" | "#define"),
        _ => false,
    }
}

fn default_groupid(kind: &str) -> Option<&'static str> {
    match kind {
        "triplex_line" => Some("Triplex_Line"),
        "transformer" => Some("Distribution_Trans"),
        "overhead_line" | "underground_line" => Some("Distribution_Line"),
        _ => None,
    }
}

/// Copy `base` into `tree`, demoting its swing node to a plain meter.
fn copy_base(tree: &mut ObjectTree, base: &ObjectTree, swing: &str) {
    for (_, record) in base.iter() {
        if replaced_by_header(record) {
            continue;
        }
        let mut record = record.clone();
        if record.name() == Some(swing) {
            record.remove("bustype");
            record.kind = RecordKind::object("meter");
        }
        if let Some(groupid) = record.kind.object_kind().and_then(default_groupid) {
            if !record.contains("groupid") {
                record.set("groupid", groupid);
            }
        }
        tree.push(record);
    }
}

/// Build the populated feeder for `case` from a base network.
pub fn populate_feeder(
    base: &ObjectTree,
    config: &FeederConfig,
    case: TechnologyCase,
    options: RecorderOptions,
) -> Result<PopulateOutput> {
    let tech = TechParameters::for_case(case);
    let mut diagnostics = Diagnostics::new();
    let mut stats = PopulateStats::default();
    if case.is_unsupported() {
        diagnostics.add_warning("case", &format!("technology case {case} is populated like the base case"));
    }

    let swing = topology::swing_buses(base)
        .into_iter()
        .next()
        .ok_or_else(|| FdrError::MissingReference("swing bus".into()))?;
    let swing_voltage = base
        .by_name(&swing)
        .and_then(|r| r.get("nominal_voltage"))
        .map(str::to_string)
        .ok_or_else(|| FdrError::MissingReference(format!("nominal_voltage of swing bus {swing}")))?;
    tracing::info!(case = case.code(), swing = %swing, region = config.region, "populating feeder");

    let mut tree: ObjectTree = header(config, case).into_iter().collect();
    if case.uses_load_shapes() {
        tree.push(loadshape_player(&config.load_shape_file));
    }
    tree.extend(substation(config, case, &swing, &swing_voltage).into_iter().collect());
    copy_base(&mut tree, base, &swing);

    let mut residential_rng = StdRng::seed_from_u64(RESIDENTIAL_SEED.wrapping_add(config.seed));
    let mut commercial_rng = StdRng::seed_from_u64(COMMERCIAL_SEED.wrapping_add(config.seed));
    let residential_loads = collect_residential(&mut tree, config, &mut residential_rng, &mut diagnostics)
        .context("collecting residential loads")?;
    let commercial_loads = collect_commercial(&mut tree, config, &tech, &mut diagnostics)
        .context("collecting commercial loads")?;
    stats.residential_loads = residential_loads.len();
    stats.commercial_loads = commercial_loads.len();

    if case.uses_load_shapes() {
        let scalar = config.knob(Knob::LoadShapeScalar);
        stats.loadshapes += residential_loadshapes(&mut tree, &residential_loads, scalar, &tech.loadshape_residential_zip);
        stats.loadshapes += commercial_loadshapes(&mut tree, &commercial_loads, scalar, &tech.loadshape_commercial_zip);
        stats.recorders = attach_recorders(&mut tree, &case.code().to_string(), &swing, options, &tech);
        return Ok(PopulateOutput { tree, diagnostics, stats });
    }

    let residential = populate_residential(&mut tree, &residential_loads, config, &tech, &mut residential_rng)
        .context("populating residential loads")?;
    stats.houses = residential.homes.len();
    stats.pool_pumps = residential.pool_pumps;
    stats.water_heaters = residential.water_heaters;

    let commercial = populate_commercial(&mut tree, &commercial_loads, config, &tech, &mut commercial_rng)
        .context("populating commercial loads")?;
    stats.offices = commercial.offices;
    stats.big_boxes = commercial.big_boxes;
    stats.strip_malls = commercial.strip_malls;
    stats.street_lights = commercial.street_lights;
    stats.commercial_zones = commercial.zones;

    if case.uses_solar() {
        let mut rng = StdRng::seed_from_u64(SOLAR_SEED.wrapping_add(config.seed));
        let target = config.solar_target_kw();
        let (residential_kw, commercial_kw) = match case {
            TechnologyCase::SolarResidential => (target, 0.0),
            TechnologyCase::SolarCommercial => (0.0, target),
            _ => (target * config.pv_residential_share, target * (1.0 - config.pv_residential_share)),
        };
        let homes = allocate_residential(&residential.homes, residential_kw, &mut rng, &mut diagnostics);
        emit_residential(&mut tree, &homes, &tech, &mut rng);
        let buildings = allocate_commercial(&commercial.sites, commercial_kw, &mut rng, &mut diagnostics);
        emit_commercial(&mut tree, &buildings, &tech);
        stats.pv_units = homes.len() + buildings.len();
        stats.pv_kw = homes.iter().chain(&buildings).map(|u| u.size_kw).sum();
        tracing::info!(target_kw = target, installed_kw = stats.pv_kw, units = stats.pv_units, "placed PV");
    }

    if case.uses_thermal_storage() {
        let mut rng = StdRng::seed_from_u64(STORAGE_SEED.wrapping_add(config.seed));
        let candidates: Vec<String> = residential
            .homes
            .iter()
            .map(|h| h.house.clone())
            .chain(commercial.storage_candidates.iter().cloned())
            .collect();
        stats.thermal_storage = attach_thermal_storage(&mut tree, &candidates, config.ts_penetration, &tech, &mut rng).len();
    }

    stats.recorders = attach_recorders(&mut tree, &case.code().to_string(), &swing, options, &tech);
    tracing::info!(
        houses = stats.houses,
        commercial_zones = stats.commercial_zones,
        records = tree.len(),
        "population complete"
    );
    Ok(PopulateOutput { tree, diagnostics, stats })
}
