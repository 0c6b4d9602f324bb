use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::{Context, Result};
use fdr_core::topology::FeederGraph;
use fdr_core::{Diagnostics, FdrError, ImportStats, ObjectLibrary, ObjectTree, Record};

use super::equipment::{
    average_spacing, cable_records, default_overhead_set, fix_name, format_complex,
    geometric_spacing, mask_letters, overhead_conductor, phase_letters, phase_mask,
    regulator_configuration, spct_configuration, substation_configuration,
    transformer_configuration, M2FT,
};
use super::tables::{CustomerLoadRow, GisDatabase, OverheadByPhaseRow};
use super::{phases, voltage};

/// Imported feeder plus everything worth reporting about the import.
#[derive(Debug)]
pub struct ImportResult {
    pub tree: ObjectTree,
    pub diagnostics: Diagnostics,
    pub stats: ImportStats,
    /// Name of the SWING meter
    pub swing: String,
    /// Line-to-neutral feeder voltage in volts
    pub feeder_vln: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceKind {
    Underground,
    Overhead,
    Regulator,
    Recloser,
    Sectionalizer,
    Switch,
    Fuse,
    Capacitor,
    Load,
    Transformer,
    Unknown(u32),
}

impl DeviceKind {
    fn from_code(code: u32) -> Self {
        match code {
            1 => DeviceKind::Underground,
            3 => DeviceKind::Overhead,
            4 => DeviceKind::Regulator,
            10 => DeviceKind::Recloser,
            12 => DeviceKind::Sectionalizer,
            13 => DeviceKind::Switch,
            14 => DeviceKind::Fuse,
            17 => DeviceKind::Capacitor,
            20 => DeviceKind::Load,
            47 | 48 => DeviceKind::Transformer,
            other => DeviceKind::Unknown(other),
        }
    }

    fn is_line(self) -> bool {
        matches!(self, DeviceKind::Underground | DeviceKind::Overhead)
    }

    fn is_shunt(self) -> bool {
        matches!(self, DeviceKind::Capacitor | DeviceKind::Load)
    }
}

#[derive(Debug, Clone)]
struct Section {
    from: String,
    to: String,
    /// Phase letters plus N
    phases: String,
}

#[derive(Debug, Clone)]
struct Device {
    name: String,
    /// Device number the equipment tables know this device by
    base: String,
    kind: DeviceKind,
    section: String,
    location: u8,
    from: String,
    to: String,
    phases: String,
    /// Created by the importer, so no table row describes it
    synthetic: bool,
    length_scale: f64,
}

type OverheadKey = ([Option<String>; 4], String);

/// Customer load accumulated over all rows of one device.
#[derive(Debug, Clone, Default)]
struct LoadAccumulator {
    phases: BTreeMap<char, (f64, f64)>,
    class: Option<String>,
}

/// Read a GIS export directory and build a flat feeder tree.
pub fn import_gis(
    network_dir: &std::path::Path,
    equipment_dir: Option<&std::path::Path>,
) -> Result<ImportResult> {
    let db = GisDatabase::from_dir(network_dir, equipment_dir)?;
    import_database(&db).with_context(|| format!("importing GIS export {}", network_dir.display()))
}

/// Build a feeder tree from already loaded tables.
pub fn import_database(db: &GisDatabase) -> Result<ImportResult> {
    let mut importer = Importer::new(db)?;
    importer.collect_devices();
    importer.split_embedded_devices();
    importer.split_parallel_links();
    let mut tree = importer.build_tree()?;

    let lib = ObjectLibrary::global();
    voltage::propagate(&mut tree, lib, &importer.swing, importer.feeder_vln, &mut importer.diagnostics);
    importer.stats.islanded_nodes = remove_islands(&mut tree, lib, &importer.swing, &mut importer.diagnostics);
    phases::normalize(&mut tree, lib, &mut importer.diagnostics);
    tree.reindex();

    let mut stats = importer.stats;
    stats.nodes = tree.count_kind("node") + tree.count_kind("meter");
    stats.links = tree
        .iter()
        .filter(|(_, r)| r.kind.object_kind().is_some_and(|k| lib.is_link(k)))
        .count();
    stats.configurations = tree
        .iter()
        .filter(|(_, r)| {
            r.kind.object_kind().and_then(|k| lib.class_of(k))
                == Some(fdr_core::KindClass::Configuration)
        })
        .count();
    stats.loads = tree.count_kind("triplex_node") + tree.count_kind("load");
    stats.capacitors = tree.count_kind("capacitor");

    tracing::info!(
        nodes = stats.nodes,
        links = stats.links,
        islanded = stats.islanded_nodes,
        "GIS import complete"
    );

    Ok(ImportResult {
        tree,
        diagnostics: importer.diagnostics,
        stats,
        swing: importer.swing,
        feeder_vln: importer.feeder_vln,
    })
}

struct Importer<'a> {
    db: &'a GisDatabase,
    diagnostics: Diagnostics,
    stats: ImportStats,
    swing: String,
    feeder_vln: f64,
    sections: BTreeMap<String, Section>,
    devices: Vec<Device>,
    device_names: HashSet<String>,
    coordinates: HashMap<String, (f64, f64)>,
    raw_coordinates: HashMap<String, (f64, f64)>,
}

impl<'a> Importer<'a> {
    fn new(db: &'a GisDatabase) -> Result<Self> {
        let source = match db.sources.as_slice() {
            [one] => one,
            [] => return Err(FdrError::Validation("GIS export has no source".into()).into()),
            many => {
                return Err(FdrError::Validation(format!(
                    "GIS export has {} sources, expected exactly one",
                    many.len()
                ))
                .into())
            }
        };
        let feeder_vln = source.desired_voltage * 1000.0 / 3f64.sqrt();

        let device_names: HashSet<String> =
            db.section_devices.iter().map(|d| fix_name(&d.device_number)).collect();
        let node_name = |raw: &str| {
            let fixed = fix_name(raw);
            if device_names.contains(&fixed) {
                format!("n{fixed}")
            } else {
                fixed
            }
        };

        let mut diagnostics = Diagnostics::new();
        let mut sections = BTreeMap::new();
        for (i, row) in db.sections.iter().enumerate() {
            let Some(letters) = phase_letters(row.phase) else {
                diagnostics.add_warning_at_row(
                    "section",
                    &format!("section {} has unknown phase code {}", row.section_id, row.phase),
                    i + 1,
                );
                continue;
            };
            let from = node_name(&row.from_node_id);
            let to = node_name(&row.to_node_id);
            if from.is_empty() || to.is_empty() || from == to {
                diagnostics.add_warning_with_entity(
                    "section",
                    "malformed section dropped",
                    &row.section_id,
                );
                continue;
            }
            sections.insert(
                fix_name(&row.section_id),
                Section { from, to, phases: format!("{letters}N") },
            );
        }

        let (coordinates, raw_coordinates) = scale_coordinates(db, &node_name);

        Ok(Self {
            db,
            diagnostics,
            stats: ImportStats::default(),
            swing: node_name(&source.node_id),
            feeder_vln,
            sections,
            devices: Vec::new(),
            device_names,
            coordinates,
            raw_coordinates,
        })
    }

    fn collect_devices(&mut self) {
        for (i, row) in self.db.section_devices.iter().enumerate() {
            let section_id = fix_name(&row.section_id);
            let Some(section) = self.sections.get(&section_id) else {
                self.diagnostics.add_warning_at_row(
                    "device",
                    &format!("device {} references unknown section {}", row.device_number, row.section_id),
                    i + 1,
                );
                continue;
            };
            let kind = DeviceKind::from_code(row.device_type);
            if let DeviceKind::Unknown(code) = kind {
                self.diagnostics.add_warning_with_entity(
                    "device",
                    &format!("unrecognized device type {code}, modelled as a closed switch"),
                    &row.device_number,
                );
            }
            self.devices.push(Device {
                name: fix_name(&row.device_number),
                base: fix_name(&row.device_number),
                kind,
                section: section_id,
                location: row.location,
                from: section.from.clone(),
                to: section.to.clone(),
                phases: section.phases.clone(),
                synthetic: false,
                length_scale: 1.0,
            });
        }

        let carried: HashSet<&str> = self
            .devices
            .iter()
            .filter(|d| !d.kind.is_shunt())
            .map(|d| d.section.as_str())
            .collect();
        let mut defaults = Vec::new();
        for (id, section) in &self.sections {
            if carried.contains(id.as_str()) {
                continue;
            }
            let mut name = id.clone();
            if self.device_names.contains(&name) {
                name.push_str("_line");
            }
            defaults.push(Device {
                base: name.clone(),
                name,
                kind: DeviceKind::Overhead,
                section: id.clone(),
                location: 0,
                from: section.from.clone(),
                to: section.to.clone(),
                phases: section.phases.clone(),
                synthetic: true,
                length_scale: 1.0,
            });
        }
        self.devices.extend(defaults);
    }

    /// A link device sharing a section with a line gets its own stretch of
    /// that section through a synthetic node.
    fn split_embedded_devices(&mut self) {
        let mut by_section: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, dev) in self.devices.iter().enumerate() {
            if !dev.kind.is_shunt() {
                by_section.entry(dev.section.clone()).or_default().push(i);
            }
        }
        for indices in by_section.values() {
            let Some(&line) = indices.iter().find(|&&i| self.devices[i].kind.is_line()) else {
                continue;
            };
            for &i in indices {
                if self.devices[i].kind.is_line() {
                    continue;
                }
                let node = format!("node{}", self.devices[i].name);
                if self.devices[i].location == 1 {
                    self.devices[i].from = self.devices[line].from.clone();
                    self.devices[i].to = node.clone();
                    self.devices[line].from = node;
                } else {
                    self.devices[i].from = node.clone();
                    self.devices[i].to = self.devices[line].to.clone();
                    self.devices[line].to = node;
                }
                self.devices[i].phases = self.devices[i].phases.replace(['N', 'D'], "");
                self.stats.split_devices += 1;
            }
        }
    }

    /// Every link after the first between the same pair of nodes is routed
    /// through its own `parNode`.
    fn split_parallel_links(&mut self) {
        let mut seen: HashMap<(String, String), usize> = HashMap::new();
        let mut parallel = Vec::new();
        for (i, dev) in self.devices.iter().enumerate() {
            if dev.kind.is_shunt() {
                continue;
            }
            let pair = if dev.from <= dev.to {
                (dev.from.clone(), dev.to.clone())
            } else {
                (dev.to.clone(), dev.from.clone())
            };
            if seen.insert(pair, i).is_some() {
                parallel.push(i);
            }
        }
        for i in parallel {
            let original = self.devices[i].clone();
            let par_node = format!("{}parNode", original.name);
            let mut second = original.clone();
            second.from = par_node.clone();
            second.name = format!("{}par2", original.name);
            if original.kind.is_line() {
                self.devices[i].name = format!("{}par1", original.name);
                self.devices[i].length_scale *= 0.5;
                second.length_scale *= 0.5;
            } else {
                second.kind = DeviceKind::Switch;
                second.synthetic = true;
            }
            self.devices[i].to = par_node;
            self.devices.push(second);
            self.stats.parallel_links += 1;
            self.diagnostics.add_warning_with_entity(
                "topology",
                "parallel link split through a midpoint node",
                &original.name,
            );
        }
    }

    fn build_tree(&mut self) -> Result<ObjectTree> {
        let db = self.db;
        let mut b = Buckets::default();
        b.config(substation_configuration(self.feeder_vln));

        let overhead: HashMap<String, &OverheadByPhaseRow> = db
            .overhead_by_phase
            .iter()
            .map(|r| (fix_name(&r.device_number), r))
            .collect();
        let mut overhead_configs: Vec<(OverheadKey, String)> = Vec::new();

        let mut node_order: Vec<String> = vec![self.swing.clone()];
        let mut node_seen: HashSet<String> = node_order.iter().cloned().collect();

        let devices = self.devices.clone();
        for dev in devices.iter().filter(|d| !d.kind.is_shunt()) {
            for end in [&dev.from, &dev.to] {
                if node_seen.insert(end.clone()) {
                    node_order.push(end.clone());
                }
            }
            match dev.kind {
                DeviceKind::Overhead if dev.synthetic => {
                    if !b.names.contains("default_line_config") {
                        for rec in default_overhead_set() {
                            b.config(rec);
                        }
                    }
                    let length = self.default_length(&dev.section) * dev.length_scale;
                    b.links.push(line_record("overhead_line", dev, length, "default_line_config"));
                }
                DeviceKind::Overhead => {
                    let row = overhead.get(&dev.base).ok_or_else(|| {
                        FdrError::MissingReference(format!("overhead line {}", dev.name))
                    })?;
                    let config = self.overhead_configuration(row, &mut overhead_configs, &mut b)?;
                    let mut length = row.length * M2FT;
                    if length == 0.0 {
                        length = 1.0;
                    }
                    b.links.push(line_record("overhead_line", dev, length * dev.length_scale, &config));
                }
                DeviceKind::Underground => self.underground(dev, &mut b)?,
                DeviceKind::Regulator => self.regulator(dev, &mut b)?,
                DeviceKind::Transformer => self.transformer(dev, &mut b)?,
                DeviceKind::Switch | DeviceKind::Unknown(_) => {
                    self.expect_row(&db.switches, dev, "switch");
                    let mut rec = link_record("switch", dev)
                        .with("status", "CLOSED")
                        .with("operating_mode", "BANKED");
                    for ph in letters_of(&dev.phases) {
                        rec.set(format!("phase_{ph}_state"), "CLOSED");
                    }
                    b.links.push(rec);
                }
                DeviceKind::Fuse => {
                    self.expect_row(&db.fuses, dev, "fuse");
                    let mut rec = link_record("fuse", dev)
                        .with("current_limit", "9999")
                        .with("mean_replacement_time", "3600");
                    for ph in letters_of(&dev.phases) {
                        rec.set(format!("phase_{ph}_status"), "GOOD");
                    }
                    b.links.push(rec);
                }
                DeviceKind::Recloser => {
                    self.expect_row(&db.reclosers, dev, "recloser");
                    b.links.push(
                        link_record("recloser", dev)
                            .with("retry_time", "1")
                            .with("max_number_of_tries", "3")
                            .with("status", "CLOSED"),
                    );
                }
                DeviceKind::Sectionalizer => {
                    self.expect_row(&db.sectionalizers, dev, "sectionalizer");
                    b.links.push(link_record("sectionalizer", dev).with("status", "CLOSED"));
                }
                DeviceKind::Capacitor | DeviceKind::Load => {}
            }
        }

        for dev in devices.iter().filter(|d| d.kind == DeviceKind::Capacitor) {
            self.capacitor(dev, &mut b)?;
        }
        let loads = self.accumulate_loads();
        for dev in devices.iter().filter(|d| d.kind == DeviceKind::Load) {
            match loads.get(&dev.base) {
                Some(acc) => self.customer_load(dev, acc, &mut b),
                None => self.diagnostics.add_warning_with_entity(
                    "load",
                    "load device has no customer load rows",
                    &dev.name,
                ),
            }
        }

        for name in &node_order {
            let mut rec = if *name == self.swing {
                Record::object("meter").with("name", name.as_str()).with("bustype", "SWING")
            } else {
                Record::object("node").with("name", name.as_str())
            };
            let (lat, lon) = self.coordinates.get(name).copied().unwrap_or((0.0, 800.0));
            rec.set("latitude", format!("{lat:.6}"));
            rec.set("longitude", format!("{lon:.6}"));
            b.nodes.push(rec);
        }

        Ok(b.into_tree())
    }

    /// Straight-line length of a section in feet, 1 ft when unknown.
    fn default_length(&self, section: &str) -> f64 {
        let Some(s) = self.sections.get(section) else {
            return 1.0;
        };
        match (self.raw_coordinates.get(&s.from), self.raw_coordinates.get(&s.to)) {
            (Some(a), Some(b)) => {
                let d = ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt() * M2FT;
                if d > 0.0 {
                    d
                } else {
                    1.0
                }
            }
            _ => 1.0,
        }
    }

    fn expect_row(&mut self, rows: &[super::tables::ProtectiveDeviceRow], dev: &Device, table: &str) {
        if dev.synthetic || matches!(dev.kind, DeviceKind::Unknown(_)) {
            return;
        }
        if !rows.iter().any(|r| fix_name(&r.device_number) == dev.base) {
            self.diagnostics.add_warning_with_entity(
                "device",
                &format!("no {table} row, defaults used"),
                &dev.name,
            );
        }
    }

    fn overhead_configuration(
        &mut self,
        row: &OverheadByPhaseRow,
        known: &mut Vec<(OverheadKey, String)>,
        b: &mut Buckets,
    ) -> Result<String> {
        let usable = |id: &Option<String>| {
            id.as_deref()
                .map(fix_name)
                .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("NONE"))
        };
        let conductors = [
            usable(&row.phase_conductor_id_a),
            usable(&row.phase_conductor_id_b),
            usable(&row.phase_conductor_id_c),
            usable(&row.neutral_conductor_id),
        ];
        let spacing = fix_name(&row.conductor_spacing_id);
        let key = (conductors.clone(), spacing.clone());
        if let Some((_, name)) = known.iter().find(|(k, _)| *k == key) {
            return Ok(name.clone());
        }
        let db = self.db;

        for id in conductors.iter().flatten() {
            if b.names.contains(id.as_str()) {
                continue;
            }
            let eq = db
                .conductors
                .iter()
                .find(|c| fix_name(&c.equipment_id) == *id)
                .ok_or_else(|| FdrError::MissingReference(format!("conductor {id}")))?;
            b.config(overhead_conductor(eq));
        }
        if !b.names.contains(spacing.as_str()) {
            let rec = if let Some(g) = db
                .geometric_arrangements
                .iter()
                .find(|g| fix_name(&g.equipment_id) == spacing)
            {
                geometric_spacing(g)
            } else if let Some(a) = db
                .average_arrangements
                .iter()
                .find(|a| fix_name(&a.equipment_id) == spacing)
            {
                average_spacing(a)
            } else {
                return Err(FdrError::MissingReference(format!("line spacing {spacing}")).into());
            };
            b.config(rec);
        }

        let name = format!("olc{}", known.len());
        let mut cfg = Record::object("line_configuration").with("name", name.as_str());
        for (attr, id) in ["conductor_A", "conductor_B", "conductor_C", "conductor_N"]
            .iter()
            .zip(conductors.iter())
        {
            if let Some(id) = id {
                cfg.set(*attr, id.as_str());
            }
        }
        cfg.set("spacing", spacing);
        b.config(cfg);
        known.push((key, name.clone()));
        Ok(name)
    }

    fn underground(&mut self, dev: &Device, b: &mut Buckets) -> Result<()> {
        let row = self
            .db
            .underground_lines
            .iter()
            .find(|r| fix_name(&r.device_number) == dev.base)
            .ok_or_else(|| FdrError::MissingReference(format!("underground line {}", dev.name)))?;
        let cable_id = fix_name(&row.cable_id);
        let cable = self
            .db
            .cables
            .iter()
            .find(|c| fix_name(&c.equipment_id) == cable_id)
            .ok_or_else(|| FdrError::MissingReference(format!("underground cable {cable_id}")))?;
        let (conductor, spacing) = cable_records(cable);
        let conductor_name = conductor.name().unwrap_or_default().to_string();
        let spacing_name = spacing.name().unwrap_or_default().to_string();
        b.config(conductor);
        b.config(spacing);

        let letters = mask_letters(phase_mask(&dev.phases));
        let config_name = format!("{cable_id}ph{letters}");
        if !b.names.contains(config_name.as_str()) {
            let mut cfg = Record::object("line_configuration").with("name", config_name.as_str());
            for ph in letters.chars() {
                cfg.set(format!("conductor_{ph}"), conductor_name.as_str());
            }
            cfg.set("spacing", spacing_name);
            b.config(cfg);
        }
        let mut length = row.length * M2FT;
        if length == 0.0 {
            length = 1.0;
        }
        let mut link = line_record("underground_line", dev, length * dev.length_scale, &config_name);
        link.set("phases", letters);
        b.links.push(link);
        Ok(())
    }

    fn regulator(&mut self, dev: &Device, b: &mut Buckets) -> Result<()> {
        let row = self
            .db
            .regulators
            .iter()
            .find(|r| fix_name(&r.device_number) == dev.base)
            .ok_or_else(|| FdrError::MissingReference(format!("regulator {}", dev.name)))?;
        let equipment = fix_name(&row.equipment_id);
        let taps = self
            .db
            .regulator_equipment
            .iter()
            .find(|e| fix_name(&e.equipment_id) == equipment)
            .map(|e| e.number_of_taps)
            .unwrap_or(32);
        let config_name = if equipment == dev.name {
            format!("{equipment}cfg")
        } else {
            equipment
        };
        if !b.names.contains(config_name.as_str()) {
            let tap_pos = [
                row.tap_position_a.unwrap_or(0),
                row.tap_position_b.unwrap_or(0),
                row.tap_position_c.unwrap_or(0),
            ];
            b.config(regulator_configuration(
                &config_name,
                row.band_width,
                row.boost_percent,
                taps,
                tap_pos,
                self.feeder_vln,
            ));
        }
        b.links.push(link_record("regulator", dev).with("configuration", config_name));
        Ok(())
    }

    fn transformer(&mut self, dev: &Device, b: &mut Buckets) -> Result<()> {
        let row = self
            .db
            .transformers
            .iter()
            .find(|r| fix_name(&r.device_number) == dev.base)
            .ok_or_else(|| FdrError::MissingReference(format!("transformer {}", dev.name)))?;
        let equipment = fix_name(&row.equipment_id);
        let eq = self
            .db
            .transformer_equipment
            .iter()
            .find(|e| fix_name(&e.equipment_id) == equipment)
            .ok_or_else(|| FdrError::MissingReference(format!("transformer equipment {equipment}")))?;
        let letters = mask_letters(phase_mask(&dev.phases));
        let config_name = format!("{equipment}_{letters}");
        if !b.names.contains(config_name.as_str()) {
            b.config(transformer_configuration(eq, &config_name, &letters));
        }
        b.links.push(link_record("transformer", dev).with("configuration", config_name));
        Ok(())
    }

    fn capacitor(&mut self, dev: &Device, b: &mut Buckets) -> Result<()> {
        let row = self
            .db
            .shunt_capacitors
            .iter()
            .find(|r| fix_name(&r.device_number) == dev.base)
            .ok_or_else(|| FdrError::MissingReference(format!("shunt capacitor {}", dev.name)))?;
        let parent = if dev.location == 2 { &dev.to } else { &dev.from };
        let letters = phase_letters(row.phase)
            .map(str::to_string)
            .unwrap_or_else(|| mask_letters(phase_mask(&dev.phases)));
        let per_phase_zero = row.kvar_a == 0.0 && row.kvar_b == 0.0 && row.kvar_c == 0.0;
        let control = match row.control_type {
            2 => "VAR",
            3 => "CURRENT",
            7 => "VOLT",
            _ => "MANUAL",
        };
        let closed = row.status != Some(0);
        let mut rec = Record::object("capacitor")
            .with("name", dev.name.as_str())
            .with("parent", parent.as_str())
            .with("phases", letters.as_str())
            .with("pt_phase", letters.as_str())
            .with("phases_connected", letters.as_str());
        for (ph, kvar) in [('A', row.kvar_a), ('B', row.kvar_b), ('C', row.kvar_c)] {
            if !letters.contains(ph) {
                continue;
            }
            let kvar = if per_phase_zero { row.kvar_abc / 3.0 } else { kvar };
            rec.set(format!("capacitor_{ph}"), format!("{:.6}", kvar * 1000.0));
            rec.set(format!("switch{ph}"), if closed { "CLOSED" } else { "OPEN" });
        }
        rec.set("control", control);
        match control {
            "VOLT" => {
                rec.set("voltage_set_low", format!("{}", row.on_value));
                rec.set("voltage_set_high", format!("{}", row.off_value));
            }
            "VAR" => {
                rec.set("VAr_set_high", format!("{}", row.on_value * 1000.0));
                rec.set("VAr_set_low", format!("{}", row.off_value * 1000.0));
            }
            "CURRENT" => {
                rec.set("current_set_high", format!("{}", row.on_value));
                rec.set("current_set_low", format!("{}", row.off_value));
            }
            _ => {}
        }
        if row.kvln > 0.0 {
            rec.set("cap_nominal_voltage", format!("{:.3}", row.kvln * 1000.0));
        }
        b.shunts.push(rec);
        Ok(())
    }

    fn accumulate_loads(&mut self) -> HashMap<String, LoadAccumulator> {
        let mut loads: HashMap<String, LoadAccumulator> = HashMap::new();
        for (i, row) in self.db.customer_loads.iter().enumerate() {
            let name = fix_name(&row.device_number);
            if !self.device_names.contains(&name) {
                self.diagnostics.add_warning_at_row(
                    "load",
                    &format!("customer load {} has no section device", row.device_number),
                    i + 1,
                );
                continue;
            }
            let Some(letters) = phase_letters(row.phase) else {
                self.diagnostics.add_warning_at_row(
                    "load",
                    &format!("customer load {} has unknown phase code {}", row.device_number, row.phase),
                    i + 1,
                );
                continue;
            };
            let (re, im) = determine_load(row);
            let share = letters.len() as f64;
            let acc = loads.entry(name).or_default();
            for ph in letters.chars() {
                let slot = acc.phases.entry(ph).or_insert((0.0, 0.0));
                slot.0 += re / share;
                slot.1 += im / share;
            }
            if acc.class.is_none() {
                acc.class = Some(load_class(&row.consumer_class_id));
            }
        }
        loads
    }

    fn customer_load(&mut self, dev: &Device, acc: &LoadAccumulator, b: &mut Buckets) {
        let parent = if dev.location == 2 { &dev.to } else { &dev.from };
        let class = acc.class.clone().unwrap_or_else(|| "R".to_string());
        if class.starts_with('C') {
            let letters: String = acc.phases.keys().collect();
            let mut rec = Record::object("load")
                .with("name", dev.name.as_str())
                .with("parent", parent.as_str())
                .with("phases", format!("{letters}N"))
                .with("load_class", class.as_str());
            for (ph, (re, im)) in &acc.phases {
                rec.set(format!("constant_power_{ph}"), format_complex(*re, *im));
            }
            b.shunts.push(rec);
            return;
        }

        for (ph, (re, im)) in &acc.phases {
            if *re == 0.0 && *im == 0.0 {
                continue;
            }
            let kva = (re * re + im * im).sqrt() / 1000.0;
            let config = format!("SPCTconfig{}{}", dev.name, ph);
            let tpm = format!("tpm{}{}", dev.name, ph);
            b.config(spct_configuration(&config, *ph, kva, self.feeder_vln));
            b.links.push(
                Record::object("transformer")
                    .with("name", format!("SPCT{}{}", dev.name, ph))
                    .with("phases", format!("{ph}S"))
                    .with("from", parent.as_str())
                    .with("to", tpm.as_str())
                    .with("configuration", config),
            );
            b.shunts.push(
                Record::object("triplex_meter")
                    .with("name", tpm.as_str())
                    .with("phases", format!("{ph}S"))
                    .with("nominal_voltage", "120"),
            );
            b.shunts.push(
                Record::object("triplex_node")
                    .with("name", format!("tpn{}{}", dev.name, ph))
                    .with("parent", tpm.as_str())
                    .with("phases", format!("{ph}S"))
                    .with("nominal_voltage", "120")
                    .with("power_12", format_complex(*re, *im))
                    .with("load_class", class.as_str()),
            );
        }
    }
}

/// Records grouped by role so the output lists configurations, then
/// buses, then links, then shunt devices.
#[derive(Default)]
struct Buckets {
    configs: Vec<Record>,
    nodes: Vec<Record>,
    links: Vec<Record>,
    shunts: Vec<Record>,
    names: HashSet<String>,
}

impl Buckets {
    /// Add a configuration once per name.
    fn config(&mut self, rec: Record) {
        if let Some(name) = rec.name() {
            if !self.names.insert(name.to_string()) {
                return;
            }
        }
        self.configs.push(rec);
    }

    fn into_tree(self) -> ObjectTree {
        self.configs
            .into_iter()
            .chain(self.nodes)
            .chain(self.links)
            .chain(self.shunts)
            .collect()
    }
}

fn link_record(kind: &str, dev: &Device) -> Record {
    Record::object(kind)
        .with("name", dev.name.as_str())
        .with("phases", dev.phases.as_str())
        .with("from", dev.from.as_str())
        .with("to", dev.to.as_str())
}

fn line_record(kind: &str, dev: &Device, length_ft: f64, config: &str) -> Record {
    link_record(kind, dev)
        .with("length", format!("{length_ft:.6}"))
        .with("configuration", config)
}

fn letters_of(phases: &str) -> impl Iterator<Item = char> + '_ {
    phases.chars().filter(|c| matches!(c, 'A' | 'B' | 'C'))
}

/// Real and reactive power in W / VAr for one customer load row.
fn determine_load(row: &CustomerLoadRow) -> (f64, f64) {
    let (v1, v2) = (row.load_value1, row.load_value2);
    let (mut re, mut im) = match row.load_value_type {
        0 => (v1 * 1000.0, v2.abs() * 1000.0),
        1 => {
            let pf = (v2.abs() / 100.0).min(1.0);
            (v1 * pf * 1000.0, v1 * (1.0 - pf * pf).sqrt() * 1000.0)
        }
        _ => {
            let pf = (v2.abs() / 100.0).min(1.0);
            let re = v1 * 1000.0;
            let im = if pf > 0.0 { re / pf * (1.0 - pf * pf).sqrt() } else { 0.0 };
            (re, im)
        }
    };
    if re == 0.0 && im == 0.0 && row.connected_kva > 0.0 {
        let pf = if v2 != 0.0 { (v2.abs() / 100.0).min(1.0) } else { 0.95 };
        re = row.connected_kva * pf * 1000.0;
        im = row.connected_kva * (1.0 - pf * pf).sqrt() * 1000.0;
    }
    if v2 < 0.0 {
        im = -im;
    }
    (re, im)
}

/// `R`/`C` or an exact `ResidentialN`/`CommercialN` class code.
fn load_class(raw: &str) -> String {
    let trimmed = raw.trim();
    let exact = (1..=6).map(|i| format!("Residential{i}")).chain((1..=3).map(|i| format!("Commercial{i}")));
    for code in exact {
        if trimmed == code {
            return code;
        }
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.contains("commercial") {
        "C".to_string()
    } else {
        "R".to_string()
    }
}

type Coordinates = HashMap<String, (f64, f64)>;

/// Scale node coordinates into a 1200×800 canvas with the y axis flipped.
/// Returns the scaled and the raw coordinates keyed by final node name.
fn scale_coordinates(db: &GisDatabase, node_name: &dyn Fn(&str) -> String) -> (Coordinates, Coordinates) {
    let mut raw = HashMap::new();
    let mut scaled = HashMap::new();
    if db.nodes.is_empty() {
        return (scaled, raw);
    }
    let (mut min_x, mut max_x, mut min_y, mut max_y) =
        (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY);
    for n in &db.nodes {
        min_x = min_x.min(n.x);
        max_x = max_x.max(n.x);
        min_y = min_y.min(n.y);
        max_y = max_y.max(n.y);
    }
    let x_scale = if max_x > min_x { 1200.0 / (max_x - min_x) } else { 0.0 };
    let y_scale = if max_y > min_y { 800.0 / (max_y - min_y) } else { 0.0 };
    let x_b = -x_scale * min_x;
    let y_b = -y_scale * min_y;
    for n in &db.nodes {
        let name = node_name(&n.node_id);
        raw.insert(name.clone(), (n.x, n.y));
        scaled.insert(name, (x_scale * n.x + x_b, 800.0 - (y_scale * n.y + y_b)));
    }
    (scaled, raw)
}

/// Remove every record the source cannot reach. Returns the number of
/// dropped buses.
fn remove_islands(
    tree: &mut ObjectTree,
    lib: &ObjectLibrary,
    swing: &str,
    diagnostics: &mut Diagnostics,
) -> usize {
    let graph = FeederGraph::from_tree(tree, lib);
    let islanded: HashSet<String> = graph.islanded(swing).into_iter().collect();
    if islanded.is_empty() {
        return 0;
    }
    let touches = |value: Option<&str>| value.is_some_and(|v| islanded.contains(v));
    let doomed: Vec<u64> = tree
        .iter()
        .filter(|(_, r)| touches(r.name()) || touches(r.get("from")) || touches(r.get("to")))
        .map(|(k, _)| k)
        .collect();
    for key in doomed {
        tree.remove(key);
    }
    diagnostics.add_warning(
        "topology",
        &format!("removed {} islanded buses not reachable from {swing}", islanded.len()),
    );
    islanded.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_codes() {
        assert_eq!(DeviceKind::from_code(3), DeviceKind::Overhead);
        assert_eq!(DeviceKind::from_code(48), DeviceKind::Transformer);
        assert_eq!(DeviceKind::from_code(45), DeviceKind::Unknown(45));
        assert!(DeviceKind::Underground.is_line());
        assert!(DeviceKind::Load.is_shunt());
    }

    fn load_row(kind: u8, v1: f64, v2: f64) -> CustomerLoadRow {
        CustomerLoadRow {
            device_number: "L1".into(),
            consumer_class_id: "residential".into(),
            phase: 1,
            load_value_type: kind,
            load_value1: v1,
            load_value2: v2,
            connected_kva: 0.0,
        }
    }

    #[test]
    fn load_value_types() {
        assert_eq!(determine_load(&load_row(0, 5.0, 2.0)), (5000.0, 2000.0));
        let (re, im) = determine_load(&load_row(1, 10.0, 80.0));
        assert!((re - 8000.0).abs() < 1e-9);
        assert!((im - 6000.0).abs() < 1e-9);
        let (re, im) = determine_load(&load_row(2, 8.0, -80.0));
        assert!((re - 8000.0).abs() < 1e-9);
        assert!((im + 6000.0).abs() < 1e-9);
    }

    #[test]
    fn connected_kva_fills_empty_loads() {
        let mut row = load_row(0, 0.0, 0.0);
        row.connected_kva = 10.0;
        let (re, _) = determine_load(&row);
        assert!((re - 9500.0).abs() < 1e-9);
    }

    #[test]
    fn class_codes() {
        assert_eq!(load_class("Residential3"), "Residential3");
        assert_eq!(load_class("Small Commercial"), "C");
        assert_eq!(load_class("residential"), "R");
        assert_eq!(load_class(""), "R");
    }
}
