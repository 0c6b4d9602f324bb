//! Row types for the GIS CSV export.
//!
//! One file per table, header row required, column names as exported by the
//! CYME-style database (`NodeId`, `FromNodeId`, ...). Only `source.csv` and
//! `section.csv` are mandatory; any other missing table reads as empty.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use serde::de::DeserializeOwned;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SourceRow {
    pub node_id: String,
    #[serde(default)]
    pub network_id: String,
    /// Line-to-line kV
    pub desired_voltage: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NodeRow {
    pub node_id: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SectionRow {
    pub section_id: String,
    pub from_node_id: String,
    pub to_node_id: String,
    /// Phase code 1..=7 (A, B, C, AB, AC, BC, ABC)
    pub phase: u8,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SectionDeviceRow {
    pub device_number: String,
    pub device_type: u32,
    pub section_id: String,
    /// 1 = from end, 2 = to end, 0 = whole section
    #[serde(default)]
    pub location: u8,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OverheadByPhaseRow {
    pub device_number: String,
    #[serde(default)]
    pub phase_conductor_id_a: Option<String>,
    #[serde(default)]
    pub phase_conductor_id_b: Option<String>,
    #[serde(default)]
    pub phase_conductor_id_c: Option<String>,
    #[serde(default)]
    pub neutral_conductor_id: Option<String>,
    pub conductor_spacing_id: String,
    /// Meters
    pub length: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UndergroundLineRow {
    pub device_number: String,
    pub cable_id: String,
    /// Meters
    pub length: f64,
}

/// Switch, sectionalizer, fuse and recloser rows share a shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProtectiveDeviceRow {
    pub device_number: String,
    #[serde(default)]
    pub equipment_id: Option<String>,
    #[serde(default)]
    pub normal_status: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegulatorRow {
    pub device_number: String,
    pub equipment_id: String,
    /// Volts on a 120 V base
    pub band_width: f64,
    pub boost_percent: f64,
    #[serde(default)]
    pub tap_position_a: Option<i32>,
    #[serde(default)]
    pub tap_position_b: Option<i32>,
    #[serde(default)]
    pub tap_position_c: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShuntCapacitorRow {
    #[serde(rename = "DeviceNumber")]
    pub device_number: String,
    #[serde(rename = "Status", default)]
    pub status: Option<u8>,
    #[serde(rename = "Phase")]
    pub phase: u8,
    #[serde(rename = "KVARA", default)]
    pub kvar_a: f64,
    #[serde(rename = "KVARB", default)]
    pub kvar_b: f64,
    #[serde(rename = "KVARC", default)]
    pub kvar_c: f64,
    #[serde(rename = "KVARABC", default)]
    pub kvar_abc: f64,
    #[serde(rename = "KVLN", default)]
    pub kvln: f64,
    #[serde(rename = "CapacitorControlType", default)]
    pub control_type: u8,
    #[serde(rename = "OnValue", default)]
    pub on_value: f64,
    #[serde(rename = "OffValue", default)]
    pub off_value: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomerLoadRow {
    pub device_number: String,
    #[serde(default)]
    pub consumer_class_id: String,
    pub phase: u8,
    /// 0 = kW/kVAR, 1 = kVA/PF, 2 = kW/PF
    pub load_value_type: u8,
    pub load_value1: f64,
    pub load_value2: f64,
    #[serde(rename = "ConnectedKVA", default)]
    pub connected_kva: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransformerRow {
    pub device_number: String,
    pub equipment_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConductorRow {
    #[serde(rename = "EquipmentId")]
    pub equipment_id: String,
    /// cm
    #[serde(rename = "GMR")]
    pub gmr: f64,
    /// Ohm/km
    #[serde(rename = "R50")]
    pub r50: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeometricArrangementRow {
    #[serde(rename = "EquipmentId")]
    pub equipment_id: String,
    #[serde(rename = "ConductorA_Horizontal")]
    pub a_x: f64,
    #[serde(rename = "ConductorA_Vertical")]
    pub a_y: f64,
    #[serde(rename = "ConductorB_Horizontal")]
    pub b_x: f64,
    #[serde(rename = "ConductorB_Vertical")]
    pub b_y: f64,
    #[serde(rename = "ConductorC_Horizontal")]
    pub c_x: f64,
    #[serde(rename = "ConductorC_Vertical")]
    pub c_y: f64,
    #[serde(rename = "NeutralConductor_Horizontal")]
    pub n_x: f64,
    #[serde(rename = "NeutralConductor_Vertical")]
    pub n_y: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AverageArrangementRow {
    #[serde(rename = "EquipmentId")]
    pub equipment_id: String,
    #[serde(rename = "GMDPhaseToPhase")]
    pub phase_to_phase: f64,
    #[serde(rename = "GMDPhaseToNeutral")]
    pub phase_to_neutral: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CableRow {
    pub equipment_id: String,
    pub conductor_resistance: f64,
    #[serde(rename = "ConductorGMR")]
    pub conductor_gmr: f64,
    pub conductor_diameter: f64,
    pub neutral_resistance: f64,
    #[serde(rename = "NeutralGMR")]
    pub neutral_gmr: f64,
    pub neutral_diameter: f64,
    pub neutral_strands: u32,
    pub outer_diameter: f64,
    #[serde(rename = "DistanceAB")]
    pub distance_ab: f64,
    #[serde(rename = "DistanceAC")]
    pub distance_ac: f64,
    #[serde(rename = "DistanceBC")]
    pub distance_bc: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegulatorEquipmentRow {
    pub equipment_id: String,
    pub number_of_taps: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransformerEquipmentRow {
    #[serde(rename = "EquipmentId")]
    pub equipment_id: String,
    #[serde(rename = "NominalRatingKVA")]
    pub rating_kva: f64,
    #[serde(rename = "PrimaryVoltageKVLL")]
    pub primary_kvll: f64,
    #[serde(rename = "SecondaryVoltageKVLL")]
    pub secondary_kvll: f64,
    #[serde(rename = "PosSeqImpedancePercent")]
    pub z1_percent: f64,
    #[serde(rename = "XRRatio")]
    pub xr_ratio: f64,
}

/// Every table of one feeder export.
#[derive(Debug, Clone, Default)]
pub struct GisDatabase {
    pub sources: Vec<SourceRow>,
    pub nodes: Vec<NodeRow>,
    pub sections: Vec<SectionRow>,
    pub section_devices: Vec<SectionDeviceRow>,
    pub overhead_by_phase: Vec<OverheadByPhaseRow>,
    pub underground_lines: Vec<UndergroundLineRow>,
    pub switches: Vec<ProtectiveDeviceRow>,
    pub sectionalizers: Vec<ProtectiveDeviceRow>,
    pub fuses: Vec<ProtectiveDeviceRow>,
    pub reclosers: Vec<ProtectiveDeviceRow>,
    pub regulators: Vec<RegulatorRow>,
    pub shunt_capacitors: Vec<ShuntCapacitorRow>,
    pub customer_loads: Vec<CustomerLoadRow>,
    pub transformers: Vec<TransformerRow>,
    pub conductors: Vec<ConductorRow>,
    pub geometric_arrangements: Vec<GeometricArrangementRow>,
    pub average_arrangements: Vec<AverageArrangementRow>,
    pub cables: Vec<CableRow>,
    pub regulator_equipment: Vec<RegulatorEquipmentRow>,
    pub transformer_equipment: Vec<TransformerEquipmentRow>,
}

impl GisDatabase {
    /// Read a network export directory, taking equipment tables from
    /// `equipment_dir` when given and from the same directory otherwise.
    pub fn from_dir(network_dir: &Path, equipment_dir: Option<&Path>) -> Result<Self> {
        if !network_dir.is_dir() {
            bail!("GIS directory {} does not exist", network_dir.display());
        }
        let eq = equipment_dir.unwrap_or(network_dir);
        Ok(Self {
            sources: read_table(network_dir, "source.csv", true)?,
            nodes: read_table(network_dir, "node.csv", false)?,
            sections: read_table(network_dir, "section.csv", true)?,
            section_devices: read_table(network_dir, "section_device.csv", false)?,
            overhead_by_phase: read_table(network_dir, "overhead_by_phase.csv", false)?,
            underground_lines: read_table(network_dir, "underground_line.csv", false)?,
            switches: read_table(network_dir, "switch.csv", false)?,
            sectionalizers: read_table(network_dir, "sectionalizer.csv", false)?,
            fuses: read_table(network_dir, "fuse.csv", false)?,
            reclosers: read_table(network_dir, "recloser.csv", false)?,
            regulators: read_table(network_dir, "regulator.csv", false)?,
            shunt_capacitors: read_table(network_dir, "shunt_capacitor.csv", false)?,
            customer_loads: read_table(network_dir, "customer_load.csv", false)?,
            transformers: read_table(network_dir, "transformer.csv", false)?,
            conductors: read_table(eq, "eq_conductor.csv", false)?,
            geometric_arrangements: read_table(eq, "eq_geometric_arrangement.csv", false)?,
            average_arrangements: read_table(eq, "eq_average_arrangement.csv", false)?,
            cables: read_table(eq, "eq_cable.csv", false)?,
            regulator_equipment: read_table(eq, "eq_regulator.csv", false)?,
            transformer_equipment: read_table(eq, "eq_transformer.csv", false)?,
        })
    }
}

fn table_path(dir: &Path, file: &str) -> PathBuf {
    dir.join(file)
}

/// Deserialize every row of `dir/file`.
pub fn read_table<T: DeserializeOwned>(dir: &Path, file: &str, required: bool) -> Result<Vec<T>> {
    let path = table_path(dir, file);
    if !path.exists() {
        if required {
            bail!("required GIS table {} is missing", path.display());
        }
        tracing::debug!(table = file, "GIS table absent, treating as empty");
        return Ok(Vec::new());
    }
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(&path)
        .with_context(|| format!("opening GIS table {}", path.display()))?;
    let mut rows = Vec::new();
    for (i, result) in rdr.deserialize().enumerate() {
        let row: T = result.with_context(|| format!("parsing {} row {}", file, i + 1))?;
        rows.push(row);
    }
    Ok(rows)
}
