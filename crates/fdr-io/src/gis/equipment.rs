//! Equipment table conversions: conductors, spacings, cables, regulator and
//! transformer configurations. The export stores lengths in meters and
//! resistances per kilometer; the MDL side wants feet and ohms per mile.

use fdr_core::Record;

use super::tables::{
    AverageArrangementRow, CableRow, ConductorRow, GeometricArrangementRow, TransformerEquipmentRow,
};

/// Meters to feet.
pub const M2FT: f64 = 3.28084;

/// Standard single-phase center-tapped transformer ratings in kVA.
pub const SPCT_RATINGS_KVA: [f64; 36] = [
    5.0, 10.0, 15.0, 25.0, 30.0, 37.5, 50.0, 75.0, 87.5, 100.0, 112.5, 125.0, 137.5, 150.0, 162.5,
    175.0, 187.5, 200.0, 225.0, 250.0, 262.5, 300.0, 337.5, 400.0, 412.5, 450.0, 500.0, 750.0,
    1000.0, 1250.0, 1500.0, 2000.0, 2500.0, 3000.0, 4000.0, 5000.0,
];

/// Replace characters the simulator rejects in object names.
pub fn fix_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' | '\\' | '/' | ':' | '.' | '\'' | '&' => '_',
            other => other,
        })
        .collect()
}

/// Letters for an export phase code (1=A, 2=B, 3=C, 4=AB, 5=AC, 6=BC, 7=ABC).
pub fn phase_letters(code: u8) -> Option<&'static str> {
    match code {
        1 => Some("A"),
        2 => Some("B"),
        3 => Some("C"),
        4 => Some("AB"),
        5 => Some("AC"),
        6 => Some("BC"),
        7 => Some("ABC"),
        _ => None,
    }
}

/// Bitmask A=1, B=2, C=4 of the phase letters in `phases`.
pub fn phase_mask(phases: &str) -> u8 {
    let mut mask = 0;
    if phases.contains('A') {
        mask |= 1;
    }
    if phases.contains('B') {
        mask |= 2;
    }
    if phases.contains('C') {
        mask |= 4;
    }
    mask
}

/// Inverse of [`phase_mask`], always in A, B, C order.
pub fn mask_letters(mask: u8) -> String {
    let mut out = String::new();
    for (bit, letter) in [(1, 'A'), (2, 'B'), (4, 'C')] {
        if mask & bit != 0 {
            out.push(letter);
        }
    }
    out
}

pub fn overhead_conductor(row: &ConductorRow) -> Record {
    // GMR is in cm, R50 in ohm/km.
    let gmr = row.gmr * M2FT / 100.0;
    let resistance = row.r50 * 5280.0 / (M2FT * 1000.0);
    Record::object("overhead_line_conductor")
        .with("name", fix_name(&row.equipment_id))
        .with("geometric_mean_radius", format!("{gmr:.6}"))
        .with("resistance", format!("{resistance:.6}"))
}

fn distance(ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
    ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt() * M2FT
}

/// Spacing from explicit conductor coordinates.
pub fn geometric_spacing(row: &GeometricArrangementRow) -> Record {
    Record::object("line_spacing")
        .with("name", fix_name(&row.equipment_id))
        .with("distance_AB", format!("{:.6}", distance(row.a_x, row.a_y, row.b_x, row.b_y)))
        .with("distance_AC", format!("{:.6}", distance(row.a_x, row.a_y, row.c_x, row.c_y)))
        .with("distance_AN", format!("{:.6}", distance(row.a_x, row.a_y, row.n_x, row.n_y)))
        .with("distance_BC", format!("{:.6}", distance(row.b_x, row.b_y, row.c_x, row.c_y)))
        .with("distance_BN", format!("{:.6}", distance(row.b_x, row.b_y, row.n_x, row.n_y)))
        .with("distance_CN", format!("{:.6}", distance(row.c_x, row.c_y, row.n_x, row.n_y)))
}

/// Spacing from geometric-mean distances when coordinates are unknown.
pub fn average_spacing(row: &AverageArrangementRow) -> Record {
    let pp = format!("{:.6}", row.phase_to_phase * M2FT);
    let pn = format!("{:.6}", row.phase_to_neutral * M2FT);
    Record::object("line_spacing")
        .with("name", fix_name(&row.equipment_id))
        .with("distance_AB", pp.clone())
        .with("distance_AC", pp.clone())
        .with("distance_AN", pn.clone())
        .with("distance_BC", pp)
        .with("distance_BN", pn.clone())
        .with("distance_CN", pn)
}

/// Conductor and spacing records for one underground cable.
pub fn cable_records(row: &CableRow) -> (Record, Record) {
    let id = fix_name(&row.equipment_id);
    let conductor = Record::object("underground_line_conductor")
        .with("name", format!("{id}cond"))
        .with("outer_diameter", row.outer_diameter.to_string())
        .with("conductor_gmr", row.conductor_gmr.to_string())
        .with("conductor_diameter", row.conductor_diameter.to_string())
        .with("conductor_resistance", row.conductor_resistance.to_string())
        .with("neutral_gmr", row.neutral_gmr.to_string())
        .with("neutral_diameter", row.neutral_diameter.to_string())
        .with("neutral_resistance", row.neutral_resistance.to_string())
        .with("neutral_strands", row.neutral_strands.to_string());
    let spacing = Record::object("line_spacing")
        .with("name", format!("{id}sps"))
        .with("distance_AB", row.distance_ab.to_string())
        .with("distance_AC", row.distance_ac.to_string())
        .with("distance_BC", row.distance_bc.to_string());
    (conductor, spacing)
}

/// Conductor, spacing and configuration used for sections that carry no
/// line device in the export.
pub fn default_overhead_set() -> [Record; 3] {
    [
        Record::object("overhead_line_conductor")
            .with("name", "default_conductor")
            .with("geometric_mean_radius", "0.024400")
            .with("resistance", "0.306000"),
        Record::object("line_spacing")
            .with("name", "default_spacing")
            .with("distance_AB", "2.500000")
            .with("distance_AC", "7.000000")
            .with("distance_AN", "5.656854")
            .with("distance_BC", "4.500000")
            .with("distance_BN", "4.272002")
            .with("distance_CN", "5.000000"),
        Record::object("line_configuration")
            .with("name", "default_line_config")
            .with("conductor_A", "default_conductor")
            .with("conductor_B", "default_conductor")
            .with("conductor_C", "default_conductor")
            .with("conductor_N", "default_conductor")
            .with("spacing", "default_spacing"),
    ]
}

/// Series resistance and reactance in per unit from a positive-sequence
/// impedance and X/R ratio.
pub fn transformer_impedance(z_percent: f64, xr_ratio: f64) -> (f64, f64) {
    let z = z_percent / 100.0;
    let r = z / (1.0 + xr_ratio * xr_ratio).sqrt();
    if r == 0.0 {
        return (0.000333, 0.00222);
    }
    (r, r * xr_ratio)
}

/// Three-phase or partial-phase distribution transformer configuration.
pub fn transformer_configuration(eq: &TransformerEquipmentRow, name: &str, phases: &str) -> Record {
    let primary = eq.primary_kvll * 1000.0 / 3f64.sqrt();
    let mut secondary = eq.secondary_kvll * 1000.0 / 3f64.sqrt();
    if secondary == primary {
        secondary += 0.001;
    }
    let (r, x) = transformer_impedance(eq.z1_percent, eq.xr_ratio);
    let count = phases.chars().filter(|c| matches!(c, 'A' | 'B' | 'C')).count().max(1);
    let per_phase = eq.rating_kva / count as f64;
    let mut cfg = Record::object("transformer_configuration")
        .with("name", name)
        .with("connect_type", "WYE_WYE")
        .with("install_type", "PADMOUNT")
        .with("power_rating", format!("{:.0}", eq.rating_kva));
    for ph in ['A', 'B', 'C'] {
        if phases.contains(ph) {
            cfg.set(format!("power{ph}_rating"), format!("{per_phase:.6}"));
        }
    }
    cfg.set("primary_voltage", format!("{primary:.6}"));
    cfg.set("secondary_voltage", format!("{secondary:.6}"));
    cfg.set("impedance", format!("{r:.6}{x:+.6}j"));
    cfg
}

/// Substation configuration sized from the feeder voltage.
pub fn substation_configuration(feeder_vln: f64) -> Record {
    Record::object("transformer_configuration")
        .with("name", "substation_config")
        .with("connect_type", "WYE_WYE")
        .with("install_type", "PADMOUNT")
        .with("power_rating", "16100")
        .with("primary_voltage", format!("{feeder_vln:.6}"))
        .with("secondary_voltage", format!("{feeder_vln:.6}"))
        .with("impedance", "0.010000+0.100000j")
}

/// Smallest standard center-tapped rating that carries `kva`, or the largest
/// rating when none does.
pub fn spct_rating(kva: f64) -> f64 {
    SPCT_RATINGS_KVA
        .iter()
        .copied()
        .find(|r| *r >= kva)
        .unwrap_or(SPCT_RATINGS_KVA[SPCT_RATINGS_KVA.len() - 1])
}

pub fn spct_configuration(name: &str, phase: char, kva: f64, primary_vln: f64) -> Record {
    Record::object("transformer_configuration")
        .with("name", name)
        .with("connect_type", "SINGLE_PHASE_CENTER_TAPPED")
        .with("install_type", "POLETOP")
        .with("power_rating", format!("{}", spct_rating(kva)))
        .with(format!("power{phase}_rating"), format!("{}", spct_rating(kva)))
        .with("primary_voltage", format!("{primary_vln:.3}"))
        .with("secondary_voltage", "120")
        .with("impedance", "0.00033+0.0022j")
}

/// Regulator configuration: band width is converted from a 120 V base to a
/// fraction and later rescaled to the regulated bus voltage.
pub fn regulator_configuration(
    name: &str,
    band_width_120: f64,
    boost_percent: f64,
    taps: u32,
    tap_pos: [i32; 3],
    feeder_vln: f64,
) -> Record {
    let half = (taps as f64 * 0.5) as u32;
    Record::object("regulator_configuration")
        .with("name", name)
        .with("connect_type", "WYE_WYE")
        .with("band_center", format!("{feeder_vln:.6}"))
        .with("band_width", format!("{:.6}", band_width_120 / 120.0))
        .with("time_delay", "30.0")
        .with("raise_taps", half.to_string())
        .with("lower_taps", half.to_string())
        .with("regulation", format!("{:.6}", boost_percent / 100.0))
        .with("Control", "OUTPUT_VOLTAGE")
        .with("Type", "B")
        .with("tap_pos_A", tap_pos[0].to_string())
        .with("tap_pos_B", tap_pos[1].to_string())
        .with("tap_pos_C", tap_pos[2].to_string())
}

/// `{re:.3}+{im:.3}j` with the sign carried on the imaginary part.
pub fn format_complex(re: f64, im: f64) -> String {
    if im < 0.0 {
        format!("{re:.3}-{:.3}j", -im)
    } else {
        format!("{re:.3}+{im:.3}j")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fix_name_replaces_reserved_characters() {
        assert_eq!(fix_name("FDR-1/A.b c:d'e&f\\g"), "FDR_1_A_b_c_d_e_f_g");
    }

    #[test]
    fn phase_helpers() {
        assert_eq!(phase_letters(5), Some("AC"));
        assert_eq!(phase_letters(9), None);
        assert_eq!(phase_mask("CAN"), 5);
        assert_eq!(mask_letters(6), "BC");
    }

    #[test]
    fn conductor_units_convert_to_feet_and_miles() {
        let row = ConductorRow {
            equipment_id: "336 ACSR".into(),
            gmr: 0.7437,
            r50: 0.1902,
        };
        let rec = overhead_conductor(&row);
        assert_eq!(rec.name(), Some("336_ACSR"));
        assert_eq!(rec.get("geometric_mean_radius"), Some("0.024400"));
        let r: f64 = rec.get("resistance").unwrap().parse().unwrap();
        assert!((r - 0.3061).abs() < 1e-3);
    }

    #[test]
    fn impedance_split_and_fallback() {
        let (r, x) = transformer_impedance(5.0, 0.0);
        assert!((r - 0.05).abs() < 1e-12);
        assert_eq!(x, 0.0);
        assert_eq!(transformer_impedance(0.0, 3.0), (0.000333, 0.00222));
    }

    #[test]
    fn spct_rating_rounds_up_to_standard_size() {
        assert_eq!(spct_rating(0.0), 5.0);
        assert_eq!(spct_rating(26.0), 30.0);
        assert_eq!(spct_rating(9_999.0), 5000.0);
    }

    #[test]
    fn regulator_taps_are_split_evenly() {
        let cfg = regulator_configuration("reg1cfg", 2.0, 10.0, 32, [0, 1, -1], 7200.0);
        assert_eq!(cfg.get("raise_taps"), Some("16"));
        assert_eq!(cfg.get("band_width"), Some("0.016667"));
        assert_eq!(cfg.get("regulation"), Some("0.100000"));
        assert_eq!(cfg.get("tap_pos_C"), Some("-1"));
    }

    #[test]
    fn complex_formatting_keeps_sign() {
        assert_eq!(format_complex(1000.0, 250.0), "1000.000+250.000j");
        assert_eq!(format_complex(1000.0, -250.0), "1000.000-250.000j");
    }
}
