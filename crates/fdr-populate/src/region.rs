//! Per-region building stock tables.
//!
//! Every feeder belongs to one of six climate regions. Each region carries
//! shares for nine load classes (Residential1–6, Commercial1–3): thermal
//! sub-class mix, floor area, heating and cooling system mix, water heater
//! mix and thermostat setpoint bins. [`ClassProfile::new`] resolves the
//! tables for one `(region, class)` pair with the configuration knobs
//! already applied.

use anyhow::{bail, Result};
use fdr_core::FdrError;

use crate::config::{FeederConfig, Knob};

/// Number of load classes.
pub const CLASS_COUNT: usize = 9;
/// Number of thermal integrity sub-classes.
pub const SUBCLASS_COUNT: usize = 6;
/// Cooling, heating and water-draw schedule counts in the schedule files.
pub const COOLING_SCHEDULES: u32 = 8;
pub const HEATING_SCHEDULES: u32 = 6;
pub const WATER_SCHEDULES: u32 = 6;

/// One of the nine load classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadClass(usize);

impl LoadClass {
    pub fn new(index: usize) -> Result<Self> {
        if index >= CLASS_COUNT {
            bail!(FdrError::Config(format!("unknown load class {index}; expected 0 to 8")));
        }
        Ok(Self(index))
    }

    pub fn residential(n: usize) -> Result<Self> {
        if !(1..=6).contains(&n) {
            bail!(FdrError::Config(format!("unknown class Residential{n}")));
        }
        Ok(Self(n - 1))
    }

    pub fn commercial(n: usize) -> Result<Self> {
        if !(1..=3).contains(&n) {
            bail!(FdrError::Config(format!("unknown class Commercial{n}")));
        }
        Ok(Self(n + 5))
    }

    pub fn index(self) -> usize {
        self.0
    }

    pub fn is_residential(self) -> bool {
        self.0 < 6
    }

    pub fn label(self) -> String {
        if self.is_residential() {
            format!("Residential{}", self.0 + 1)
        } else {
            format!("Commercial{}", self.0 - 5)
        }
    }

    /// Commercial building archetype, `None` for residential classes.
    pub fn building(self) -> Option<BuildingType> {
        match self.0 {
            6 => Some(BuildingType::StripMall),
            7 => Some(BuildingType::BigBox),
            8 => Some(BuildingType::Office),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildingType {
    Office,
    BigBox,
    StripMall,
}

/// A thermostat setpoint bin: share of homes, night offset and the
/// `(high, low)` band the setpoint is drawn from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetpointBin {
    pub share: f64,
    pub offset: f64,
    pub high: f64,
    pub low: f64,
}

/// Thermal properties of one sub-class.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ThermalProperties {
    pub r_ceiling: f64,
    pub r_wall: f64,
    pub r_floor: f64,
    pub glazing_layers: f64,
    pub glass_type: f64,
    pub glazing_treatment: f64,
    pub window_frame: f64,
    pub r_door: f64,
    pub airchange: f64,
    pub cop_high: f64,
    pub cop_low: f64,
}

/// Region tables resolved for one load class, knobs applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassProfile {
    pub region: u8,
    pub class: LoadClass,
    pub thermal_percentages: [f64; SUBCLASS_COUNT],
    pub thermal_properties: [ThermalProperties; SUBCLASS_COUNT],
    /// Single-family share per sub-class
    pub sfh: [f64; SUBCLASS_COUNT],
    pub floor_area: f64,
    pub one_story: f64,
    pub perc_gas: f64,
    pub perc_pump: f64,
    pub perc_res: f64,
    pub perc_ac: f64,
    pub perc_poolpumps: f64,
    pub wh_electric: f64,
    /// Shares of small / medium / large tanks
    pub wh_size: [f64; 3],
    /// Central and window unit shares
    pub ac_type: [f64; 2],
    /// Central and window unit over-sizing
    pub over_sizing_factor: [f64; 2],
    pub cooling_setpoint: Vec<SetpointBin>,
    pub heating_setpoint: Vec<SetpointBin>,
    pub window_wall_ratio: f64,
    pub addtl_heat_degrees: f64,
    pub residential_skew_std: f64,
    pub residential_skew_shift: f64,
    pub base_load_scalar: f64,
}

// ============================================================================
// Tables
// ============================================================================

/// Thermal sub-class shares for the residential columns of one region:
/// (Res1 = Res3, Res2 = Res4, Res5, Res6).
fn thermal_columns(region: u8) -> ([f64; 5], [f64; 2], [f64; 3], [f64; 3]) {
    match region {
        1 => (
            [0.1652, 0.1486, 0.2238, 0.1780, 0.2841],
            [0.4935, 0.5064],
            [0.0, 0.7535, 0.2462],
            [0.1940, 0.6664, 0.1395],
        ),
        2 => (
            [0.2873, 0.1281, 0.2354, 0.1772, 0.1717],
            [0.3268, 0.6731],
            [0.0, 0.6480, 0.3519],
            [0.2878, 0.5308, 0.1813],
        ),
        3 => (
            [0.1240, 0.0697, 0.2445, 0.2334, 0.3281],
            [0.3529, 0.6470],
            [0.0, 0.6343, 0.3656],
            [0.1079, 0.6316, 0.2604],
        ),
        6 => (
            [0.2184, 0.0818, 0.2390, 0.2049, 0.2556],
            [0.3545, 0.6454],
            [0.0289, 0.6057, 0.3652],
            [0.2919, 0.5169, 0.1911],
        ),
        _ => (
            [0.1470, 0.0942, 0.2253, 0.2311, 0.3022],
            [0.3297, 0.6702],
            [0.0, 0.5958, 0.4041],
            [0.1198, 0.6027, 0.2773],
        ),
    }
}

fn thermal_percentages(region: u8, class: usize) -> [f64; SUBCLASS_COUNT] {
    let (r13, r24, r5, r6) = thermal_columns(region);
    let mut out = [0.0; SUBCLASS_COUNT];
    match class {
        0 | 2 => out[..5].copy_from_slice(&r13),
        1 | 3 => out[..2].copy_from_slice(&r24),
        4 => out[..3].copy_from_slice(&r5),
        5 => out[..3].copy_from_slice(&r6),
        _ => out[0] = 1.0,
    }
    out
}

struct RegionScalars {
    floor_area: [f64; CLASS_COUNT],
    one_story: f64,
    perc_gas: f64,
    perc_pump: f64,
    perc_ac: f64,
    wh_electric: f64,
    wh_size: [f64; 3],
    over_sizing_central: f64,
    perc_poolpumps: f64,
}

fn region_scalars(region: u8) -> RegionScalars {
    let uniform = |a: f64| [a, a, a, a, a, a, a, a, a];
    match region {
        1 => RegionScalars {
            floor_area: [2209.0, 2209.0, 2209.0, 2209.0, 1054.0, 820.0, 0.0, 0.0, 0.0],
            one_story: 0.6887,
            perc_gas: 0.7051,
            perc_pump: 0.0321,
            perc_ac: 0.4348,
            wh_electric: 0.7455,
            wh_size: [0.0, 0.3333, 0.6667],
            over_sizing_central: 0.1,
            perc_poolpumps: 0.0904,
        },
        2 => RegionScalars {
            floor_area: uniform(2951.0),
            one_story: 0.5210,
            perc_gas: 0.8927,
            perc_pump: 0.0177,
            perc_ac: 0.7528,
            wh_electric: 0.7485,
            wh_size: [0.1459, 0.5836, 0.2706],
            over_sizing_central: 0.2,
            perc_poolpumps: 0.0591,
        },
        3 => RegionScalars {
            floor_area: uniform(2370.0),
            one_story: 0.7745,
            perc_gas: 0.6723,
            perc_pump: 0.0559,
            perc_ac: 0.5259,
            wh_electric: 0.6520,
            wh_size: [0.2072, 0.5135, 0.2793],
            over_sizing_central: 0.2,
            perc_poolpumps: 0.0818,
        },
        _ => RegionScalars {
            floor_area: uniform(2655.0),
            one_story: 0.7043,
            perc_gas: 0.4425,
            perc_pump: 0.1983,
            perc_ac: 0.9673,
            wh_electric: 0.3572,
            wh_size: [0.2259, 0.5267, 0.2475],
            over_sizing_central: 0.3,
            perc_poolpumps: 0.0657,
        },
    }
}

const COP_HIGH: [[f64; 6]; SUBCLASS_COUNT] = [
    [2.8, 3.8, 2.8, 3.8, 0.0, 2.8],
    [3.0, 4.0, 3.0, 4.0, 2.8, 3.0],
    [3.2, 0.0, 3.2, 0.0, 3.5, 3.2],
    [3.4, 0.0, 3.4, 0.0, 0.0, 0.0],
    [3.6, 0.0, 3.6, 0.0, 0.0, 0.0],
    [0.0; 6],
];

const COP_LOW: [[f64; 6]; SUBCLASS_COUNT] = [
    [2.4, 3.0, 2.4, 3.0, 0.0, 1.9],
    [2.5, 3.0, 2.5, 3.0, 1.9, 2.0],
    [2.6, 0.0, 2.6, 0.0, 2.2, 2.1],
    [2.8, 0.0, 2.8, 0.0, 0.0, 0.0],
    [3.0, 0.0, 3.0, 0.0, 0.0, 0.0],
    [0.0; 6],
];

/// `[Rceil, Rwall, Rfloor, layers, glass, treatment, frame, Rdoor, airchange]`
fn thermal_rows(class: usize) -> [[f64; 9]; SUBCLASS_COUNT] {
    const ZERO: [f64; 9] = [0.0; 9];
    match class {
        0 | 2 => [
            [16.0, 10.0, 10.0, 1.0, 1.0, 1.0, 1.0, 3.0, 0.75],
            [19.0, 11.0, 12.0, 2.0, 1.0, 1.0, 1.0, 3.0, 0.75],
            [19.0, 14.0, 16.0, 2.0, 1.0, 1.0, 1.0, 3.0, 0.5],
            [30.0, 17.0, 19.0, 2.0, 1.0, 1.0, 2.0, 3.0, 0.5],
            [34.0, 19.0, 20.0, 2.0, 1.0, 1.0, 2.0, 3.0, 0.5],
            ZERO,
        ],
        1 | 3 => [
            [36.0, 22.0, 22.0, 2.0, 2.0, 1.0, 2.0, 5.0, 0.25],
            [48.0, 28.0, 30.0, 3.0, 2.0, 2.0, 4.0, 11.0, 0.25],
            ZERO,
            ZERO,
            ZERO,
            ZERO,
        ],
        4 => [
            ZERO,
            [13.4, 9.2, 11.7, 1.0, 1.0, 1.0, 1.0, 2.2, 0.75],
            [24.1, 11.7, 18.1, 2.0, 2.0, 1.0, 2.0, 3.0, 0.75],
            ZERO,
            ZERO,
            ZERO,
        ],
        5 => [
            [13.4, 11.7, 9.4, 1.0, 1.0, 1.0, 1.0, 2.2, 0.75],
            [20.3, 11.7, 12.7, 2.0, 1.0, 2.0, 2.0, 2.7, 0.25],
            [28.7, 14.3, 12.7, 2.0, 2.0, 3.0, 4.0, 6.3, 0.125],
            ZERO,
            ZERO,
            ZERO,
        ],
        _ => [ZERO; SUBCLASS_COUNT],
    }
}

/// Base `[share, high, low]` bins before the offset knob is applied.
fn cooling_bins(class: usize) -> [[f64; 3]; 6] {
    let shares = match class {
        4 => [0.138, 0.172, 0.172, 0.276, 0.138, 0.103],
        5 => [0.155, 0.207, 0.103, 0.310, 0.155, 0.069],
        _ => [0.098, 0.140, 0.166, 0.306, 0.206, 0.084],
    };
    let bands = [[69.0, 65.0], [70.0, 70.0], [73.0, 71.0], [76.0, 74.0], [79.0, 77.0], [85.0, 80.0]];
    std::array::from_fn(|i| [shares[i], bands[i][0], bands[i][1]])
}

fn heating_bins(class: usize) -> [[f64; 3]; 6] {
    let shares = match class {
        4 => [0.129, 0.177, 0.161, 0.274, 0.081, 0.177],
        5 => [0.085, 0.132, 0.147, 0.279, 0.109, 0.248],
        _ => [0.141, 0.204, 0.231, 0.163, 0.120, 0.141],
    };
    let bands = [[63.0, 59.0], [66.0, 64.0], [69.0, 67.0], [70.0, 70.0], [73.0, 71.0], [79.0, 74.0]];
    std::array::from_fn(|i| [shares[i], bands[i][0], bands[i][1]])
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ============================================================================
// Resolution
// ============================================================================

impl ClassProfile {
    /// Resolve the region tables for one class with `config`'s knobs.
    pub fn new(config: &FeederConfig, class: LoadClass) -> Result<Self> {
        let region = config.region;
        if !(1..=6).contains(&region) {
            bail!(FdrError::Config(format!("unknown region {region}; expected 1 to 6")));
        }
        let c = class.index();
        let scalars = region_scalars(region);
        let residential = class.is_residential();

        let cop_high = config.cop_high_factor();
        let cop_low = config.cop_low_factor();
        let rows = thermal_rows(c);
        let thermal_properties = std::array::from_fn(|i| {
            let r = rows[i];
            let (hi, lo) = if residential { (COP_HIGH[i][c], COP_LOW[i][c]) } else { (0.0, 0.0) };
            ThermalProperties {
                r_ceiling: r[0],
                r_wall: r[1],
                r_floor: r[2],
                glazing_layers: r[3],
                glass_type: r[4],
                glazing_treatment: r[5],
                window_frame: r[6],
                r_door: r[7],
                airchange: r[8],
                cop_high: round2(hi * cop_high),
                cop_low: round2(lo * cop_low),
            }
        });

        let sfh_share = if c < 4 { 1.0 } else { 0.0 };
        let gas_factor = config.gas_factor();
        let perc_gas = scalars.perc_gas * gas_factor;
        let perc_pump = scalars.perc_pump + (1.0 - gas_factor) * scalars.perc_gas;

        let cooling_offset = config.knob(Knob::CoolingOffset);
        let heating_offset = config.knob(Knob::HeatingOffset);
        let to_bins = |rows: [[f64; 3]; 6], offset: f64| {
            rows.iter()
                .map(|r| SetpointBin { share: r[0], offset, high: r[1], low: r[2] })
                .collect::<Vec<_>>()
        };

        Ok(Self {
            region,
            class,
            thermal_percentages: thermal_percentages(region, c),
            thermal_properties,
            sfh: [sfh_share; SUBCLASS_COUNT],
            floor_area: scalars.floor_area[c],
            one_story: scalars.one_story,
            perc_gas,
            perc_pump,
            perc_res: 1.0 - perc_pump - perc_gas,
            perc_ac: scalars.perc_ac,
            perc_poolpumps: scalars.perc_poolpumps,
            wh_electric: scalars.wh_electric,
            wh_size: scalars.wh_size,
            ac_type: [if residential { 1.0 } else { 0.0 }, 0.0],
            over_sizing_factor: [if residential { scalars.over_sizing_central } else { 0.0 }, 0.0],
            cooling_setpoint: to_bins(cooling_bins(c), cooling_offset),
            heating_setpoint: to_bins(heating_bins(c), heating_offset),
            window_wall_ratio: config.knob(Knob::WindowWallRatio),
            addtl_heat_degrees: config.knob(Knob::AddtlHeatDegrees),
            residential_skew_std: config.knob(Knob::SchedSkewStd),
            residential_skew_shift: config.knob(Knob::ResidentialSkewShift),
            base_load_scalar: config.base_load_factor(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(region: u8) -> FeederConfig {
        FeederConfig { region, ..FeederConfig::default() }
    }

    #[test]
    fn thermal_shares_sum_to_about_one() {
        for region in 1..=6 {
            for class in 0..CLASS_COUNT {
                let p = ClassProfile::new(&config(region), LoadClass::new(class).unwrap()).unwrap();
                let total: f64 = p.thermal_percentages.iter().sum();
                assert!((total - 1.0).abs() < 0.01, "region {region} class {class}: {total}");
            }
        }
    }

    #[test]
    fn cop_scalars_are_rounded_and_applied() {
        let mut cfg = config(4);
        cfg.set_knob(Knob::CopHighScalar, 0.1);
        let p = ClassProfile::new(&cfg, LoadClass::residential(1).unwrap()).unwrap();
        assert_eq!(p.thermal_properties[0].cop_high, 3.08);
        assert_eq!(p.thermal_properties[0].cop_low, 2.4);
        assert_eq!(p.thermal_properties[5].cop_high, 0.0);
    }

    #[test]
    fn decrease_gas_moves_share_to_heat_pumps() {
        let mut cfg = config(4);
        cfg.set_knob(Knob::DecreaseGas, 0.5);
        let p = ClassProfile::new(&cfg, LoadClass::new(0).unwrap()).unwrap();
        assert!((p.perc_gas - 0.22125).abs() < 1e-9);
        assert!((p.perc_pump - (0.1983 + 0.22125)).abs() < 1e-9);
        assert!((p.perc_gas + p.perc_pump + p.perc_res - 1.0).abs() < 1e-12);
    }

    #[test]
    fn commercial_classes_have_no_residential_stock() {
        let p = ClassProfile::new(&config(2), LoadClass::commercial(3).unwrap()).unwrap();
        assert_eq!(p.class.building(), Some(BuildingType::Office));
        assert_eq!(p.over_sizing_factor, [0.0, 0.0]);
        assert_eq!(p.thermal_percentages[0], 1.0);
        assert_eq!(p.sfh[0], 0.0);
    }

    #[test]
    fn unknown_region_and_class_are_config_errors() {
        assert!(ClassProfile::new(&config(7), LoadClass::new(0).unwrap()).is_err());
        assert!(LoadClass::new(9).is_err());
        assert!(LoadClass::residential(7).is_err());
        assert_eq!(LoadClass::commercial(1).unwrap().label(), "Commercial1");
    }
}
