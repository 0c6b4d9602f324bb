//! Technology cases and the fixed parameters each one populates with.

use serde::{Deserialize, Serialize};

/// Technology case code, `-1..=13`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i32", from = "i32")]
pub enum TechnologyCase {
    LoadShapes,
    Base,
    Cvr,
    Automation,
    Fdir,
    TouCppWithTech,
    TouCppWithoutTech,
    TouWithTech,
    TouWithoutTech,
    Dlc,
    ThermalStorage,
    Phev,
    SolarResidential,
    SolarCommercial,
    SolarCombined,
}

impl TechnologyCase {
    /// Map a case code, clamping it into `-1..=13`.
    pub fn from_code(code: i32) -> Self {
        match code.clamp(-1, 13) {
            -1 => TechnologyCase::LoadShapes,
            0 => TechnologyCase::Base,
            1 => TechnologyCase::Cvr,
            2 => TechnologyCase::Automation,
            3 => TechnologyCase::Fdir,
            4 => TechnologyCase::TouCppWithTech,
            5 => TechnologyCase::TouCppWithoutTech,
            6 => TechnologyCase::TouWithTech,
            7 => TechnologyCase::TouWithoutTech,
            8 => TechnologyCase::Dlc,
            9 => TechnologyCase::ThermalStorage,
            10 => TechnologyCase::Phev,
            11 => TechnologyCase::SolarResidential,
            12 => TechnologyCase::SolarCommercial,
            _ => TechnologyCase::SolarCombined,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            TechnologyCase::LoadShapes => -1,
            TechnologyCase::Base => 0,
            TechnologyCase::Cvr => 1,
            TechnologyCase::Automation => 2,
            TechnologyCase::Fdir => 3,
            TechnologyCase::TouCppWithTech => 4,
            TechnologyCase::TouCppWithoutTech => 5,
            TechnologyCase::TouWithTech => 6,
            TechnologyCase::TouWithoutTech => 7,
            TechnologyCase::Dlc => 8,
            TechnologyCase::ThermalStorage => 9,
            TechnologyCase::Phev => 10,
            TechnologyCase::SolarResidential => 11,
            TechnologyCase::SolarCommercial => 12,
            TechnologyCase::SolarCombined => 13,
        }
    }

    /// Cases accepted as codes but populated like the base case.
    pub fn is_unsupported(self) -> bool {
        matches!(
            self,
            TechnologyCase::Automation
                | TechnologyCase::Fdir
                | TechnologyCase::TouCppWithTech
                | TechnologyCase::TouCppWithoutTech
                | TechnologyCase::TouWithTech
                | TechnologyCase::TouWithoutTech
                | TechnologyCase::Dlc
                | TechnologyCase::Phev
        )
    }

    pub fn uses_load_shapes(self) -> bool {
        self == TechnologyCase::LoadShapes
    }

    pub fn uses_thermal_storage(self) -> bool {
        self == TechnologyCase::ThermalStorage
    }

    pub fn uses_vvc(self) -> bool {
        self == TechnologyCase::Cvr
    }

    pub fn uses_residential_solar(self) -> bool {
        matches!(self, TechnologyCase::SolarResidential | TechnologyCase::SolarCombined)
    }

    pub fn uses_commercial_solar(self) -> bool {
        matches!(self, TechnologyCase::SolarCommercial | TechnologyCase::SolarCombined)
    }

    pub fn uses_solar(self) -> bool {
        self.uses_residential_solar() || self.uses_commercial_solar()
    }
}

impl From<i32> for TechnologyCase {
    fn from(code: i32) -> Self {
        TechnologyCase::from_code(code)
    }
}

impl From<TechnologyCase> for i32 {
    fn from(case: TechnologyCase) -> Self {
        case.code()
    }
}

impl std::fmt::Display for TechnologyCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// ZIP fractions and power factors of one load family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZipFractions {
    pub z_frac: f64,
    pub i_frac: f64,
    pub p_frac: f64,
    pub z_pf: f64,
    pub i_pf: f64,
    pub p_pf: f64,
}

impl ZipFractions {
    fn new(z_frac: f64, i_frac: f64, pf: f64) -> Self {
        Self {
            z_frac,
            i_frac,
            p_frac: 1.0 - z_frac - i_frac,
            z_pf: pf,
            i_pf: pf,
            p_pf: pf,
        }
    }
}

/// Fixed technology parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TechParameters {
    pub case: TechnologyCase,
    pub residential_zip: ZipFractions,
    pub commercial_zip: ZipFractions,
    /// ZIP mix of the load-shape case residential loads
    pub loadshape_residential_zip: ZipFractions,
    pub loadshape_commercial_zip: ZipFractions,
    pub heat_fraction: f64,
    pub use_waterheaters: bool,
    pub residential_meter_consumption: &'static str,
    pub commercial_meter_consumption: &'static str,
    pub light_scalar_residential: f64,
    pub light_scalar_commercial: f64,
    /// Per-phase VA below which a commercial load becomes a light load
    pub load_cutoff: f64,
    pub cooling_cop: f64,
    pub residential_skew_max: f64,
    pub commercial_skew_std: f64,
    pub commercial_skew_max: f64,
    /// Recorder interval in seconds
    pub meas_interval: u32,
    pub meas_limit: u64,
    pub ts_soc: f64,
    pub ts_k: f64,
    pub rated_insolation: f64,
    pub solar_efficiency: f64,
}

impl TechParameters {
    pub fn for_case(case: TechnologyCase) -> Self {
        let meas_interval = 300;
        Self {
            case,
            residential_zip: ZipFractions::new(0.2, 0.4, 0.97),
            commercial_zip: ZipFractions::new(0.2, 0.4, 0.97),
            loadshape_residential_zip: ZipFractions::new(0.0, 0.0, 0.97),
            loadshape_commercial_zip: ZipFractions::new(0.2, 0.4, 0.97),
            heat_fraction: 0.9,
            use_waterheaters: true,
            residential_meter_consumption: "1+7j",
            commercial_meter_consumption: "1+15j",
            light_scalar_residential: 1.0,
            light_scalar_commercial: 1.0,
            load_cutoff: 5000.0,
            cooling_cop: 3.0,
            residential_skew_max: 8100.0,
            commercial_skew_std: 1800.0,
            commercial_skew_max: 5400.0,
            meas_interval,
            meas_limit: 20 * (10_000u64 * 86_400).div_ceil(u64::from(meas_interval)),
            ts_soc: if case.uses_thermal_storage() { 100.0 } else { 0.0 },
            ts_k: 0.0,
            rated_insolation: 92.902,
            solar_efficiency: 0.2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_clamp_into_range() {
        assert_eq!(TechnologyCase::from_code(-5), TechnologyCase::LoadShapes);
        assert_eq!(TechnologyCase::from_code(42), TechnologyCase::SolarCombined);
        for code in -1..=13 {
            assert_eq!(TechnologyCase::from_code(code).code(), code);
        }
    }

    #[test]
    fn case_flags() {
        assert!(TechnologyCase::SolarCombined.uses_residential_solar());
        assert!(TechnologyCase::SolarCombined.uses_commercial_solar());
        assert!(!TechnologyCase::SolarResidential.uses_commercial_solar());
        assert!(TechnologyCase::Dlc.is_unsupported());
        assert!(!TechnologyCase::ThermalStorage.is_unsupported());
    }

    #[test]
    fn parameters_follow_case() {
        let base = TechParameters::for_case(TechnologyCase::Base);
        assert!((base.residential_zip.p_frac - 0.4).abs() < 1e-12);
        assert_eq!(base.ts_soc, 0.0);
        assert_eq!(base.meas_limit, 57_600_000);
        assert_eq!(TechParameters::for_case(TechnologyCase::ThermalStorage).ts_soc, 100.0);
    }
}
