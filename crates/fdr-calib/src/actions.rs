//! Candidate generators for the calibration actions.
//!
//! An action is a signed integer: its absolute value names the knob group
//! to move and its sign the direction the load should go (positive raises
//! it). Each generator returns at most 7 clipped, distinct candidates, none
//! equal to the incumbent it started from.

use fdr_populate::Knob;

use crate::vector::ConfigVector;

pub type ActionId = i32;

/// The action forced periodically to retry residential schedule skew.
pub const SCHEDULE_SKEW_ACTION: ActionId = 9;

/// Scalars tried first when calibrating the load-shape case.
pub const INITIAL_LOAD_SHAPE_SCALARS: [f64; 5] = [0.25, 0.5, 1.0, 1.5, 1.75];
/// Scalars tried when every initial load-shape scalar failed.
pub const FALLBACK_LOAD_SHAPE_SCALARS: [f64; 5] = [0.01, 0.02, 0.05, 0.10, 0.15];

pub fn describe(action: ActionId) -> &'static str {
    match action {
        1 => "raise load overall",
        -1 => "lower load overall",
        2 => "raise winter load only",
        -2 => "lower winter load only",
        3 => "raise winter peak only",
        -3 => "lower winter peak only",
        4 => "raise winter peak, summer may follow",
        -4 => "lower winter peak, summer may follow",
        5 => "raise summer peak only",
        -5 => "lower summer peak only",
        6 => "raise summer peak, winter may follow",
        -6 => "lower summer peak, winter may follow",
        7 => "raise both peaks",
        -7 => "lower both peaks",
        8 => "raise summer peak and lower winter peak",
        -8 => "lower summer peak and raise winter peak",
        9 | -9 => "test residential schedule skew shifts",
        0 => "no options left",
        _ => "unknown action",
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn direction(action: ActionId) -> f64 {
    if action < 0 {
        -1.0
    } else {
        1.0
    }
}

/// `(decrease_gas, addtl_heat_degrees)` pairs moving winter load.
fn winter_load(action: ActionId, gas: f64, heat: f64) -> Vec<(f64, f64)> {
    let ch = direction(action);
    vec![
        (round2(gas + ch * 0.05), heat),
        (round2(gas + ch * 0.10), heat),
        (gas, heat + ch * 0.5),
        (gas, heat + ch * 1.0),
        (round2(gas + ch * 0.05), heat + ch * 0.5),
        (round2(gas + ch * 0.10), heat + ch * 1.0),
    ]
}

/// The single-step winter load moves (gas only, heat only, both).
fn winter_load_single(action: ActionId, gas: f64, heat: f64) -> Vec<(f64, f64)> {
    winter_load(action, gas, heat).into_iter().step_by(2).collect()
}

fn summer_peak(action: ActionId, wwr: f64) -> Vec<f64> {
    let ch = direction(action);
    vec![round2(wwr + ch * 0.05), round2(wwr + ch * 0.10)]
}

/// Candidates for `action`, attempted `count` times so far, from `base`
/// given the main-metric errors.
pub fn candidates(action: ActionId, count: u32, base: &ConfigVector, main: [f64; 4]) -> Vec<ConfigVector> {
    let v = |knob: Knob| base.get(knob);
    let variant = |changes: &[(Knob, f64)]| {
        let mut out = *base;
        for (knob, value) in changes {
            out.set(*knob, *value);
        }
        out
    };
    let ch = direction(action);
    let raw: Vec<ConfigVector> = match action.abs() {
        1 => {
            let avg = main.iter().sum::<f64>() / 4.0;
            let mut scalar = if avg.abs() > 0.5 {
                3.0
            } else if avg.abs() > 0.25 {
                2.0
            } else {
                1.0
            };
            if count > 1 && scalar > 1.0 {
                scalar -= 1.0;
            }
            // Lowering load means larger average VA per house.
            let step_house = -ch * 1000.0 * scalar;
            let step_comm = -ch * 4000.0;
            let step_base = ch * 0.05;
            let house = v(Knob::AvgHouse);
            let comm = v(Knob::AvgCommercial);
            let base_load = v(Knob::BaseLoadScalar);
            vec![
                variant(&[(Knob::BaseLoadScalar, round2(base_load + step_base))]),
                variant(&[(Knob::AvgHouse, (house + step_house).trunc())]),
                variant(&[(Knob::AvgCommercial, (comm + step_comm).trunc())]),
                variant(&[
                    (Knob::AvgHouse, (house + step_house).trunc()),
                    (Knob::AvgCommercial, (comm + step_comm).trunc()),
                ]),
                variant(&[(Knob::AvgHouse, (house + 2.0 * step_house).trunc())]),
                variant(&[(Knob::AvgCommercial, (comm + 2.0 * step_comm).trunc())]),
                variant(&[(Knob::BaseLoadScalar, round2(base_load + 2.0 * step_base))]),
            ]
        }
        2 => winter_load(action, v(Knob::DecreaseGas), v(Knob::AddtlHeatDegrees))
            .into_iter()
            .map(|(gas, heat)| variant(&[(Knob::DecreaseGas, gas), (Knob::AddtlHeatDegrees, heat)]))
            .collect(),
        3 => {
            let std = v(Knob::SchedSkewStd);
            // A narrower skew concentrates the winter peak.
            let skews = [std - ch * 900.0, std - ch * 1800.0];
            winter_load_single(action, v(Knob::DecreaseGas), v(Knob::AddtlHeatDegrees))
                .into_iter()
                .flat_map(|(gas, heat)| {
                    skews.map(|skew| {
                        variant(&[
                            (Knob::DecreaseGas, gas),
                            (Knob::AddtlHeatDegrees, heat),
                            (Knob::SchedSkewStd, skew),
                        ])
                    })
                })
                .collect()
        }
        4 => {
            let (high, low) = (v(Knob::CopHighScalar), v(Knob::CopLowScalar));
            let cops = [(round2(high - ch * 0.05), round2(low - ch * 0.05)), (high, low)];
            winter_load_single(action, v(Knob::DecreaseGas), v(Knob::AddtlHeatDegrees))
                .into_iter()
                .flat_map(|(gas, heat)| {
                    cops.map(|(high, low)| {
                        variant(&[
                            (Knob::DecreaseGas, gas),
                            (Knob::AddtlHeatDegrees, heat),
                            (Knob::CopHighScalar, high),
                            (Knob::CopLowScalar, low),
                        ])
                    })
                })
                .collect()
        }
        5 => summer_peak(action, v(Knob::WindowWallRatio))
            .into_iter()
            .map(|wwr| variant(&[(Knob::WindowWallRatio, wwr)]))
            .collect(),
        6 => {
            let (high, low, wwr) = (v(Knob::CopHighScalar), v(Knob::CopLowScalar), v(Knob::WindowWallRatio));
            let cop = |step: f64| [(Knob::CopHighScalar, round2(high - ch * step)), (Knob::CopLowScalar, round2(low - ch * step))];
            let window = |step: f64| (Knob::WindowWallRatio, round2(wwr + ch * step));
            let [h1, l1] = cop(0.05);
            let [h2, l2] = cop(0.10);
            vec![
                variant(&[h1, l1]),
                variant(&[h2, l2]),
                variant(&[h1, l1, window(0.05)]),
                variant(&[h2, l2, window(0.10)]),
                variant(&[window(0.05)]),
                variant(&[window(0.10)]),
            ]
        }
        7 => {
            let cool = (Knob::CoolingOffset, v(Knob::CoolingOffset) + ch * 0.5);
            let heat = (Knob::HeatingOffset, v(Knob::HeatingOffset) + ch * 0.5);
            let high = (Knob::CopHighScalar, round2(v(Knob::CopHighScalar) - ch * 0.05));
            let low = (Knob::CopLowScalar, round2(v(Knob::CopLowScalar) - ch * 0.05));
            let skew = (Knob::SchedSkewStd, v(Knob::SchedSkewStd) - ch * 900.0);
            vec![
                variant(&[cool, heat]),
                variant(&[high, low]),
                variant(&[skew]),
                variant(&[cool, heat, high, low]),
                variant(&[cool, heat, skew]),
                variant(&[high, low, skew]),
                variant(&[cool, heat, high, low, skew]),
            ]
        }
        8 => {
            let summer = summer_peak(action, v(Knob::WindowWallRatio));
            winter_load_single(-action, v(Knob::DecreaseGas), v(Knob::AddtlHeatDegrees))
                .into_iter()
                .flat_map(|(gas, heat)| {
                    summer.iter().map(move |wwr| (gas, heat, *wwr)).collect::<Vec<_>>()
                })
                .map(|(gas, heat, wwr)| {
                    variant(&[
                        (Knob::DecreaseGas, gas),
                        (Knob::AddtlHeatDegrees, heat),
                        (Knob::WindowWallRatio, wwr),
                    ])
                })
                .collect()
        }
        9 => {
            let shift = v(Knob::ResidentialSkewShift);
            [-3600.0, -1800.0, -900.0, 0.0, 900.0, 1800.0, 3600.0]
                .into_iter()
                .map(|offset| variant(&[(Knob::ResidentialSkewShift, shift + offset)]))
                .collect()
        }
        _ => {
            tracing::warn!(action, "no candidate generator for action");
            Vec::new()
        }
    };
    dedup(raw, base)
}

/// Load-shape scalars a quarter, half, three quarters and all the way
/// towards `last / (1 + avg_peak_err)`.
pub fn load_shape_scalars(last: f64, avg_peak_err: f64) -> Vec<f64> {
    let ideal = round4(last / (1.0 + avg_peak_err));
    let scalars: Vec<f64> = [0.25, 0.5, 0.75]
        .iter()
        .map(|step| round4(last + (ideal - last) * step))
        .chain(std::iter::once(ideal))
        .map(|scalar| Knob::LoadShapeScalar.clip(scalar))
        .collect();
    let mut out: Vec<f64> = Vec::with_capacity(scalars.len());
    for scalar in scalars {
        if !out.iter().any(|s| s.to_bits() == scalar.to_bits()) {
            out.push(scalar);
        }
    }
    out
}

/// Drop later duplicates and anything equal to `base`, keeping
/// first-occurrence order.
fn dedup(candidates: Vec<ConfigVector>, base: &ConfigVector) -> Vec<ConfigVector> {
    let mut out: Vec<ConfigVector> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !candidate.same_as(base) && !out.iter().any(|c| c.same_as(&candidate)) {
            out.push(candidate);
        }
    }
    out
}
