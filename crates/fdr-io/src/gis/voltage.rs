//! Nominal-voltage propagation from the SWING bus.
//!
//! Runs to a fixed point over the link list: a link whose `from` bus has a
//! voltage hands one to its `to` bus (transformers hand over their secondary
//! voltage, center-tapped ones 120 V), and parented records inherit their
//! parent's voltage. Regulators also pin their configuration's band center
//! to the regulated voltage.

use std::collections::{HashMap, HashSet};

use fdr_core::{Diagnostics, ObjectLibrary, ObjectTree};

pub fn propagate(
    tree: &mut ObjectTree,
    lib: &ObjectLibrary,
    swing: &str,
    swing_vln: f64,
    diagnostics: &mut Diagnostics,
) {
    let mut volts: HashMap<String, f64> = HashMap::new();
    volts.insert(swing.to_string(), swing_vln);

    struct Hop {
        kind: String,
        from: String,
        to: String,
        configuration: Option<String>,
    }
    let mut hops = Vec::new();
    let mut children = Vec::new();
    for (_, rec) in tree.iter() {
        let Some(kind) = rec.kind.object_kind() else { continue };
        if lib.is_link(kind) {
            if let (Some(from), Some(to)) = (rec.get("from"), rec.get("to")) {
                hops.push(Hop {
                    kind: kind.to_string(),
                    from: from.to_string(),
                    to: to.to_string(),
                    configuration: rec.get("configuration").map(str::to_string),
                });
            }
        } else if let (Some(name), Some(parent)) = (rec.name(), rec.parent()) {
            children.push((name.to_string(), parent.to_string()));
        }
    }

    let mut regulated: Vec<(String, f64)> = Vec::new();
    let mut changed = true;
    while changed {
        changed = false;
        for hop in &hops {
            let Some(&v) = volts.get(&hop.from) else { continue };
            if volts.contains_key(&hop.to) {
                continue;
            }
            let out = match hop.kind.as_str() {
                "transformer" => secondary_voltage(tree, hop.configuration.as_deref()).unwrap_or_else(|| {
                    diagnostics.add_warning_with_entity(
                        "voltage",
                        "transformer has no usable configuration, voltage passed through",
                        &hop.to,
                    );
                    v
                }),
                "regulator" => {
                    if let Some(cfg) = &hop.configuration {
                        regulated.push((cfg.clone(), v));
                    }
                    v
                }
                _ => v,
            };
            volts.insert(hop.to.clone(), out);
            changed = true;
        }
        for (name, parent) in &children {
            if volts.contains_key(name) {
                continue;
            }
            if let Some(&v) = volts.get(parent) {
                volts.insert(name.clone(), v);
                changed = true;
            }
        }
    }

    let mut done: HashSet<String> = HashSet::new();
    for (cfg, v) in regulated {
        if !done.insert(cfg.clone()) {
            continue;
        }
        if let Some(rec) = tree.by_name_mut(&cfg) {
            let fraction: f64 = rec.get("band_width").and_then(|b| b.parse().ok()).unwrap_or(2.0 / 120.0);
            rec.set("band_center", format!("{v:.6}"));
            rec.set("band_width", format!("{:.6}", fraction * v));
        }
    }

    let mut unresolved = 0usize;
    for key in tree.keys() {
        let Some(rec) = tree.get_mut(key) else { continue };
        let Some(kind) = rec.kind.object_kind().map(str::to_string) else { continue };
        if lib.is_link(&kind) {
            rec.remove("nominal_voltage");
            continue;
        }
        if !lib.is_node(&kind) {
            continue;
        }
        let Some(name) = rec.name().map(str::to_string) else { continue };
        match volts.get(&name) {
            Some(v) => {
                rec.set("nominal_voltage", format!("{v:.3}"));
                if kind == "capacitor" && !rec.contains("cap_nominal_voltage") {
                    rec.set("cap_nominal_voltage", format!("{v:.3}"));
                }
            }
            None => unresolved += 1,
        }
    }
    if unresolved > 0 {
        tracing::debug!(unresolved, "buses left without a nominal voltage");
    }
}

fn secondary_voltage(tree: &ObjectTree, configuration: Option<&str>) -> Option<f64> {
    let cfg = tree.by_name(configuration?)?;
    if cfg.get("connect_type") == Some("SINGLE_PHASE_CENTER_TAPPED") {
        return Some(120.0);
    }
    cfg.get("secondary_voltage")?.parse().ok()
}
