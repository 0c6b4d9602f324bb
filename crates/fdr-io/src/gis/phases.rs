//! Final phase clean-up after topology edits.

use std::collections::{BTreeSet, HashMap, HashSet};

use fdr_core::{Diagnostics, ObjectLibrary, ObjectTree};

/// Link kinds that never carry a neutral phase.
const NO_NEUTRAL: &[&str] = &[
    "underground_line",
    "regulator",
    "transformer",
    "switch",
    "fuse",
    "recloser",
    "sectionalizer",
];

/// Give buses the union of their links' phases plus N, and strip N from
/// links that model no neutral conductor.
pub fn normalize(tree: &mut ObjectTree, lib: &ObjectLibrary, diagnostics: &mut Diagnostics) {
    let mut seen: HashMap<String, BTreeSet<char>> = HashMap::new();
    let mut from_buses: HashSet<String> = HashSet::new();
    let mut neutral_configs: HashSet<String> = HashSet::new();

    for (_, rec) in tree.iter() {
        if rec.is_object("line_configuration") && rec.contains("conductor_N") {
            if let Some(name) = rec.name() {
                neutral_configs.insert(name.to_string());
            }
        }
        let Some(kind) = rec.kind.object_kind() else { continue };
        if !lib.is_link(kind) {
            continue;
        }
        let phases: Vec<char> = rec
            .get("phases")
            .unwrap_or_default()
            .chars()
            .filter(|c| matches!(c, 'A' | 'B' | 'C' | 'S'))
            .collect();
        for end in [rec.get("from"), rec.get("to")].into_iter().flatten() {
            seen.entry(end.to_string()).or_default().extend(phases.iter().copied());
        }
        if let Some(from) = rec.get("from") {
            from_buses.insert(from.to_string());
        }
    }

    for key in tree.keys() {
        let Some(rec) = tree.get_mut(key) else { continue };
        let Some(kind) = rec.kind.object_kind().map(str::to_string) else { continue };
        let current = rec.get("phases").unwrap_or_default().to_string();

        if kind == "overhead_line" {
            let has_neutral = rec.get("configuration").is_some_and(|c| neutral_configs.contains(c));
            let mut phases = current.replace('N', "");
            if has_neutral {
                phases.push('N');
            }
            rec.set("phases", phases);
        } else if NO_NEUTRAL.contains(&kind.as_str()) || kind == "capacitor" {
            rec.set("phases", current.replace('N', ""));
        } else if kind == "node" || kind == "meter" {
            let name = rec.name().unwrap_or_default().to_string();
            let union = seen.get(&name);
            let mut letters: String = union
                .map(|set| set.iter().filter(|c| **c != 'S').collect())
                .unwrap_or_default();
            if letters.is_empty() {
                letters = current.chars().filter(|c| matches!(c, 'A' | 'B' | 'C')).collect();
            }
            if letters.is_empty() {
                letters = "ABC".to_string();
            }
            if union.is_some_and(|set| set.contains(&'S')) && from_buses.contains(&name) {
                diagnostics.add_warning_with_entity("phase", "dropped S from branching node", &name);
            }
            letters.push('N');
            rec.set("phases", letters);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fdr_core::Record;

    #[test]
    fn buses_take_link_union_and_links_lose_neutral() {
        let mut tree: ObjectTree = [
            Record::object("line_configuration").with("name", "withN").with("conductor_N", "c"),
            Record::object("line_configuration").with("name", "noN").with("conductor_A", "c"),
            Record::object("node").with("name", "a"),
            Record::object("node").with("name", "b"),
            Record::object("overhead_line")
                .with("name", "l1")
                .with("phases", "AB")
                .with("from", "a")
                .with("to", "b")
                .with("configuration", "withN"),
            Record::object("overhead_line")
                .with("name", "l2")
                .with("phases", "CN")
                .with("from", "a")
                .with("to", "b")
                .with("configuration", "noN"),
            Record::object("switch").with("name", "s1").with("phases", "ABCN").with("from", "b").with("to", "a"),
            Record::object("transformer").with("name", "x").with("phases", "AS").with("from", "b").with("to", "tpm"),
        ]
        .into_iter()
        .collect();
        let mut diag = Diagnostics::new();
        normalize(&mut tree, ObjectLibrary::global(), &mut diag);
        assert_eq!(tree.by_name("a").unwrap().get("phases"), Some("ABCN"));
        assert_eq!(tree.by_name("l1").unwrap().get("phases"), Some("ABN"));
        assert_eq!(tree.by_name("l2").unwrap().get("phases"), Some("C"));
        assert_eq!(tree.by_name("s1").unwrap().get("phases"), Some("ABC"));
        assert_eq!(tree.by_name("x").unwrap().get("phases"), Some("AS"));
        assert_eq!(tree.by_name("b").unwrap().get("phases"), Some("ABCN"));
        assert_eq!(diag.warning_count(), 1);
    }
}
