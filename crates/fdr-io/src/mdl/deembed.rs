//! Hoist nested records to the top level.

use fdr_core::{ObjectTree, RecordKind};

/// Flatten the tree in place.
///
/// A nested `object` gets `parent` set to its container's name; an embedded
/// configuration instead makes the container's attribute point at it. Either
/// way the child is named `<container><kind><key>` when it has no name and
/// is promoted under its own key, or the next free key if that one is taken.
/// Repeats until no record holds another, so calling it on a flat tree is a
/// no-op.
pub fn deembed(tree: &mut ObjectTree) {
    while !tree.is_flat() {
        for key in tree.keys() {
            let Some(outer) = tree.get_mut(key) else { continue };
            if !outer.has_children() {
                continue;
            }
            let children = std::mem::take(&mut outer.children);
            let outer_name = outer
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{}{}", kind_label(&outer.kind), key));

            let mut promoted = Vec::with_capacity(children.len());
            for (child_key, mut child) in children {
                let kind = child.kind.object_kind().unwrap_or("record").to_string();
                if child.name().is_none() {
                    child.set("name", format!("{outer_name}{kind}{child_key}"));
                }
                let child_name = child.name().unwrap_or_default().to_string();
                if let RecordKind::Embedded { attribute, kind } = child.kind.clone() {
                    outer.set(attribute, child_name);
                    child.kind = RecordKind::object(kind);
                } else {
                    child.set("parent", outer_name.as_str());
                }
                promoted.push((child_key, child));
            }

            for (child_key, child) in promoted {
                let slot = if tree.contains_key(child_key) {
                    tree.next_key()
                } else {
                    child_key
                };
                tree.insert_at(slot, child);
            }
        }
    }
    tree.reindex();
}

fn kind_label(kind: &RecordKind) -> &str {
    match kind {
        RecordKind::Object { kind } | RecordKind::Embedded { kind, .. } => kind,
        RecordKind::Module { name } | RecordKind::Class { name } => name,
        _ => "record",
    }
}

#[cfg(test)]
mod tests {
    use super::super::{parse, print};
    use super::*;

    const NESTED: &str = "object transformer {\n name t1;\n configuration object transformer_configuration {\n  connect_type SINGLE_PHASE_CENTER_TAPPED;\n };\n object triplex_meter {\n  phases AS;\n  object house { floor_area 1500; };\n };\n};";

    #[test]
    fn hoists_children_and_embedded_configurations() {
        let mut tree = parse(NESTED).unwrap();
        deembed(&mut tree);
        assert!(tree.is_flat());
        assert_eq!(tree.len(), 4);

        let t1 = tree.by_name("t1").unwrap();
        assert_eq!(t1.get("configuration"), Some("t1transformer_configuration1"));
        let cfg = tree.by_name("t1transformer_configuration1").unwrap();
        assert!(cfg.is_object("transformer_configuration"));
        assert_eq!(cfg.parent(), None);

        let meter = tree.by_name("t1triplex_meter2").unwrap();
        assert_eq!(meter.parent(), Some("t1"));
        let house = tree.by_name("t1triplex_meter2house3").unwrap();
        assert_eq!(house.parent(), Some("t1triplex_meter2"));
    }

    #[test]
    fn idempotent() {
        let mut once = parse(NESTED).unwrap();
        deembed(&mut once);
        let mut twice = once.clone();
        deembed(&mut twice);
        assert_eq!(print(&once).unwrap(), print(&twice).unwrap());
        assert_eq!(once, twice);
    }

    #[test]
    fn key_collision_takes_next_free_key() {
        let mut tree = parse("object node { name a; object meter { name m; }; };").unwrap();
        // Key 1 belongs to the nested meter; occupy it at the top level.
        tree.insert_at(1, fdr_core::Record::directive("#set", "profiler=1"));
        deembed(&mut tree);
        assert_eq!(tree.key_of("m"), Some(2));
    }
}
