//! Graph view of a feeder for connectivity checks.
//!
//! Bus-like records become graph nodes; link records (`from`/`to`) and
//! `parent` attributes between buses become directed edges. The importer uses
//! this to drop islands and find parallel sections, and tests use it to check
//! that imported feeders are radial from a single SWING bus.

use std::collections::{BTreeMap, HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, EdgeRef};

use crate::library::ObjectLibrary;
use crate::tree::ObjectTree;

/// Why two buses are connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connection {
    /// A link record, by tree key
    Link(u64),
    /// `parent` attribute of the downstream bus
    Parent,
}

/// Directed bus graph built from an [`ObjectTree`].
#[derive(Debug, Default)]
pub struct FeederGraph {
    pub graph: DiGraph<String, Connection>,
    index: HashMap<String, NodeIndex>,
}

impl FeederGraph {
    pub fn from_tree(tree: &ObjectTree, library: &ObjectLibrary) -> Self {
        let mut fg = FeederGraph::default();
        for (_, rec) in tree.iter() {
            let Some(kind) = rec.kind.object_kind() else { continue };
            if library.is_node(kind) {
                if let Some(name) = rec.name() {
                    fg.node(name);
                }
            }
        }
        for (key, rec) in tree.iter() {
            let Some(kind) = rec.kind.object_kind() else { continue };
            if library.is_link(kind) {
                if let (Some(from), Some(to)) = (rec.get("from"), rec.get("to")) {
                    let a = fg.node(from);
                    let b = fg.node(to);
                    fg.graph.add_edge(a, b, Connection::Link(key));
                }
            } else if library.is_node(kind) {
                if let (Some(name), Some(parent)) = (rec.name(), rec.parent()) {
                    if let Some(&p) = fg.index.get(parent) {
                        let c = fg.index[name];
                        fg.graph.add_edge(p, c, Connection::Parent);
                    }
                }
            }
        }
        fg
    }

    fn node(&mut self, name: &str) -> NodeIndex {
        if let Some(idx) = self.index.get(name) {
            return *idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.index.insert(name.to_string(), idx);
        idx
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Buses reachable from `source` following edge direction.
    pub fn reachable_from(&self, source: &str) -> HashSet<String> {
        let mut seen = HashSet::new();
        let Some(&start) = self.index.get(source) else {
            return seen;
        };
        let mut bfs = Bfs::new(&self.graph, start);
        while let Some(nx) = bfs.next(&self.graph) {
            seen.insert(self.graph[nx].clone());
        }
        seen
    }

    /// Buses the source cannot reach, in name order.
    pub fn islanded(&self, source: &str) -> Vec<String> {
        let reached = self.reachable_from(source);
        let mut out: Vec<String> = self
            .graph
            .node_weights()
            .filter(|n| !reached.contains(*n))
            .cloned()
            .collect();
        out.sort();
        out
    }

    /// Link keys grouped by unordered endpoint pair, for pairs carried by
    /// more than one link.
    pub fn parallel_links(&self) -> Vec<Vec<u64>> {
        let mut groups: BTreeMap<(String, String), Vec<u64>> = BTreeMap::new();
        for edge in self.graph.edge_references() {
            if let Connection::Link(key) = edge.weight() {
                let a = self.graph[edge.source()].clone();
                let b = self.graph[edge.target()].clone();
                let pair = if a <= b { (a, b) } else { (b, a) };
                groups.entry(pair).or_default().push(*key);
            }
        }
        groups
            .into_values()
            .filter(|keys| keys.len() > 1)
            .map(|mut keys| {
                keys.sort_unstable();
                keys
            })
            .collect()
    }

    /// Number of outgoing links at a bus.
    pub fn out_degree(&self, name: &str) -> usize {
        self.index
            .get(name)
            .map(|idx| {
                self.graph
                    .edges(*idx)
                    .filter(|e| matches!(e.weight(), Connection::Link(_)))
                    .count()
            })
            .unwrap_or(0)
    }
}

/// Names of all records with `bustype SWING`.
pub fn swing_buses(tree: &ObjectTree) -> Vec<String> {
    tree.iter()
        .filter(|(_, r)| r.get("bustype") == Some("SWING"))
        .filter_map(|(_, r)| r.name().map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Record;

    fn link(name: &str, from: &str, to: &str) -> Record {
        Record::object("overhead_line")
            .with("name", name)
            .with("from", from)
            .with("to", to)
    }

    fn sample() -> ObjectTree {
        vec![
            Record::object("meter").with("name", "src").with("bustype", "SWING"),
            Record::object("node").with("name", "a"),
            Record::object("node").with("name", "b"),
            Record::object("node").with("name", "island"),
            Record::object("triplex_meter").with("name", "tm").with("parent", "b"),
            link("l1", "src", "a"),
            link("l2", "a", "b"),
            link("l3", "b", "a"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn reachability_follows_links_and_parents() {
        let fg = FeederGraph::from_tree(&sample(), ObjectLibrary::global());
        let reached = fg.reachable_from("src");
        assert!(reached.contains("tm"));
        assert_eq!(fg.islanded("src"), vec!["island".to_string()]);
    }

    #[test]
    fn parallel_links_ignore_direction() {
        let fg = FeederGraph::from_tree(&sample(), ObjectLibrary::global());
        assert_eq!(fg.parallel_links(), vec![vec![6, 7]]);
        assert_eq!(fg.out_degree("a"), 1);
    }

    #[test]
    fn swing_lookup() {
        assert_eq!(swing_buses(&sample()), vec!["src".to_string()]);
    }
}
