//! The Object Tree: an insertion-ordered set of MDL records.
//!
//! Records live in a dense `BTreeMap` keyed by their insertion-order key, so
//! iteration order is output order. References between records (`parent`,
//! `from`, `to`, `configuration`) are by name and resolved through a
//! name→key index, never by pointer.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::error::{FdrError, FdrResult};

/// What a record is, which also decides how it is printed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordKind {
    /// `object KIND { ... }`
    Object { kind: String },
    /// `module NAME { ... }`
    Module { name: String },
    /// `clock { ... }`
    Clock,
    /// `class NAME { ... }`
    Class { name: String },
    /// `schedule NAME { body }` with the body kept verbatim
    Schedule { name: String, body: String },
    /// Root-level statement such as `#include "x.glm"` or `#set profiler=1`
    Directive { kind: String, argument: String },
    /// A configuration written inline inside its owner, e.g.
    /// `configuration object transformer_configuration { ... }`.
    /// `attribute` is the owner attribute that will point at the hoisted
    /// record, `kind` the object kind it declares.
    Embedded { attribute: String, kind: String },
}

impl RecordKind {
    pub fn object(kind: impl Into<String>) -> Self {
        RecordKind::Object { kind: kind.into() }
    }

    /// Object kind for objects and embedded configurations.
    pub fn object_kind(&self) -> Option<&str> {
        match self {
            RecordKind::Object { kind } | RecordKind::Embedded { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

/// One MDL record: a kind, ordered attributes and nested child records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub kind: RecordKind,
    attributes: Vec<(String, String)>,
    /// Nested records with the key the parser assigned them
    pub children: Vec<(u64, Record)>,
}

impl Record {
    pub fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn object(kind: impl Into<String>) -> Self {
        Self::new(RecordKind::object(kind))
    }

    pub fn directive(kind: impl Into<String>, argument: impl Into<String>) -> Self {
        Self::new(RecordKind::Directive {
            kind: kind.into(),
            argument: argument.into(),
        })
    }

    /// Builder form of [`Record::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Insert or replace an attribute, keeping its original position.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// Append an attribute, failing if the key already exists.
    pub fn insert_new(&mut self, key: impl Into<String>, value: impl Into<String>) -> FdrResult<()> {
        let key = key.into();
        if self.contains(&key) {
            return Err(FdrError::Validation(format!(
                "duplicate attribute '{}' in {}",
                key,
                self.label()
            )));
        }
        self.attributes.push((key, value.into()));
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.attributes.iter().any(|(k, _)| k == key)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let idx = self.attributes.iter().position(|(k, _)| k == key)?;
        Some(self.attributes.remove(idx).1)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    pub fn name(&self) -> Option<&str> {
        self.get("name")
    }

    pub fn parent(&self) -> Option<&str> {
        self.get("parent")
    }

    /// True for `object KIND` records of exactly this kind.
    pub fn is_object(&self, kind: &str) -> bool {
        matches!(&self.kind, RecordKind::Object { kind: k } if k == kind)
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    fn label(&self) -> String {
        match (self.kind.object_kind(), self.name()) {
            (Some(kind), Some(name)) => format!("{kind} '{name}'"),
            (Some(kind), None) => kind.to_string(),
            _ => format!("{:?}", self.kind),
        }
    }
}

/// Ordered collection of top-level records with a name index.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObjectTree {
    records: BTreeMap<u64, Record>,
    #[serde(skip)]
    names: HashMap<String, u64>,
}

impl ObjectTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// One past the largest key in use.
    pub fn next_key(&self) -> u64 {
        self.records.keys().next_back().map_or(0, |k| k + 1)
    }

    /// Append a record under the next free key.
    pub fn push(&mut self, record: Record) -> u64 {
        let key = self.next_key();
        self.insert_at(key, record);
        key
    }

    /// Insert under `key`, replacing whatever was there.
    pub fn insert_at(&mut self, key: u64, record: Record) {
        if let Some(old) = self.records.get(&key).and_then(|r| r.name()) {
            if self.names.get(old) == Some(&key) {
                self.names.remove(old);
            }
        }
        if let Some(name) = record.name() {
            self.names.insert(name.to_string(), key);
        }
        self.records.insert(key, record);
    }

    pub fn contains_key(&self, key: u64) -> bool {
        self.records.contains_key(&key)
    }

    pub fn get(&self, key: u64) -> Option<&Record> {
        self.records.get(&key)
    }

    /// Mutable access. Call [`ObjectTree::reindex`] after renaming records.
    pub fn get_mut(&mut self, key: u64) -> Option<&mut Record> {
        self.records.get_mut(&key)
    }

    pub fn remove(&mut self, key: u64) -> Option<Record> {
        let record = self.records.remove(&key)?;
        if let Some(name) = record.name() {
            if self.names.get(name) == Some(&key) {
                self.names.remove(name);
            }
        }
        Some(record)
    }

    /// Rebuild the name index from scratch.
    pub fn reindex(&mut self) {
        self.names = self
            .records
            .iter()
            .filter_map(|(k, r)| r.name().map(|n| (n.to_string(), *k)))
            .collect();
    }

    pub fn key_of(&self, name: &str) -> Option<u64> {
        self.names.get(name).copied()
    }

    pub fn by_name(&self, name: &str) -> Option<&Record> {
        self.key_of(name).and_then(|k| self.records.get(&k))
    }

    pub fn by_name_mut(&mut self, name: &str) -> Option<&mut Record> {
        let key = self.key_of(name)?;
        self.records.get_mut(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &Record)> {
        self.records.iter().map(|(k, r)| (*k, r))
    }

    pub fn keys(&self) -> Vec<u64> {
        self.records.keys().copied().collect()
    }

    /// Keys of every `object KIND` record of the given kind.
    pub fn keys_of_kind(&self, kind: &str) -> Vec<u64> {
        self.iter()
            .filter(|(_, r)| r.is_object(kind))
            .map(|(k, _)| k)
            .collect()
    }

    pub fn count_kind(&self, kind: &str) -> usize {
        self.records.values().filter(|r| r.is_object(kind)).count()
    }

    /// True when no record holds a nested record.
    pub fn is_flat(&self) -> bool {
        self.records.values().all(|r| !r.has_children())
    }

    /// Append every record of `other` after the records already present,
    /// keeping their relative order.
    pub fn extend(&mut self, other: ObjectTree) {
        for (_, record) in other.records {
            self.push(record);
        }
    }
}

impl FromIterator<Record> for ObjectTree {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        let mut tree = ObjectTree::new();
        for record in iter {
            tree.push(record);
        }
        tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_keeps_position_and_insert_new_rejects_duplicates() {
        let mut rec = Record::object("node").with("name", "n1").with("phases", "ABC");
        rec.set("name", "n2");
        let keys: Vec<_> = rec.attributes().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["name", "phases"]);
        assert_eq!(rec.name(), Some("n2"));
        assert!(rec.insert_new("phases", "AN").is_err());
        assert!(rec.insert_new("nominal_voltage", "7200").is_ok());
    }

    #[test]
    fn push_assigns_dense_keys_and_indexes_names() {
        let mut tree = ObjectTree::new();
        let a = tree.push(Record::object("node").with("name", "a"));
        let b = tree.push(Record::directive("#set", "profiler=1"));
        let c = tree.push(Record::object("meter").with("name", "c"));
        assert_eq!((a, b, c), (0, 1, 2));
        assert_eq!(tree.key_of("c"), Some(2));
        tree.remove(2);
        assert!(tree.by_name("c").is_none());
        assert_eq!(tree.next_key(), 2);
    }

    #[test]
    fn reindex_after_rename() {
        let mut tree: ObjectTree = vec![Record::object("node").with("name", "old")]
            .into_iter()
            .collect();
        if let Some(rec) = tree.get_mut(0) {
            rec.set("name", "new");
        }
        tree.reindex();
        assert_eq!(tree.key_of("new"), Some(0));
        assert_eq!(tree.key_of("old"), None);
    }

    #[test]
    fn kind_queries() {
        let tree: ObjectTree = vec![
            Record::object("node").with("name", "a"),
            Record::object("overhead_line").with("name", "l1"),
            Record::object("node").with("name", "b"),
        ]
        .into_iter()
        .collect();
        assert_eq!(tree.keys_of_kind("node"), vec![0, 2]);
        assert_eq!(tree.count_kind("overhead_line"), 1);
        assert!(tree.is_flat());
    }
}
