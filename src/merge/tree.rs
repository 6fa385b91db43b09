//! The merged option tree.
//!
//! Leaves (scalars and lists) are stored by full key; interior mapping keys are
//! recorded separately so a leaf can never sit above or below another leaf.

use super::policy::MergeStrategy;
use crate::fragment::FragmentId;
use crate::key::OptionKey;
use crate::value::OptionValue;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Where a value came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    Fragment(FragmentId),
    SchemaDefault,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Fragment(id) => write!(f, "{}", id),
            Provenance::SchemaDefault => f.write_str("schema default"),
        }
    }
}

impl Serialize for Provenance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One merged leaf
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedEntry {
    pub value: OptionValue,
    /// Fragment that last set the value
    pub provenance: Provenance,
    pub strategy: MergeStrategy,
    /// Every contributing fragment, in merge order
    pub history: Vec<FragmentId>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedTree {
    leaves: BTreeMap<OptionKey, MergedEntry>,
    /// Interior keys, with the fragment that first declared them
    mappings: BTreeMap<OptionKey, FragmentId>,
}

impl MergedTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &OptionKey) -> Option<&MergedEntry> {
        self.leaves.get(key)
    }

    pub fn is_mapping(&self, key: &OptionKey) -> bool {
        self.mappings.contains_key(key)
    }

    /// Fragment that first declared `key` as a mapping
    pub fn mapping_origin(&self, key: &OptionKey) -> Option<&FragmentId> {
        self.mappings.get(key)
    }

    /// True when `key` is a leaf or an interior mapping
    pub fn contains(&self, key: &OptionKey) -> bool {
        self.leaves.contains_key(key) || self.mappings.contains_key(key)
    }

    pub fn leaves(&self) -> impl Iterator<Item = (&OptionKey, &MergedEntry)> {
        self.leaves.iter()
    }

    pub fn mappings(&self) -> impl Iterator<Item = (&OptionKey, &FragmentId)> {
        self.mappings.iter()
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty() && self.mappings.is_empty()
    }

    /// Mapping keys with no leaf or mapping below them
    pub fn empty_mappings(&self) -> Vec<&OptionKey> {
        self.mappings
            .keys()
            .filter(|key| {
                let below_leaf = self
                    .leaves
                    .range((*key).clone()..)
                    .next()
                    .is_some_and(|(k, _)| key.is_strict_prefix_of(k));
                let below_mapping = self
                    .mappings
                    .range((*key).clone()..)
                    .nth(1)
                    .is_some_and(|(k, _)| key.is_strict_prefix_of(k));
                !below_leaf && !below_mapping
            })
            .collect()
    }

    /// Nested value for the whole tree
    pub fn to_value(&self) -> OptionValue {
        let mut root = OptionValue::Mapping(BTreeMap::new());
        for key in self.mappings.keys() {
            insert_at(&mut root, key.segments(), OptionValue::Mapping(BTreeMap::new()));
        }
        for (key, entry) in &self.leaves {
            insert_at(&mut root, key.segments(), entry.value.clone());
        }
        root
    }

    pub(crate) fn leaf_mut(&mut self, key: &OptionKey) -> Option<&mut MergedEntry> {
        self.leaves.get_mut(key)
    }

    pub(crate) fn insert_leaf(&mut self, key: OptionKey, entry: MergedEntry) {
        self.leaves.insert(key, entry);
    }

    pub(crate) fn insert_mapping(&mut self, key: OptionKey, declared_by: FragmentId) {
        self.mappings.entry(key).or_insert(declared_by);
    }

    /// Some leaf strictly below `key`
    pub(crate) fn first_leaf_below(&self, key: &OptionKey) -> Option<(&OptionKey, &MergedEntry)> {
        self.leaves
            .range(key.clone()..)
            .find(|(k, _)| *k != key)
            .filter(|(k, _)| key.is_strict_prefix_of(k))
    }
}

fn insert_at(node: &mut OptionValue, segments: &[String], value: OptionValue) {
    let OptionValue::Mapping(map) = node else {
        return;
    };
    match segments {
        [] => {}
        [last] => {
            map.entry(last.clone()).or_insert(value);
        }
        [head, rest @ ..] => {
            let child = map
                .entry(head.clone())
                .or_insert_with(|| OptionValue::Mapping(BTreeMap::new()));
            insert_at(child, rest, value);
        }
    }
}
