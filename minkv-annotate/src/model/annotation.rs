//! Key-value and tag annotation values

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use std::fmt;

/// Partition key for key-value groups
///
/// `Default` is the unnamespaced group (stored under the client map
/// namespace); an empty name is normalised to `Default`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Namespace {
    Default,
    Named(String),
}

impl Namespace {
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.trim().is_empty() {
            Namespace::Default
        } else {
            Namespace::Named(name)
        }
    }

    pub fn as_named(&self) -> Option<&str> {
        match self {
            Namespace::Default => None,
            Namespace::Named(name) => Some(name),
        }
    }

    /// True for named namespaces starting with `prefix` (never for an empty prefix)
    pub fn has_prefix(&self, prefix: &str) -> bool {
        !prefix.is_empty() && self.as_named().is_some_and(|n| n.starts_with(prefix))
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Default => f.write_str("<default>"),
            Namespace::Named(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct KvPair {
    pub key: String,
    pub value: String,
}

impl KvPair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Multi-valued key-value group of one namespace
///
/// Keys keep first-insertion order and values are a set per key, so the
/// `(key, value)` pairs never repeat. Equality ignores order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KvGroup {
    entries: IndexMap<String, IndexSet<String>>,
}

impl KvGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = &'a KvPair>) -> Self {
        let mut group = Self::new();
        for pair in pairs {
            group.insert(&pair.key, &pair.value);
        }
        group
    }

    /// Add a pair; returns false if it was already present
    pub fn insert(&mut self, key: &str, value: &str) -> bool {
        match self.entries.get_mut(key) {
            Some(values) => values.insert(value.to_string()),
            None => {
                let mut values = IndexSet::new();
                values.insert(value.to_string());
                self.entries.insert(key.to_string(), values);
                true
            }
        }
    }

    pub fn contains(&self, key: &str, value: &str) -> bool {
        self.entries.get(key).is_some_and(|values| values.contains(value))
    }

    pub fn values(&self, key: &str) -> Option<&IndexSet<String>> {
        self.entries.get(key)
    }

    /// Serialised form: one pair per (key, value), keys in insertion order
    pub fn pairs(&self) -> Vec<KvPair> {
        self.entries
            .iter()
            .flat_map(|(k, values)| values.iter().map(move |v| KvPair::new(k.as_str(), v.as_str())))
            .collect()
    }

    pub fn pair_count(&self) -> usize {
        self.entries.values().map(IndexSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pair_count() == 0
    }
}

/// Point-in-time view of the annotations attached to one entity
///
/// Owned values only: clones are deep and independent, so a merge working
/// copy can never alter what counted as "existing".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationSnapshot {
    kv: IndexMap<Namespace, KvGroup>,
    tags: IndexSet<String>,
}

impl AnnotationSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_pair(&mut self, namespace: Namespace, key: &str, value: &str) -> bool {
        self.kv.entry(namespace).or_default().insert(key, value)
    }

    pub fn insert_tag(&mut self, value: &str) -> bool {
        self.tags.insert(value.to_string())
    }

    pub fn set_group(&mut self, namespace: Namespace, group: KvGroup) {
        self.kv.insert(namespace, group);
    }

    pub fn remove_group(&mut self, namespace: &Namespace) -> Option<KvGroup> {
        self.kv.shift_remove(namespace)
    }

    pub fn set_tags(&mut self, tags: IndexSet<String>) {
        self.tags = tags;
    }

    pub fn group(&self, namespace: &Namespace) -> Option<&KvGroup> {
        self.kv.get(namespace)
    }

    /// Copy of a namespace's group, empty when absent
    pub fn group_or_empty(&self, namespace: &Namespace) -> KvGroup {
        self.kv.get(namespace).cloned().unwrap_or_default()
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &Namespace> {
        self.kv.keys()
    }

    pub fn tags(&self) -> &IndexSet<String> {
        &self.tags
    }

    pub fn has_tag(&self, value: &str) -> bool {
        self.tags.contains(value)
    }

    pub fn pair_count(&self) -> usize {
        self.kv.values().map(KvGroup::pair_count).sum()
    }
}
