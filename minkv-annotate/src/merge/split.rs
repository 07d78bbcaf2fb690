//! Splitting tag-database triples into tags, flat pairs and namespaced groups

use crate::error::{AnnotateError, AnnotateResult};
use crate::model::{KvGroup, KvPair, Namespace, TagTriple};
use indexmap::{IndexMap, IndexSet};
use minkv_common::config::AnnotateConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOptions {
    /// Keep named namespaces as separate groups instead of one flat group
    pub namespaced: bool,
    /// Extract values under a sentinel-prefixed key as standalone tags
    pub single_tags: bool,
    /// Prefix marking namespaces this tool owns
    pub managed_prefix: String,
    /// Prefix marking "no real parent tag" (system namespaces, sentinel keys)
    pub single_tag_prefix: String,
}

impl SplitOptions {
    pub fn from_config(config: &AnnotateConfig, namespaced: bool, single_tags: bool) -> Self {
        Self {
            namespaced,
            single_tags,
            managed_prefix: config.managed_prefix.clone(),
            single_tag_prefix: config.single_tag_prefix.clone(),
        }
    }

    fn is_system(&self, name: &str) -> bool {
        !self.single_tag_prefix.is_empty() && name.starts_with(&self.single_tag_prefix)
    }

    fn managed(&self, name: &str) -> Namespace {
        if name.starts_with(&self.managed_prefix) {
            Namespace::named(name)
        } else {
            Namespace::named(format!("{}{}", self.managed_prefix, name))
        }
    }
}

/// New batch derived from one image's triples
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitBatch {
    pub new_tags: IndexSet<String>,
    /// Exact-pair deduplicated, first-seen order
    pub new_kv_flat: Vec<KvPair>,
    pub new_kv_by_namespace: IndexMap<Namespace, KvGroup>,
}

impl SplitBatch {
    pub fn is_empty(&self) -> bool {
        self.new_tags.is_empty() && self.new_kv_flat.is_empty() && self.new_kv_by_namespace.is_empty()
    }

    /// Invariant check: a batch part may only be populated when its option is on
    pub fn validate(&self, options: &SplitOptions) -> AnnotateResult<()> {
        if !options.namespaced && !self.new_kv_by_namespace.is_empty() {
            return Err(AnnotateError::ConfigurationInconsistency(format!(
                "{} namespaced group(s) produced with namespaced output disabled",
                self.new_kv_by_namespace.len()
            )));
        }
        if !options.single_tags && !self.new_tags.is_empty() {
            return Err(AnnotateError::ConfigurationInconsistency(format!(
                "{} tag(s) produced with single-tag extraction disabled",
                self.new_tags.len()
            )));
        }
        Ok(())
    }

    fn push_flat(&mut self, key: &str, value: &str) {
        let pair = KvPair::new(key, value);
        if !self.new_kv_flat.contains(&pair) {
            self.new_kv_flat.push(pair);
        }
    }
}

pub fn split_triples(triples: &[TagTriple], options: &SplitOptions) -> SplitBatch {
    let mut batch = SplitBatch::default();

    for triple in triples {
        let value = triple.value.trim();
        let Some(key) = triple.key.as_deref().map(str::trim).filter(|k| !k.is_empty()) else {
            // A tag without a parent carries no key
            continue;
        };
        if value.is_empty() {
            continue;
        }

        let namespace = triple
            .namespace
            .as_deref()
            .map(str::trim)
            .filter(|ns| !ns.is_empty());
        let sentinel_key = options.is_system(key);

        match namespace {
            Some(ns) if !options.is_system(ns) => {
                if options.namespaced {
                    batch
                        .new_kv_by_namespace
                        .entry(options.managed(ns))
                        .or_default()
                        .insert(key, value);
                } else {
                    batch.push_flat(key, value);
                }
            }
            _ if sentinel_key && options.single_tags => {
                batch.new_tags.insert(value.to_string());
            }
            Some(_) => batch.push_flat(key, value),
            None if !sentinel_key => batch.push_flat(key, value),
            None => {
                tracing::debug!(key, value, "Skipping single tag: extraction disabled");
            }
        }
    }

    batch
}
