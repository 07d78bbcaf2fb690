//! Tag-database source
//!
//! Files in the tag database carry tags; a tag's parent tag becomes the
//! key and the grand-parent tag the namespace of a `(namespace, key, value)`
//! triple. One query is issued per image file path.

pub mod schema;
mod tabbles;

pub use tabbles::TabblesSource;

use crate::model::TagTriple;
use async_trait::async_trait;
use minkv_common::Result;
use std::collections::HashSet;

/// Connection parameters, passed explicitly to the source constructor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagDbConfig {
    pub url: String,
}

impl TagDbConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
pub trait TagSource: Send {
    /// Distinct triples for the file at `path` (already normalised)
    async fn fetch_triples(&mut self, path: &str) -> Result<Vec<TagTriple>>;
}

/// Convert a store client path to the tag database's path form
///
/// `C;/data/x.tif` → `C:\data\x.tif`
pub fn normalize_client_path(path: &str) -> String {
    path.replace(';', ":").replace('/', "\\")
}

/// Drop `(key, value)` duplicates, keeping the triple whose namespace sorts last
///
/// Output is ordered by namespace (missing first), stable within a namespace.
pub fn dedup_triples(mut triples: Vec<TagTriple>) -> Vec<TagTriple> {
    triples.sort_by(|a, b| a.namespace.cmp(&b.namespace));

    let mut seen = HashSet::new();
    let mut kept: Vec<TagTriple> = triples
        .into_iter()
        .rev()
        .filter(|t| seen.insert((t.key.clone(), t.value.clone())))
        .collect();
    kept.reverse();
    kept
}
