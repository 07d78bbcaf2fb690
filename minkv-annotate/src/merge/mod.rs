//! Merge engine
//!
//! Pure computation: given an entity's existing snapshot and a new batch,
//! produce the replacement snapshot, the reported delta and the ordered
//! write plan. Nothing here touches the store; `AnnotationWriter` carries
//! out the plan.
//!
//! Two batch shapes feed the engine:
//! - tabular rows: one flat key-value batch per entity (`tabular`)
//! - tag-database triples: split into tags, flat pairs and namespaced
//!   groups (`split`), then merged under a policy (`tags`)

pub mod split;
pub mod tabular;
pub mod tags;

pub use split::{split_triples, SplitBatch, SplitOptions};
pub use tabular::{merge_tabular, record_pairs, split_cell};
pub use tags::merge_tag_batch;

use crate::model::{AnnotationSnapshot, KvPair, Namespace};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether new data is unioned with or replaces existing content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    #[default]
    Append,
    Overwrite,
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergePolicy::Append => f.write_str("append"),
            MergePolicy::Overwrite => f.write_str("overwrite"),
        }
    }
}

/// One store-level step of a merge plan, applied to one entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Delete every annotation of the namespace, then create and link one
    /// annotation holding all `pairs`
    ReplaceNamespace {
        namespace: Namespace,
        pairs: Vec<KvPair>,
    },
    /// Delete every annotation of the namespace
    DeleteNamespace { namespace: Namespace },
    /// Unlink every tag from the entity (tags are shared, never deleted)
    UnlinkAllTags,
    /// Look up or create the shared tag, then link it
    LinkTag { value: String },
}

impl WriteOp {
    pub fn name(&self) -> &'static str {
        match self {
            WriteOp::ReplaceNamespace { .. } => "replace_namespace",
            WriteOp::DeleteNamespace { .. } => "delete_namespace",
            WriteOp::UnlinkAllTags => "unlink_tags",
            WriteOp::LinkTag { .. } => "link_tag",
        }
    }
}

/// Reported counts of a merge
///
/// Best-effort diagnostics; Overwrite counts whole replaced groups as
/// added and whole dropped groups as removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeDelta {
    pub kv_added: usize,
    pub kv_removed: usize,
    pub tags_added: usize,
    pub tags_removed: usize,
}

impl std::ops::AddAssign for MergeDelta {
    fn add_assign(&mut self, other: Self) {
        self.kv_added += other.kv_added;
        self.kv_removed += other.kv_removed;
        self.tags_added += other.tags_added;
        self.tags_removed += other.tags_removed;
    }
}

#[derive(Debug, Clone)]
pub struct MergeResult {
    /// Content the entity holds once every op has been applied
    pub replacement: AnnotationSnapshot,
    pub delta: MergeDelta,
    /// Ordered write plan; empty when nothing changed
    pub ops: Vec<WriteOp>,
}

impl MergeResult {
    pub fn unchanged(existing: &AnnotationSnapshot) -> Self {
        Self {
            replacement: existing.clone(),
            delta: MergeDelta::default(),
            ops: Vec::new(),
        }
    }

    pub fn is_unchanged(&self) -> bool {
        self.ops.is_empty()
    }
}
