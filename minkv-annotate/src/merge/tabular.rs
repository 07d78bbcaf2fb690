//! Merge of tabular rows into the default key-value group

use super::{MergeDelta, MergeResult, WriteOp};
use crate::model::{AnnotationSnapshot, InputRecord, KvGroup, Namespace};

/// Cell values: split on `;`, trimmed, empties dropped
pub fn split_cell(cell: &str) -> impl Iterator<Item = &str> {
    cell.split(';').map(str::trim).filter(|v| !v.is_empty())
}

/// All `(key, value)` pairs a record contributes
pub fn record_pairs(record: &InputRecord) -> KvGroup {
    let mut group = KvGroup::new();
    for (key, cells) in &record.fields {
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        for cell in cells {
            for value in split_cell(cell) {
                group.insert(key, value);
            }
        }
    }
    group
}

/// Union `additions` into the existing default group
///
/// Unchanged content yields no ops. Otherwise the default namespace is
/// replaced wholesale with the union.
pub fn merge_tabular(existing: &AnnotationSnapshot, additions: &KvGroup) -> MergeResult {
    let current = existing.group_or_empty(&Namespace::Default);
    let mut updated = current.clone();

    let mut added = 0;
    for pair in additions.pairs() {
        if updated.insert(&pair.key, &pair.value) {
            added += 1;
        }
    }

    if updated == current {
        return MergeResult::unchanged(existing);
    }

    tracing::debug!(existing = current.pair_count(), added, "Key-value group changed");

    let mut replacement = existing.clone();
    let pairs = updated.pairs();
    replacement.set_group(Namespace::Default, updated);

    MergeResult {
        replacement,
        delta: MergeDelta {
            kv_added: added,
            ..MergeDelta::default()
        },
        ops: vec![WriteOp::ReplaceNamespace {
            namespace: Namespace::Default,
            pairs,
        }],
    }
}
