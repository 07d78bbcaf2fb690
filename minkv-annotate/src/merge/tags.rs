//! Merge of a split tag-database batch under Append or Overwrite

use super::{MergeDelta, MergePolicy, MergeResult, SplitBatch, SplitOptions, WriteOp};
use crate::model::{AnnotationSnapshot, KvGroup, Namespace};

pub fn merge_tag_batch(
    existing: &AnnotationSnapshot,
    batch: &SplitBatch,
    policy: MergePolicy,
    options: &SplitOptions,
) -> MergeResult {
    let result = match policy {
        MergePolicy::Append => append(existing, batch),
        MergePolicy::Overwrite => overwrite(existing, batch, options),
    };

    tracing::debug!(
        %policy,
        ops = result.ops.len(),
        kv_added = result.delta.kv_added,
        kv_removed = result.delta.kv_removed,
        tags_added = result.delta.tags_added,
        tags_removed = result.delta.tags_removed,
        "Merged tag batch"
    );

    result
}

/// Add only what is missing; recreate each touched namespace with the union
fn append(existing: &AnnotationSnapshot, batch: &SplitBatch) -> MergeResult {
    let mut replacement = existing.clone();
    let mut delta = MergeDelta::default();
    let mut ops = Vec::new();

    for tag in &batch.new_tags {
        if replacement.insert_tag(tag) {
            delta.tags_added += 1;
            ops.push(WriteOp::LinkTag { value: tag.clone() });
        }
    }

    let default = Namespace::Default;
    let flat = KvGroup::from_pairs(&batch.new_kv_flat);
    let groups = std::iter::once((&default, &flat)).chain(&batch.new_kv_by_namespace);

    for (namespace, additions) in groups {
        let mut working = existing.group_or_empty(namespace);
        let mut added = 0;
        for pair in additions.pairs() {
            if working.insert(&pair.key, &pair.value) {
                added += 1;
            }
        }
        if added == 0 {
            continue;
        }

        delta.kv_added += added;
        ops.push(WriteOp::ReplaceNamespace {
            namespace: namespace.clone(),
            pairs: working.pairs(),
        });
        replacement.set_group(namespace.clone(), working);
    }

    MergeResult {
        replacement,
        delta,
        ops,
    }
}

/// Replace tags and batch namespaces; drop managed namespaces gone upstream
fn overwrite(
    existing: &AnnotationSnapshot,
    batch: &SplitBatch,
    options: &SplitOptions,
) -> MergeResult {
    let mut replacement = existing.clone();
    let mut delta = MergeDelta::default();
    let mut ops = Vec::new();

    if options.single_tags {
        delta.tags_removed = existing.tags().len();
        if !existing.tags().is_empty() {
            ops.push(WriteOp::UnlinkAllTags);
        }
        for tag in &batch.new_tags {
            ops.push(WriteOp::LinkTag { value: tag.clone() });
        }
        delta.tags_added = batch.new_tags.len();
        replacement.set_tags(batch.new_tags.clone());
    }

    if !batch.new_kv_flat.is_empty() {
        let mut union = existing.group_or_empty(&Namespace::Default);
        for pair in &batch.new_kv_flat {
            union.insert(&pair.key, &pair.value);
        }
        delta.kv_added += batch.new_kv_flat.len();
        ops.push(WriteOp::ReplaceNamespace {
            namespace: Namespace::Default,
            pairs: union.pairs(),
        });
        replacement.set_group(Namespace::Default, union);
    }

    if options.namespaced {
        let stale: Vec<Namespace> = existing
            .namespaces()
            .filter(|ns| ns.has_prefix(&options.managed_prefix))
            .filter(|ns| !batch.new_kv_by_namespace.contains_key(*ns))
            .cloned()
            .collect();

        for namespace in stale {
            if let Some(group) = replacement.remove_group(&namespace) {
                delta.kv_removed += group.pair_count();
            }
            ops.push(WriteOp::DeleteNamespace { namespace });
        }
    }

    for (namespace, group) in &batch.new_kv_by_namespace {
        delta.kv_added += group.pair_count();
        ops.push(WriteOp::ReplaceNamespace {
            namespace: namespace.clone(),
            pairs: group.pairs(),
        });
        replacement.set_group(namespace.clone(), group.clone());
    }

    MergeResult {
        replacement,
        delta,
        ops,
    }
}
