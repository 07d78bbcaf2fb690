//! Capture of the annotations currently attached to an entity

use crate::model::{AnnotationSnapshot, Entity, KvGroup};
use crate::store::{AnnotationStore, StoredAnnotation};
use minkv_common::Result;

/// Read the entity's linked annotations into an owned snapshot
///
/// Several map annotations of one namespace fold into a single group.
pub async fn capture(store: &dyn AnnotationStore, entity: &Entity) -> Result<AnnotationSnapshot> {
    let annotations = store.list_annotations(entity).await?;
    let snapshot = snapshot_from(&annotations);

    tracing::debug!(
        entity_id = %entity.id,
        annotations = annotations.len(),
        pairs = snapshot.pair_count(),
        tags = snapshot.tags().len(),
        "Existing annotations"
    );

    Ok(snapshot)
}

pub fn snapshot_from(annotations: &[StoredAnnotation]) -> AnnotationSnapshot {
    let mut snapshot = AnnotationSnapshot::new();
    for annotation in annotations {
        match annotation {
            StoredAnnotation::Map {
                namespace, pairs, ..
            } => {
                if snapshot.group(namespace).is_none() {
                    snapshot.set_group(namespace.clone(), KvGroup::new());
                }
                for pair in pairs {
                    snapshot.insert_pair(namespace.clone(), &pair.key, &pair.value);
                }
            }
            StoredAnnotation::Tag { value, .. } => {
                snapshot.insert_tag(value);
            }
        }
    }
    snapshot
}
