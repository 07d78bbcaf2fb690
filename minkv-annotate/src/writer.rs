//! Executes merge plans against the annotation store
//!
//! Delete-then-recreate per namespace is two store calls without a
//! transaction: a failure between them leaves the namespace empty on that
//! entity. Only the delete step is retried.

use crate::error::{AnnotateError, AnnotateResult};
use crate::merge::WriteOp;
use crate::model::{Entity, KvPair, Namespace};
use crate::store::{AnnotationId, AnnotationStore, StoredAnnotation};
use crate::utils::{retry_bounded, RetryPolicy};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Outcome of applying one entity's plan
#[derive(Debug, Default)]
pub struct WriteReport {
    pub applied: usize,
    pub failures: Vec<AnnotateError>,
}

impl WriteReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct AnnotationWriter<'a> {
    store: &'a dyn AnnotationStore,
    retry: RetryPolicy,
    /// Store-wide tag lookup, loaded on first use
    tags: Option<HashMap<String, AnnotationId>>,
}

impl<'a> AnnotationWriter<'a> {
    pub fn new(store: &'a dyn AnnotationStore, retry: RetryPolicy) -> Self {
        Self {
            store,
            retry,
            tags: None,
        }
    }

    /// Apply `ops` in order; a failed op is recorded and the rest still run
    pub async fn apply(&mut self, entity: &Entity, ops: &[WriteOp]) -> WriteReport {
        let mut report = WriteReport::default();

        for op in ops {
            let outcome = match op {
                WriteOp::ReplaceNamespace { namespace, pairs } => {
                    self.replace_namespace(entity, namespace, pairs).await
                }
                WriteOp::DeleteNamespace { namespace } => {
                    self.delete_namespace(entity, namespace).await.map(|_| ())
                }
                WriteOp::UnlinkAllTags => self.unlink_all_tags(entity).await.map(|_| ()),
                WriteOp::LinkTag { value } => self.ensure_tag_linked(entity, value).await,
            };

            match outcome {
                Ok(()) => report.applied += 1,
                Err(err) => {
                    warn!(
                        entity_id = %entity.id,
                        operation = op.name(),
                        error = %err,
                        "Annotation write failed"
                    );
                    report.failures.push(err);
                }
            }
        }

        report
    }

    /// Delete every annotation of `namespace` on `entity`, then create and
    /// link one annotation holding all `pairs`
    pub async fn replace_namespace(
        &mut self,
        entity: &Entity,
        namespace: &Namespace,
        pairs: &[KvPair],
    ) -> AnnotateResult<()> {
        self.delete_namespace(entity, namespace).await?;

        if pairs.is_empty() {
            return Ok(());
        }

        let id = self
            .store
            .create_map_annotation(namespace, pairs)
            .await
            .map_err(|e| AnnotateError::write("create", entity.id, e))?;
        self.store
            .link_annotation(entity, id)
            .await
            .map_err(|e| AnnotateError::write("link", entity.id, e))?;

        debug!(
            entity_id = %entity.id,
            %namespace,
            annotation_id = %id,
            pairs = pairs.len(),
            "Created map annotation"
        );
        Ok(())
    }

    /// Delete the entity's map annotations of `namespace`; returns how many
    pub async fn delete_namespace(
        &mut self,
        entity: &Entity,
        namespace: &Namespace,
    ) -> AnnotateResult<usize> {
        let ids: Vec<AnnotationId> = self
            .list(entity)
            .await?
            .into_iter()
            .filter_map(|annotation| match annotation {
                StoredAnnotation::Map {
                    id, namespace: ns, ..
                } if &ns == namespace => Some(id),
                _ => None,
            })
            .collect();

        if ids.is_empty() {
            return Ok(0);
        }

        let store = self.store;
        retry_bounded("delete_annotations", &self.retry, || {
            store.delete_annotations(&ids)
        })
        .await
        .map_err(|e| AnnotateError::write("delete", entity.id, e))?;

        debug!(entity_id = %entity.id, %namespace, deleted = ids.len(), "Deleted map annotations");
        Ok(ids.len())
    }

    /// Unlink every tag from `entity`; the shared tags themselves remain
    pub async fn unlink_all_tags(&mut self, entity: &Entity) -> AnnotateResult<usize> {
        let ids: Vec<AnnotationId> = self
            .list(entity)
            .await?
            .into_iter()
            .filter(|annotation| matches!(annotation, StoredAnnotation::Tag { .. }))
            .map(|annotation| annotation.id())
            .collect();

        if ids.is_empty() {
            return Ok(0);
        }

        self.store
            .unlink_annotations(entity, &ids)
            .await
            .map_err(|e| AnnotateError::write("unlink", entity.id, e))?;
        Ok(ids.len())
    }

    /// Look up the tag by value across the store, create it if absent, link it
    pub async fn ensure_tag_linked(&mut self, entity: &Entity, value: &str) -> AnnotateResult<()> {
        let id = match self.tag_id(value, entity).await? {
            Some(id) => id,
            None => {
                let id = self
                    .store
                    .create_tag(value)
                    .await
                    .map_err(|e| AnnotateError::write("create_tag", entity.id, e))?;
                debug!(tag = value, annotation_id = %id, "Created tag");
                if let Some(tags) = self.tags.as_mut() {
                    tags.insert(value.to_string(), id);
                }
                id
            }
        };

        self.store
            .link_annotation(entity, id)
            .await
            .map_err(|e| AnnotateError::write("link", entity.id, e))
    }

    async fn tag_id(&mut self, value: &str, entity: &Entity) -> AnnotateResult<Option<AnnotationId>> {
        if self.tags.is_none() {
            let tags = self
                .store
                .list_tags()
                .await
                .map_err(|e| AnnotateError::write("list_tags", entity.id, e))?;
            debug!(count = tags.len(), "Loaded store tags");
            self.tags = Some(tags);
        }
        Ok(self.tags.as_ref().and_then(|tags| tags.get(value).copied()))
    }

    async fn list(&self, entity: &Entity) -> AnnotateResult<Vec<StoredAnnotation>> {
        self.store
            .list_annotations(entity)
            .await
            .map_err(|e| AnnotateError::write("list", entity.id, e))
    }
}
