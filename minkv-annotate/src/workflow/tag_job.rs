//! Annotation of images from the tag database

use super::{fetch_root, unsupported_root, RunSummary};
use crate::error::AnnotateResult;
use crate::merge::{merge_tag_batch, split_triples, MergePolicy, SplitOptions};
use crate::model::{Entity, EntityId, EntityKind, TagTriple};
use crate::snapshot::capture;
use crate::store::AnnotationStore;
use crate::tagdb::{normalize_client_path, TagSource};
use crate::utils::RetryPolicy;
use crate::writer::AnnotationWriter;
use tracing::{debug, info, warn};

pub struct TagJob<'a> {
    store: &'a dyn AnnotationStore,
    source: &'a mut dyn TagSource,
    retry: RetryPolicy,
    policy: MergePolicy,
    options: SplitOptions,
}

impl<'a> TagJob<'a> {
    pub fn new(
        store: &'a dyn AnnotationStore,
        source: &'a mut dyn TagSource,
        retry: RetryPolicy,
        policy: MergePolicy,
        options: SplitOptions,
    ) -> Self {
        Self {
            store,
            source,
            retry,
            policy,
            options,
        }
    }

    /// Annotate every image under the roots from their tag-database entries
    ///
    /// A configuration inconsistency stops the run with an error; write
    /// failures are counted and the next image is processed.
    pub async fn run(
        &mut self,
        root_kind: EntityKind,
        root_ids: &[EntityId],
    ) -> AnnotateResult<RunSummary> {
        let mut summary = RunSummary::default();
        let images = self.collect_images(root_kind, root_ids, &mut summary).await?;
        summary.candidates = images.len();
        info!(
            images = images.len(),
            policy = %self.policy,
            namespaced = self.options.namespaced,
            single_tags = self.options.single_tags,
            "Collected images"
        );

        let store = self.store;
        let mut writer = AnnotationWriter::new(store, self.retry);
        // Adjacent images sharing a source file reuse the previous query
        let mut last: Option<(String, Vec<TagTriple>)> = None;

        for image in &images {
            summary.records_total += 1;
            info!(entity_id = %image.id, name = %image.name, "Processing image");

            let Some(client_path) = store.client_path(image).await? else {
                warn!(entity_id = %image.id, "Image has no client path");
                summary.records_not_found += 1;
                continue;
            };
            let path = normalize_client_path(&client_path);

            let cached = matches!(&last, Some((last_path, _)) if *last_path == path);
            if !cached {
                let fetched = self.source.fetch_triples(&path).await?;
                last = Some((path.clone(), fetched));
            }
            let triples = last.as_ref().map(|(_, t)| t.as_slice()).unwrap_or(&[]);
            if triples.is_empty() {
                debug!(%path, "No tags for file");
            }

            let batch = split_triples(triples, &self.options);
            batch.validate(&self.options)?;

            let existing = match capture(store, image).await {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    warn!(entity_id = %image.id, error = %err, "Could not read annotations");
                    summary.write_failures += 1;
                    continue;
                }
            };

            let result = merge_tag_batch(&existing, &batch, self.policy, &self.options);
            if result.is_unchanged() {
                debug!(entity_id = %image.id, "No change in annotations");
                continue;
            }

            let report = writer.apply(image, &result.ops).await;
            summary.record_outcome(result.delta, &report);
        }

        info!(%summary, "Tag annotation finished");
        Ok(summary)
    }

    /// Dataset → images; Image → itself; Project → datasets → images
    async fn collect_images(
        &self,
        root_kind: EntityKind,
        root_ids: &[EntityId],
        summary: &mut RunSummary,
    ) -> AnnotateResult<Vec<Entity>> {
        if !matches!(
            root_kind,
            EntityKind::Dataset | EntityKind::Image | EntityKind::Project
        ) {
            return Err(unsupported_root(root_kind, "dataset, image or project").into());
        }

        let mut images = Vec::new();
        for &id in root_ids {
            summary.roots_processed += 1;
            let Some(root) = fetch_root(self.store, root_kind, id).await? else {
                summary.roots_failed += 1;
                continue;
            };

            match root.kind {
                EntityKind::Image => images.push(root),
                EntityKind::Dataset => images.extend(self.images_of(&root).await?),
                _ => {
                    for dataset in self.store.list_children(&root).await? {
                        if dataset.kind == EntityKind::Dataset {
                            images.extend(self.images_of(&dataset).await?);
                        }
                    }
                }
            }
        }
        Ok(images)
    }

    async fn images_of(&self, dataset: &Entity) -> AnnotateResult<Vec<Entity>> {
        Ok(self
            .store
            .list_children(dataset)
            .await?
            .into_iter()
            .filter(|child| child.kind == EntityKind::Image)
            .collect())
    }
}
