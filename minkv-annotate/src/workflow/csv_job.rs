//! Key-value annotation from delimited tabular input

use super::{fetch_root, unsupported_root, RunSummary};
use crate::error::AnnotateResult;
use crate::hierarchy::{load_tree, HierarchyIndex};
use crate::merge::{merge_tabular, record_pairs};
use crate::model::{Entity, EntityId, EntityKind, KvGroup};
use crate::resolver::resolve;
use crate::snapshot::capture;
use crate::store::AnnotationStore;
use crate::tabular::{read_table, records, ColumnLayout, TabularTable};
use crate::utils::RetryPolicy;
use crate::writer::AnnotationWriter;
use indexmap::IndexMap;
use tracing::{debug, error, info, warn};

pub struct CsvJob<'a> {
    store: &'a dyn AnnotationStore,
    retry: RetryPolicy,
}

impl<'a> CsvJob<'a> {
    pub fn new(store: &'a dyn AnnotationStore, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Annotate the objects under each root from `csv_text`
    ///
    /// A root that cannot be indexed (duplicate names, missing columns) is
    /// counted as failed and the remaining roots still run.
    pub async fn run(
        &self,
        root_kind: EntityKind,
        root_ids: &[EntityId],
        csv_text: &str,
    ) -> AnnotateResult<RunSummary> {
        if !matches!(
            root_kind,
            EntityKind::Dataset | EntityKind::Plate | EntityKind::Screen
        ) {
            return Err(unsupported_root(root_kind, "dataset, plate or screen").into());
        }

        let table = read_table(csv_text)?;
        let mut summary = RunSummary::default();
        let mut writer = AnnotationWriter::new(self.store, self.retry);

        for &id in root_ids {
            summary.roots_processed += 1;
            let Some(root) = fetch_root(self.store, root_kind, id).await? else {
                summary.roots_failed += 1;
                continue;
            };

            match self.process_root(root, &table, &mut writer, &mut summary).await {
                Ok(()) => {}
                Err(err) if err.aborts_root() => {
                    error!(%root_kind, entity_id = %id, error = %err, "Root skipped");
                    summary.roots_failed += 1;
                }
                Err(err) => return Err(err),
            }
        }

        info!(%summary, "CSV annotation finished");
        Ok(summary)
    }

    async fn process_root(
        &self,
        root: Entity,
        table: &TabularTable,
        writer: &mut AnnotationWriter<'_>,
        summary: &mut RunSummary,
    ) -> AnnotateResult<()> {
        let layout = ColumnLayout::from_header(&table.header, root.kind)?;
        let tree = load_tree(self.store, root).await?;
        let index = HierarchyIndex::build(&tree)?;
        info!(
            kind = %index.root_kind(),
            entity_id = %index.root().id,
            images = index.image_count(),
            "Indexed hierarchy"
        );

        // Rows naming the same object are merged into one write
        let mut targets: IndexMap<EntityId, (Entity, KvGroup)> = IndexMap::new();
        let rows = records(table, &layout);
        summary.records_total += rows.len();
        summary.candidates += index.image_count();

        for record in &rows {
            let Some(entity) = resolve(record, &index) else {
                summary.records_not_found += 1;
                continue;
            };
            let additions = record_pairs(record);
            let (_, group) = targets
                .entry(entity.id)
                .or_insert_with(|| (entity.clone(), KvGroup::new()));
            for pair in additions.pairs() {
                group.insert(&pair.key, &pair.value);
            }
        }

        for (entity, additions) in targets.values() {
            let existing = match capture(self.store, entity).await {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    warn!(entity_id = %entity.id, error = %err, "Could not read annotations");
                    summary.write_failures += 1;
                    continue;
                }
            };

            let result = merge_tabular(&existing, additions);
            if result.is_unchanged() {
                debug!(entity_id = %entity.id, "No change in key-value pairs");
                continue;
            }

            let report = writer.apply(entity, &result.ops).await;
            summary.record_outcome(result.delta, &report);
        }

        Ok(())
    }
}

