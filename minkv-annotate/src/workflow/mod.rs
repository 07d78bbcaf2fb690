//! Annotation jobs
//!
//! - `CsvJob`: tabular rows → resolve against a dataset/plate/screen → merge
//!   into the default key-value group
//! - `TagJob`: images of a project/dataset (or single images) → tag-database
//!   triples → split → merge under Append or Overwrite
//!
//! Processing is sequential: one record, one target entity at a time.

mod csv_job;
mod tag_job;

pub use csv_job::CsvJob;
pub use tag_job::TagJob;

use crate::merge::MergeDelta;
use crate::model::{Entity, EntityId, EntityKind};
use crate::store::AnnotationStore;
use crate::writer::WriteReport;
use minkv_common::Error;
use serde::Serialize;
use std::fmt;
use tracing::warn;

/// Totals of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub roots_processed: usize,
    pub roots_failed: usize,
    /// Annotatable objects found under the roots
    pub candidates: usize,
    pub objects_updated: usize,
    pub records_total: usize,
    pub records_not_found: usize,
    pub kv_added: usize,
    pub kv_removed: usize,
    pub tags_added: usize,
    pub tags_removed: usize,
    pub write_failures: usize,
}

impl RunSummary {
    /// True when every root was processed and every write succeeded
    pub fn is_success(&self) -> bool {
        self.roots_failed == 0 && self.write_failures == 0
    }

    fn record_outcome(&mut self, delta: MergeDelta, report: &WriteReport) {
        self.write_failures += report.failures.len();
        if report.is_clean() {
            self.objects_updated += 1;
            self.kv_added += delta.kv_added;
            self.kv_removed += delta.kv_removed;
            self.tags_added += delta.tags_added;
            self.tags_removed += delta.tags_removed;
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Updated {}/{} objects: {} KV pairs added, {} removed; {} tags added, {} removed",
            self.objects_updated,
            self.candidates,
            self.kv_added,
            self.kv_removed,
            self.tags_added,
            self.tags_removed
        )?;
        if self.records_not_found > 0 {
            write!(f, "; {} of {} records not found", self.records_not_found, self.records_total)?;
        }
        if self.write_failures > 0 {
            write!(f, "; {} write failures", self.write_failures)?;
        }
        if self.roots_failed > 0 {
            write!(f, "; {} of {} roots failed", self.roots_failed, self.roots_processed)?;
        }
        Ok(())
    }
}

/// Fetch a root entity; a missing root is logged and yields `None`
async fn fetch_root(
    store: &dyn AnnotationStore,
    kind: EntityKind,
    id: EntityId,
) -> minkv_common::Result<Option<Entity>> {
    let root = store.get_entity(kind, id).await?;
    if root.is_none() {
        warn!(%kind, entity_id = %id, "Root object not found");
    }
    Ok(root)
}

fn unsupported_root(kind: EntityKind, supported: &str) -> Error {
    Error::InvalidInput(format!(
        "{} is not a supported root kind (expected {})",
        kind, supported
    ))
}
