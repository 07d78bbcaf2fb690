//! Annotation store boundary
//!
//! The host object store is an external collaborator. The engine consumes
//! these primitives only; `SqliteStore` is the bundled adapter.

mod sqlite;

pub use sqlite::SqliteStore;

use crate::model::{Entity, EntityId, EntityKind, KvPair, Namespace};
use async_trait::async_trait;
use minkv_common::Result;
use std::collections::HashMap;
use std::fmt;

/// Store identifier of an annotation object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnnotationId(pub i64);

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An annotation currently linked to an entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredAnnotation {
    /// Key-value annotation; its pairs are immutable once attached
    Map {
        id: AnnotationId,
        namespace: Namespace,
        pairs: Vec<KvPair>,
    },
    /// Shared tag (tags carry no namespace)
    Tag { id: AnnotationId, value: String },
}

impl StoredAnnotation {
    pub fn id(&self) -> AnnotationId {
        match self {
            StoredAnnotation::Map { id, .. } | StoredAnnotation::Tag { id, .. } => *id,
        }
    }
}

/// Read/write primitives of the host annotation store
#[async_trait]
pub trait AnnotationStore: Send + Sync {
    /// Fetch one entity by kind and id
    async fn get_entity(&self, kind: EntityKind, id: EntityId) -> Result<Option<Entity>>;

    /// Direct children of `parent`, each carrying `parent.id` as its parent key
    async fn list_children(&self, parent: &Entity) -> Result<Vec<Entity>>;

    /// Path the image was imported from
    async fn client_path(&self, image: &Entity) -> Result<Option<String>>;

    /// Every annotation linked to `entity`
    async fn list_annotations(&self, entity: &Entity) -> Result<Vec<StoredAnnotation>>;

    /// Delete annotation objects (and their links)
    async fn delete_annotations(&self, ids: &[AnnotationId]) -> Result<()>;

    /// Remove links from `entity` without deleting the (shared) annotations
    async fn unlink_annotations(&self, entity: &Entity, ids: &[AnnotationId]) -> Result<()>;

    /// Create an unlinked map annotation holding `pairs` in order
    async fn create_map_annotation(
        &self,
        namespace: &Namespace,
        pairs: &[KvPair],
    ) -> Result<AnnotationId>;

    /// Create an unlinked tag
    async fn create_tag(&self, value: &str) -> Result<AnnotationId>;

    /// Link an annotation to `entity` (no-op if already linked)
    async fn link_annotation(&self, entity: &Entity, id: AnnotationId) -> Result<()>;

    /// All tags in the store, value → id
    async fn list_tags(&self) -> Result<HashMap<String, AnnotationId>>;
}
