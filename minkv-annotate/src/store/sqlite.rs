//! SQLite-backed annotation store
//!
//! Schema: see `minkv_common::db::init`.

use super::{AnnotationId, AnnotationStore, StoredAnnotation};
use crate::model::{Entity, EntityId, EntityKind, KvPair, Namespace};
use async_trait::async_trait;
use minkv_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;

/// Annotation store over the shared SQLite schema
#[derive(Clone)]
pub struct SqliteStore {
    db: SqlitePool,
    /// Namespace string written for `Namespace::Default`
    default_namespace: String,
}

impl SqliteStore {
    pub fn new(db: SqlitePool, default_namespace: impl Into<String>) -> Self {
        Self {
            db,
            default_namespace: default_namespace.into(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    fn namespace_from_db(&self, raw: Option<String>) -> Namespace {
        match raw {
            Some(ns) if ns != self.default_namespace => Namespace::named(ns),
            _ => Namespace::Default,
        }
    }

    fn namespace_to_db<'a>(&'a self, namespace: &'a Namespace) -> &'a str {
        namespace.as_named().unwrap_or(&self.default_namespace)
    }

    /// Insert an entity row (fixtures and import tooling)
    pub async fn insert_entity(
        &self,
        kind: EntityKind,
        name: &str,
        client_path: Option<&str>,
    ) -> Result<EntityId> {
        let result = sqlx::query("INSERT INTO entities (kind, name, client_path) VALUES (?, ?, ?)")
            .bind(kind.as_str())
            .bind(name)
            .bind(client_path)
            .execute(&self.db)
            .await?;

        Ok(EntityId(result.last_insert_rowid()))
    }

    /// Place `child` inside `parent`
    pub async fn add_child(&self, parent: EntityId, child: EntityId) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO entity_children (parent_id, child_id) VALUES (?, ?)")
            .bind(parent.0)
            .bind(child.0)
            .execute(&self.db)
            .await?;

        Ok(())
    }
}

fn parse_kind(raw: &str) -> Result<EntityKind> {
    raw.parse()
        .map_err(|e: String| Error::Internal(format!("Invalid entity kind in store: {}", e)))
}

#[async_trait]
impl AnnotationStore for SqliteStore {
    async fn get_entity(&self, kind: EntityKind, id: EntityId) -> Result<Option<Entity>> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT id, name FROM entities WHERE id = ? AND kind = ?")
                .bind(id.0)
                .bind(kind.as_str())
                .fetch_optional(&self.db)
                .await?;

        Ok(row.map(|(id, name)| Entity::new(kind, id, name)))
    }

    async fn list_children(&self, parent: &Entity) -> Result<Vec<Entity>> {
        let rows: Vec<(i64, String, String)> = sqlx::query_as(
            r#"
            SELECT e.id, e.kind, e.name
            FROM entities e
            INNER JOIN entity_children c ON c.child_id = e.id
            WHERE c.parent_id = ?
            ORDER BY e.id
            "#,
        )
        .bind(parent.id.0)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|(id, kind, name)| {
                Ok(Entity::new(parse_kind(&kind)?, id, name).with_parent(parent.id))
            })
            .collect()
    }

    async fn client_path(&self, image: &Entity) -> Result<Option<String>> {
        let path: Option<Option<String>> =
            sqlx::query_scalar("SELECT client_path FROM entities WHERE id = ?")
                .bind(image.id.0)
                .fetch_optional(&self.db)
                .await?;

        Ok(path.flatten())
    }

    async fn list_annotations(&self, entity: &Entity) -> Result<Vec<StoredAnnotation>> {
        let rows = sqlx::query(
            r#"
            SELECT a.id, a.kind, a.namespace, a.text_value
            FROM annotations a
            INNER JOIN annotation_links l ON l.annotation_id = a.id
            WHERE l.entity_id = ?
            ORDER BY a.id
            "#,
        )
        .bind(entity.id.0)
        .fetch_all(&self.db)
        .await?;

        let value_rows: Vec<(i64, String, String)> = sqlx::query_as(
            r#"
            SELECT mv.annotation_id, mv.key, mv.value
            FROM map_values mv
            INNER JOIN annotation_links l ON l.annotation_id = mv.annotation_id
            WHERE l.entity_id = ?
            ORDER BY mv.annotation_id, mv.position
            "#,
        )
        .bind(entity.id.0)
        .fetch_all(&self.db)
        .await?;

        let mut pairs_by_annotation: HashMap<i64, Vec<KvPair>> = HashMap::new();
        for (annotation_id, key, value) in value_rows {
            pairs_by_annotation
                .entry(annotation_id)
                .or_default()
                .push(KvPair { key, value });
        }

        let mut annotations = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.get("id");
            let kind: String = row.get("kind");
            match kind.as_str() {
                "map" => annotations.push(StoredAnnotation::Map {
                    id: AnnotationId(id),
                    namespace: self.namespace_from_db(row.get("namespace")),
                    pairs: pairs_by_annotation.remove(&id).unwrap_or_default(),
                }),
                "tag" => {
                    let value: Option<String> = row.get("text_value");
                    annotations.push(StoredAnnotation::Tag {
                        id: AnnotationId(id),
                        value: value.unwrap_or_default(),
                    });
                }
                other => {
                    return Err(Error::Internal(format!(
                        "Invalid annotation kind in store: {}",
                        other
                    )))
                }
            }
        }

        Ok(annotations)
    }

    async fn delete_annotations(&self, ids: &[AnnotationId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut tx = self.db.begin().await?;
        for id in ids {
            sqlx::query("DELETE FROM annotations WHERE id = ?")
                .bind(id.0)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        tracing::debug!(count = ids.len(), "Deleted annotations");
        Ok(())
    }

    async fn unlink_annotations(&self, entity: &Entity, ids: &[AnnotationId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut tx = self.db.begin().await?;
        for id in ids {
            sqlx::query("DELETE FROM annotation_links WHERE entity_id = ? AND annotation_id = ?")
                .bind(entity.id.0)
                .bind(id.0)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn create_map_annotation(
        &self,
        namespace: &Namespace,
        pairs: &[KvPair],
    ) -> Result<AnnotationId> {
        let mut tx = self.db.begin().await?;

        let result = sqlx::query("INSERT INTO annotations (kind, namespace) VALUES ('map', ?)")
            .bind(self.namespace_to_db(namespace))
            .execute(&mut *tx)
            .await?;
        let id = result.last_insert_rowid();

        for (position, pair) in pairs.iter().enumerate() {
            sqlx::query(
                "INSERT INTO map_values (annotation_id, position, key, value) VALUES (?, ?, ?, ?)",
            )
            .bind(id)
            .bind(position as i64)
            .bind(&pair.key)
            .bind(&pair.value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(AnnotationId(id))
    }

    async fn create_tag(&self, value: &str) -> Result<AnnotationId> {
        let result = sqlx::query("INSERT INTO annotations (kind, text_value) VALUES ('tag', ?)")
            .bind(value)
            .execute(&self.db)
            .await?;

        Ok(AnnotationId(result.last_insert_rowid()))
    }

    async fn link_annotation(&self, entity: &Entity, id: AnnotationId) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO annotation_links (entity_id, annotation_id) VALUES (?, ?)")
            .bind(entity.id.0)
            .bind(id.0)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    async fn list_tags(&self) -> Result<HashMap<String, AnnotationId>> {
        let rows: Vec<(i64, Option<String>)> = sqlx::query_as(
            "SELECT id, text_value FROM annotations WHERE kind = 'tag' ORDER BY id",
        )
        .fetch_all(&self.db)
        .await?;

        // First tag wins when the store holds duplicates of a value
        let mut tags = HashMap::new();
        for (id, value) in rows {
            if let Some(value) = value {
                tags.entry(value).or_insert(AnnotationId(id));
            }
        }
        Ok(tags)
    }
}
