//! Shared fixtures for minkv-annotate integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use minkv_annotate::model::{AnnotationSnapshot, Entity, EntityId, EntityKind, KvPair, Namespace};
use minkv_annotate::snapshot::capture;
use minkv_annotate::store::{AnnotationId, AnnotationStore, SqliteStore, StoredAnnotation};
use minkv_annotate::tagdb::schema::create_tabbles_tables;
use minkv_common::config::CLIENT_MAP_NAMESPACE;
use minkv_common::db::init_memory_database;
use minkv_common::{Error, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub async fn memory_store() -> SqliteStore {
    let pool = init_memory_database().await.unwrap();
    SqliteStore::new(pool, CLIENT_MAP_NAMESPACE)
}

/// Insert `kind`/`name` under `parent`
pub async fn add(
    store: &SqliteStore,
    parent: Option<EntityId>,
    kind: EntityKind,
    name: &str,
) -> Entity {
    add_with_path(store, parent, kind, name, None).await
}

pub async fn add_with_path(
    store: &SqliteStore,
    parent: Option<EntityId>,
    kind: EntityKind,
    name: &str,
    client_path: Option<&str>,
) -> Entity {
    let id = store.insert_entity(kind, name, client_path).await.unwrap();
    if let Some(parent) = parent {
        store.add_child(parent, id).await.unwrap();
    }
    let entity = Entity::new(kind, id.0, name);
    match parent {
        Some(parent) => entity.with_parent(parent),
        None => entity,
    }
}

/// Attach a map annotation directly, bypassing the writer
pub async fn attach_pairs(
    store: &dyn AnnotationStore,
    entity: &Entity,
    namespace: Namespace,
    pairs: &[(&str, &str)],
) -> AnnotationId {
    let pairs: Vec<KvPair> = pairs.iter().map(|(k, v)| KvPair::new(*k, *v)).collect();
    let id = store.create_map_annotation(&namespace, &pairs).await.unwrap();
    store.link_annotation(entity, id).await.unwrap();
    id
}

pub async fn snapshot(store: &dyn AnnotationStore, entity: &Entity) -> AnnotationSnapshot {
    capture(store, entity).await.unwrap()
}

pub async fn map_annotation_ids(store: &dyn AnnotationStore, entity: &Entity) -> Vec<AnnotationId> {
    store
        .list_annotations(entity)
        .await
        .unwrap()
        .into_iter()
        .filter(|a| matches!(a, StoredAnnotation::Map { .. }))
        .map(|a| a.id())
        .collect()
}

/// Store wrapper that can be told to fail writes
pub struct FlakyStore {
    inner: SqliteStore,
    pub fail_create_for: std::sync::Mutex<Vec<String>>,
    pub fail_deletes: AtomicBool,
    pub delete_calls: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: SqliteStore) -> Self {
        Self {
            inner,
            fail_create_for: std::sync::Mutex::new(Vec::new()),
            fail_deletes: AtomicBool::new(false),
            delete_calls: AtomicUsize::new(0),
        }
    }

    /// Fail map creation whenever a pair uses `key`
    pub fn fail_create_with_key(&self, key: &str) {
        self.fail_create_for.lock().unwrap().push(key.to_string());
    }

    pub fn inner(&self) -> &SqliteStore {
        &self.inner
    }
}

#[async_trait]
impl AnnotationStore for FlakyStore {
    async fn get_entity(&self, kind: EntityKind, id: EntityId) -> Result<Option<Entity>> {
        self.inner.get_entity(kind, id).await
    }

    async fn list_children(&self, parent: &Entity) -> Result<Vec<Entity>> {
        self.inner.list_children(parent).await
    }

    async fn client_path(&self, image: &Entity) -> Result<Option<String>> {
        self.inner.client_path(image).await
    }

    async fn list_annotations(&self, entity: &Entity) -> Result<Vec<StoredAnnotation>> {
        self.inner.list_annotations(entity).await
    }

    async fn delete_annotations(&self, ids: &[AnnotationId]) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Error::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.delete_annotations(ids).await
    }

    async fn unlink_annotations(&self, entity: &Entity, ids: &[AnnotationId]) -> Result<()> {
        self.inner.unlink_annotations(entity, ids).await
    }

    async fn create_map_annotation(
        &self,
        namespace: &Namespace,
        pairs: &[KvPair],
    ) -> Result<AnnotationId> {
        let failing = {
            let keys = self.fail_create_for.lock().unwrap();
            pairs.iter().any(|p| keys.contains(&p.key))
        };
        if failing {
            return Err(Error::Internal("create rejected".to_string()));
        }
        self.inner.create_map_annotation(namespace, pairs).await
    }

    async fn create_tag(&self, value: &str) -> Result<AnnotationId> {
        self.inner.create_tag(value).await
    }

    async fn link_annotation(&self, entity: &Entity, id: AnnotationId) -> Result<()> {
        self.inner.link_annotation(entity, id).await
    }

    async fn list_tags(&self) -> Result<HashMap<String, AnnotationId>> {
        self.inner.list_tags().await
    }
}

/// In-memory tag database with the Tabbles tables
pub struct TagDbFixture {
    pub pool: SqlitePool,
    next_id: i64,
}

impl TagDbFixture {
    pub async fn new() -> Self {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        create_tabbles_tables(&pool).await.unwrap();
        Self { pool, next_id: 1 }
    }

    /// Create a tag, optionally as child of `parent`; returns its id
    pub async fn tag(&mut self, name: &str, parent: Option<i64>) -> i64 {
        let id = self.next_id;
        self.next_id += 1;

        sqlx::query("INSERT INTO tag (id, name, id_tabble) VALUES (?, ?, ?)")
            .bind(id)
            .bind(name)
            .bind(id * 10)
            .execute(&self.pool)
            .await
            .unwrap();

        if let Some(parent) = parent {
            sqlx::query(
                "INSERT INTO tabble_is_child_of_tag_for_user (id_tabble_child, id_tag_parent) VALUES (?, ?)",
            )
            .bind(id * 10)
            .bind(parent)
            .execute(&self.pool)
            .await
            .unwrap();
        }
        id
    }

    /// Register a file (tag-database path form) carrying `tags`
    pub async fn file(&mut self, path: &str, tags: &[i64]) {
        let taggable = self.next_id;
        self.next_id += 1;

        sqlx::query("INSERT INTO file2 (idTaggable, path) VALUES (?, ?)")
            .bind(taggable)
            .bind(path)
            .execute(&self.pool)
            .await
            .unwrap();
        for tag in tags {
            sqlx::query("INSERT INTO taggable_has_tag (id_taggable, id_tag) VALUES (?, ?)")
                .bind(taggable)
                .bind(*tag)
                .execute(&self.pool)
                .await
                .unwrap();
        }
    }
}
