//! Annotation store initialisation
//!
//! The store holds a containment tree (project/dataset/image and
//! screen/plate/well/image), key-value ("map") and tag annotations, and the
//! links attaching annotations to entities. Tables are created idempotently.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Open (or create) the annotation store at `db_path`
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}", db_path.display());
    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new annotation store: {}", db_path.display());
    } else {
        info!("Opened existing annotation store: {}", db_path.display());
    }

    create_store_tables(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory store with the full schema
///
/// One connection only: every SQLite `:memory:` connection is its own database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    create_store_tables(&pool).await?;

    Ok(pool)
}

/// Create every store table
pub async fn create_store_tables(pool: &SqlitePool) -> Result<()> {
    create_entities_table(pool).await?;
    create_entity_children_table(pool).await?;
    create_annotations_table(pool).await?;
    create_map_values_table(pool).await?;
    create_annotation_links_table(pool).await?;
    Ok(())
}

/// Entities of the containment tree
///
/// `client_path` is the path the image was imported from (images only).
pub async fn create_entities_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entities (
            id INTEGER PRIMARY KEY,
            kind TEXT NOT NULL CHECK (kind IN ('project', 'dataset', 'image', 'screen', 'plate', 'well')),
            name TEXT NOT NULL,
            client_path TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Containment links; an image may sit in several datasets
pub async fn create_entity_children_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entity_children (
            parent_id INTEGER NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
            child_id INTEGER NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
            PRIMARY KEY (parent_id, child_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_entity_children_child ON entity_children(child_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Annotation objects: `map` rows own key-value pairs, `tag` rows carry `text_value`
pub async fn create_annotations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS annotations (
            id INTEGER PRIMARY KEY,
            kind TEXT NOT NULL CHECK (kind IN ('map', 'tag')),
            namespace TEXT,
            text_value TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Ordered pairs of a map annotation
pub async fn create_map_values_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS map_values (
            annotation_id INTEGER NOT NULL REFERENCES annotations(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (annotation_id, position)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_annotation_links_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS annotation_links (
            entity_id INTEGER NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
            annotation_id INTEGER NOT NULL REFERENCES annotations(id) ON DELETE CASCADE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (entity_id, annotation_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
