//! Tabbles-schema tag database adapter

use super::{dedup_triples, TagDbConfig, TagSource};
use crate::model::TagTriple;
use async_trait::async_trait;
use minkv_common::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

/// Value tag → parent tag (key) → grand-parent tag (namespace) for one file
///
/// The path is matched exactly, so `_` and `%` in file names are literal.
const TRIPLES_QUERY: &str = r#"
    SELECT DISTINCT tag3.name AS namespace_, tag2.name AS key_, tag1.name AS value_
    FROM file2 files
    INNER JOIN taggable_has_tag has_tag ON files.idTaggable = has_tag.id_taggable
    INNER JOIN tag tag1 ON tag1.id = has_tag.id_tag
    LEFT JOIN tabble_is_child_of_tag_for_user child1 ON child1.id_tabble_child = tag1.id_tabble
    LEFT JOIN tag tag2 ON tag2.id = child1.id_tag_parent
    LEFT JOIN tabble_is_child_of_tag_for_user child2 ON child2.id_tabble_child = tag2.id_tabble
    LEFT JOIN tag tag3 ON tag3.id = child2.id_tag_parent
    WHERE files.path = ?
    ORDER BY namespace_
"#;

pub struct TabblesSource {
    db: SqlitePool,
}

impl TabblesSource {
    /// Open one pooled connection for the whole run
    pub async fn connect(config: &TagDbConfig) -> Result<Self> {
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&config.url)
            .await?;

        tracing::info!("Connected to tag database");
        Ok(Self { db })
    }

    pub fn from_pool(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TagSource for TabblesSource {
    async fn fetch_triples(&mut self, path: &str) -> Result<Vec<TagTriple>> {
        let rows: Vec<(Option<String>, Option<String>, String)> = sqlx::query_as(TRIPLES_QUERY)
            .bind(path)
            .fetch_all(&self.db)
            .await?;

        let raw = rows.len();
        let triples = dedup_triples(
            rows.into_iter()
                .map(|(namespace, key, value)| TagTriple {
                    namespace,
                    key,
                    value,
                })
                .collect(),
        );

        tracing::debug!(path, raw, kept = triples.len(), "Fetched tag triples");
        Ok(triples)
    }
}
