//! Tables of the tag database read by `TabblesSource`
//!
//! Used to build local mirrors and test fixtures.

use minkv_common::Result;
use sqlx::SqlitePool;

pub async fn create_tabbles_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tag (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            id_tabble INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS taggable_has_tag (
            id_taggable INTEGER NOT NULL,
            id_tag INTEGER NOT NULL,
            PRIMARY KEY (id_taggable, id_tag)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tabble_is_child_of_tag_for_user (
            id_tabble_child INTEGER NOT NULL,
            id_tag_parent INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS file2 (
            idTaggable INTEGER PRIMARY KEY,
            path TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
