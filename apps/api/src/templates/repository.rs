use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::template::TemplateRow;

pub struct NewTemplate<'a> {
    pub user_id: Uuid,
    pub name: &'a str,
    pub original_filename: &'a str,
    pub storage_key: &'a str,
    pub size_bytes: i64,
    pub placeholders: &'a [String],
}

pub async fn insert_template(conn: &mut PgConnection, new: &NewTemplate<'_>) -> Result<TemplateRow, sqlx::Error> {
    sqlx::query_as::<_, TemplateRow>(
        r#"
        INSERT INTO report_templates
            (id, user_id, name, original_filename, storage_key, size_bytes, placeholders)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new.user_id)
    .bind(new.name)
    .bind(new.original_filename)
    .bind(new.storage_key)
    .bind(new.size_bytes)
    .bind(new.placeholders)
    .fetch_one(conn)
    .await
}

/// Newest first.
pub async fn list_templates(
    db: &PgPool,
    user_id: Uuid,
    skip: i64,
    limit: i64,
) -> Result<Vec<TemplateRow>, sqlx::Error> {
    sqlx::query_as::<_, TemplateRow>(
        "SELECT * FROM report_templates WHERE user_id = $1 ORDER BY created_at DESC, id OFFSET $2 LIMIT $3",
    )
    .bind(user_id)
    .bind(skip)
    .bind(limit)
    .fetch_all(db)
    .await
}

pub async fn get_template(db: &PgPool, id: Uuid, user_id: Uuid) -> Result<Option<TemplateRow>, sqlx::Error> {
    sqlx::query_as::<_, TemplateRow>("SELECT * FROM report_templates WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await
}

/// Returns the deleted row, if there was one.
pub async fn delete_template(
    conn: &mut PgConnection,
    id: Uuid,
    user_id: Uuid,
) -> Result<Option<TemplateRow>, sqlx::Error> {
    sqlx::query_as::<_, TemplateRow>(
        "DELETE FROM report_templates WHERE id = $1 AND user_id = $2 RETURNING *",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(conn)
    .await
}

/// Serializes every writer of `storage_key` until the surrounding
/// transaction ends. Blob writes and deletes happen while it is held.
pub async fn lock_storage_key(conn: &mut PgConnection, storage_key: &str) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(storage_key)
        .execute(conn)
        .await?;
    Ok(())
}

/// Rows, across all users, still pointing at a blob.
pub async fn count_by_storage_key(conn: &mut PgConnection, storage_key: &str) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM report_templates WHERE storage_key = $1")
        .bind(storage_key)
        .fetch_one(conn)
        .await?;
    Ok(count)
}
