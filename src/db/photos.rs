//! Photo metadata

use crate::models::{Photo, PhotoSlot};
use sqlx::PgPool;
use uuid::Uuid;

pub struct NewPhoto<'a> {
    pub id: &'a str,
    pub slot: PhotoSlot,
    pub mime_type: &'a str,
    pub byte_size: i64,
    pub sha256: &'a str,
    pub uploaded_by: Option<Uuid>,
}

/// Insert photo metadata. A duplicate id surfaces as a unique violation.
pub async fn insert(pool: &PgPool, photo: &NewPhoto<'_>) -> Result<Photo, sqlx::Error> {
    sqlx::query_as::<_, Photo>(
        r#"
        INSERT INTO photos (id, slot, mime_type, byte_size, sha256, uploaded_by)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(photo.id)
    .bind(photo.slot)
    .bind(photo.mime_type)
    .bind(photo.byte_size)
    .bind(photo.sha256)
    .bind(photo.uploaded_by)
    .fetch_one(pool)
    .await
}

pub async fn get(pool: &PgPool, id: &str) -> Result<Option<Photo>, sqlx::Error> {
    sqlx::query_as::<_, Photo>("SELECT * FROM photos WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Roll back metadata whose bytes could not be written
pub async fn delete(pool: &PgPool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM photos WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
