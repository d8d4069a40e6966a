//! Complaint persistence
//!
//! Mutations go through [`mutate`]: lock the row, apply an engine operation to
//! an in-memory copy, write every mutable column back, commit. Either the whole
//! transition lands or nothing does.

use crate::engine::EngineError;
use crate::models::{Complaint, ComplaintRow, ComplaintStatus, NewComplaint};
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MutationError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Upper bound on descriptions compared by the duplicate check
const DUPLICATE_SCAN_LIMIT: i64 = 500;

pub async fn insert(pool: &PgPool, new: &NewComplaint) -> Result<Complaint, sqlx::Error> {
    let row = sqlx::query_as::<_, ComplaintRow>(
        r#"
        INSERT INTO complaints (
            public_id, category, description, location, photo_id,
            status, urgency, has_photo, due_at, created_at, updated_at, reporter_id
        )
        VALUES ($1, $2, $3, $4, $5, 'open', $6, $7, $8, $9, $9, $10)
        RETURNING *
        "#,
    )
    .bind(&new.public_id)
    .bind(&new.category)
    .bind(&new.description)
    .bind(&new.location)
    .bind(&new.photo_id)
    .bind(i16::from(new.priority_score.urgency))
    .bind(new.priority_score.photo)
    .bind(new.due_at)
    .bind(new.created_at)
    .bind(new.reporter)
    .fetch_one(pool)
    .await?;

    Ok(row.into())
}

pub async fn get(pool: &PgPool, id: i64) -> Result<Option<Complaint>, sqlx::Error> {
    let row = sqlx::query_as::<_, ComplaintRow>("SELECT * FROM complaints WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(Complaint::from))
}

/// Id of the complaint that already uses `photo_id` as its after photo
pub async fn after_photo_owner(pool: &PgPool, photo_id: &str) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar("SELECT id FROM complaints WHERE after_photo_id = $1")
        .bind(photo_id)
        .fetch_optional(pool)
        .await
}

/// Complaints still waiting on an official, most urgent deadline first
pub async fn list_open(pool: &PgPool) -> Result<Vec<Complaint>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ComplaintRow>(
        r#"
        SELECT * FROM complaints
        WHERE status IN ('open', 'in_progress')
        ORDER BY due_at ASC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Complaint::from).collect())
}

/// List complaints by status. `Escalated` selects the escalation queue:
/// flagged complaints an official has not resolved yet.
pub async fn list_by_status(
    pool: &PgPool,
    status: ComplaintStatus,
) -> Result<Vec<Complaint>, sqlx::Error> {
    let rows = if status == ComplaintStatus::Escalated {
        sqlx::query_as::<_, ComplaintRow>(
            r#"
            SELECT * FROM complaints
            WHERE escalated AND status IN ('open', 'in_progress')
            ORDER BY escalated_at ASC
            "#,
        )
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query_as::<_, ComplaintRow>(
            "SELECT * FROM complaints WHERE status = $1 ORDER BY created_at DESC",
        )
        .bind(status)
        .fetch_all(pool)
        .await?
    };
    Ok(rows.into_iter().map(Complaint::from).collect())
}

/// Descriptions of complaints that are not closed, newest first
pub async fn active_descriptions(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT description FROM complaints WHERE NOT closed ORDER BY created_at DESC LIMIT $1",
    )
    .bind(DUPLICATE_SCAN_LIMIT)
    .fetch_all(pool)
    .await
}

pub async fn count_by_status(pool: &PgPool) -> Result<Vec<(ComplaintStatus, i64)>, sqlx::Error> {
    sqlx::query_as::<_, (ComplaintStatus, i64)>(
        "SELECT status, COUNT(*) FROM complaints GROUP BY status",
    )
    .fetch_all(pool)
    .await
}

pub async fn count_escalated_pending(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM complaints WHERE escalated AND status IN ('open', 'in_progress')",
    )
    .fetch_one(pool)
    .await
}

pub async fn count_overdue(pool: &PgPool, now: DateTime<Utc>) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM complaints WHERE status IN ('open', 'in_progress') AND due_at < $1",
    )
    .bind(now)
    .fetch_one(pool)
    .await
}

/// Apply `apply` to complaint `id` under a row lock and persist the result.
///
/// If `apply` leaves the complaint unchanged nothing is written.
pub async fn mutate<T, F>(pool: &PgPool, id: i64, apply: F) -> Result<(Complaint, T), MutationError>
where
    F: FnOnce(&mut Complaint) -> Result<T, EngineError>,
{
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, ComplaintRow>("SELECT * FROM complaints WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
    let before = Complaint::from(row.ok_or(EngineError::NotFound)?);

    let mut complaint = before.clone();
    // An engine error drops `tx`, which rolls back and releases the lock
    let outcome = apply(&mut complaint)?;

    if needs_save(&before, &complaint) {
        save(&mut *tx, &complaint).await?;
    }
    tx.commit().await?;

    Ok((complaint, outcome))
}

/// No-op operations (a repeated escalation) leave the row untouched.
fn needs_save(before: &Complaint, after: &Complaint) -> bool {
    before != after
}

async fn save(conn: &mut PgConnection, complaint: &Complaint) -> Result<(), sqlx::Error> {
    let feedback = complaint.feedback.as_ref();

    sqlx::query(
        r#"
        UPDATE complaints SET
            after_photo_id = $1,
            status = $2,
            escalated = $3,
            escalated_at = $4,
            closed = $5,
            closed_at = $6,
            updated_at = $7,
            responses = $8,
            feedback_comment = $9,
            feedback_rating = $10,
            feedback_confirmed = $11
        WHERE id = $12
        "#,
    )
    .bind(&complaint.after_photo_id)
    .bind(complaint.status)
    .bind(complaint.escalated)
    .bind(complaint.escalated_at)
    .bind(complaint.closed)
    .bind(complaint.closed_at)
    .bind(complaint.updated_at)
    .bind(&complaint.responses)
    .bind(feedback.map(|f| f.comment.clone()))
    .bind(feedback.and_then(|f| f.rating).map(i16::from))
    .bind(feedback.map(|f| f.confirmed))
    .bind(complaint.id)
    .execute(conn)
    .await?;

    Ok(())
}
