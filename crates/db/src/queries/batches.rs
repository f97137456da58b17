//! Batch operations.
//!
//! A batch is a named, single-channel, single-mode group of posts that
//! schedules as one unit. Deleting a batch only cascades to posts still
//! `queued`; anything already in the firing pipeline stays untouched.

use crate::models::{Batch, BatchState, PostMode};
use crate::queries::posts::ClearedPost;
use sqlx::PgPool;

const BATCH_COLUMNS: &str = "id, user_id, name, channel_id, mode, state, created_at";

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct BatchSummary {
    pub id: String,
    pub name: String,
    pub channel_id: String,
    pub mode: PostMode,
    pub state: BatchState,
    pub post_count: i64,
}

pub async fn create(
    pool: &PgPool,
    id: &str,
    user_id: &str,
    name: &str,
    channel_id: &str,
    mode: PostMode,
) -> Result<Batch, sqlx::Error> {
    sqlx::query_as::<_, Batch>(&format!(
        r#"
        INSERT INTO batches (id, user_id, name, channel_id, mode)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {BATCH_COLUMNS}
        "#,
    ))
    .bind(id)
    .bind(user_id)
    .bind(name)
    .bind(channel_id)
    .bind(mode)
    .fetch_one(pool)
    .await
}

pub async fn get_by_id(
    pool: &PgPool,
    user_id: &str,
    id: &str,
) -> Result<Option<Batch>, sqlx::Error> {
    sqlx::query_as::<_, Batch>(&format!(
        r#"
        SELECT {BATCH_COLUMNS}
        FROM batches
        WHERE id = $1 AND user_id = $2
        "#,
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn list_for_user(pool: &PgPool, user_id: &str) -> Result<Vec<BatchSummary>, sqlx::Error> {
    sqlx::query_as::<_, BatchSummary>(
        r#"
        SELECT b.id, b.name, b.channel_id, b.mode, b.state, COUNT(p.id) AS post_count
        FROM batches b
        LEFT JOIN posts p ON p.batch_id = b.id AND p.status IN ('queued', 'scheduled')
        WHERE b.user_id = $1 AND b.state <> 'deleted'
        GROUP BY b.id
        ORDER BY b.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// First attached post flips `created` to `populated`; later attaches are
/// no-ops because of the state condition.
pub async fn mark_populated(pool: &PgPool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE batches SET state = 'populated' WHERE id = $1 AND state = 'created'")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_scheduled(pool: &PgPool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE batches SET state = 'scheduled' WHERE id = $1 AND state = 'populated'")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Mark the batch deleted and remove its still-queued posts, returning the
/// removed rows for blob cleanup.
pub async fn delete(
    pool: &PgPool,
    user_id: &str,
    id: &str,
) -> Result<Option<Vec<ClearedPost>>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        UPDATE batches
        SET state = 'deleted'
        WHERE id = $1 AND user_id = $2 AND state <> 'deleted'
        "#,
    )
    .bind(id)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    let cleared = sqlx::query_as::<_, ClearedPost>(
        r#"
        DELETE FROM posts
        WHERE batch_id = $1 AND user_id = $2 AND status = 'queued'
        RETURNING id, media_ref, recurrence_id
        "#,
    )
    .bind(id)
    .bind(user_id)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(cleared))
}
