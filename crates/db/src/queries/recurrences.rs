//! Recurrence operations.
//!
//! A recurrence row carries the post template plus progress counters. The
//! store holds at most one pending occurrence per active recurrence; the
//! worker consumes it and asks for the next one here.

use crate::models::{MediaKind, Recurrence};
use crate::queries::posts::ClearedPost;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

const RECURRENCE_COLUMNS: &str = "id, user_id, channel_id, interval_secs, end_count, end_date, \
     occurrences_fired, active, media_ref, media_type, caption, created_at";

#[allow(clippy::too_many_arguments)]
pub async fn create(
    pool: &PgPool,
    id: &str,
    user_id: &str,
    channel_id: &str,
    interval_secs: i64,
    end_count: Option<i32>,
    end_date: Option<DateTime<Utc>>,
    media_ref: &str,
    media_type: MediaKind,
    caption: Option<&str>,
) -> Result<Recurrence, sqlx::Error> {
    sqlx::query_as::<_, Recurrence>(&format!(
        r#"
        INSERT INTO recurrences
            (id, user_id, channel_id, interval_secs, end_count, end_date,
             media_ref, media_type, caption)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {RECURRENCE_COLUMNS}
        "#,
    ))
    .bind(id)
    .bind(user_id)
    .bind(channel_id)
    .bind(interval_secs)
    .bind(end_count)
    .bind(end_date)
    .bind(media_ref)
    .bind(media_type)
    .bind(caption)
    .fetch_one(pool)
    .await
}

pub async fn get_by_id(pool: &PgPool, id: &str) -> Result<Option<Recurrence>, sqlx::Error> {
    sqlx::query_as::<_, Recurrence>(&format!(
        r#"
        SELECT {RECURRENCE_COLUMNS}
        FROM recurrences
        WHERE id = $1
        "#,
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Bump the fired counter for an occurrence that just published; returns
/// the new total, or `None` if the recurrence was stopped meanwhile.
pub async fn record_fired(pool: &PgPool, id: &str) -> Result<Option<i32>, sqlx::Error> {
    let row: Option<(i32,)> = sqlx::query_as(
        r#"
        UPDATE recurrences
        SET occurrences_fired = occurrences_fired + 1
        WHERE id = $1 AND active = true
        RETURNING occurrences_fired
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(fired,)| fired))
}

pub async fn deactivate(pool: &PgPool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE recurrences SET active = false WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// User-initiated stop: deactivate and delete the not-yet-fired pending
/// occurrence. The delete's status condition uses the same conditional-
/// update discipline as claiming, so a stop and a concurrent fire resolve
/// to a single winner.
pub async fn stop(
    pool: &PgPool,
    user_id: &str,
    id: &str,
) -> Result<Option<Vec<ClearedPost>>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        UPDATE recurrences
        SET active = false
        WHERE id = $1 AND user_id = $2 AND active = true
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
        WHERE recurrence_id = $1 AND user_id = $2 AND status IN ('queued', 'scheduled')
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

pub async fn count_active(pool: &PgPool, user_id: &str) -> Result<i64, sqlx::Error> {
    let count: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM recurrences
        WHERE user_id = $1 AND active = true
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(count.0)
}
