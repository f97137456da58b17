//! Channel registry operations.
//!
//! Channels are per-user named destinations. Removal is a soft flip of
//! `is_active`; posts keep their channel id regardless (soft reference).

use crate::models::Channel;
use sqlx::PgPool;

const CHANNEL_COLUMNS: &str =
    "id, user_id, channel_id, display_name, is_default, is_active, created_at";

pub async fn upsert(
    pool: &PgPool,
    id: &str,
    user_id: &str,
    channel_id: &str,
    display_name: &str,
) -> Result<Channel, sqlx::Error> {
    sqlx::query_as::<_, Channel>(&format!(
        r#"
        INSERT INTO channels (id, user_id, channel_id, display_name)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, channel_id)
        DO UPDATE SET display_name = EXCLUDED.display_name, is_active = true
        RETURNING {CHANNEL_COLUMNS}
        "#,
    ))
    .bind(id)
    .bind(user_id)
    .bind(channel_id)
    .bind(display_name)
    .fetch_one(pool)
    .await
}

pub async fn list_for_user(pool: &PgPool, user_id: &str) -> Result<Vec<Channel>, sqlx::Error> {
    sqlx::query_as::<_, Channel>(&format!(
        r#"
        SELECT {CHANNEL_COLUMNS}
        FROM channels
        WHERE user_id = $1 AND is_active = true
        ORDER BY is_default DESC, display_name ASC
        "#,
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn get_default(pool: &PgPool, user_id: &str) -> Result<Option<Channel>, sqlx::Error> {
    sqlx::query_as::<_, Channel>(&format!(
        r#"
        SELECT {CHANNEL_COLUMNS}
        FROM channels
        WHERE user_id = $1 AND is_default = true AND is_active = true
        "#,
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Ownership check consulted before any mutation that names a channel.
pub async fn is_registered(
    pool: &PgPool,
    user_id: &str,
    channel_id: &str,
) -> Result<bool, sqlx::Error> {
    let count: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM channels
        WHERE user_id = $1 AND channel_id = $2 AND is_active = true
        "#,
    )
    .bind(user_id)
    .bind(channel_id)
    .fetch_one(pool)
    .await?;
    Ok(count.0 > 0)
}

pub async fn remove(pool: &PgPool, user_id: &str, channel_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE channels
        SET is_active = false, is_default = false
        WHERE user_id = $1 AND channel_id = $2 AND is_active = true
        "#,
    )
    .bind(user_id)
    .bind(channel_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn set_default(
    pool: &PgPool,
    user_id: &str,
    channel_id: &str,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE channels SET is_default = false WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query(
        r#"
        UPDATE channels
        SET is_default = true
        WHERE user_id = $1 AND channel_id = $2 AND is_active = true
        "#,
    )
    .bind(user_id)
    .bind(channel_id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(false);
    }

    tx.commit().await?;
    Ok(true)
}
