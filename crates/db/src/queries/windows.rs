//! Per-user posting window configuration.
//!
//! Users without a stored row fall back to the engine default; callers
//! handle that with `unwrap_or_default()` on the returned option.

use postq_core::types::PostingWindow;
use sqlx::PgPool;

pub async fn get(pool: &PgPool, user_id: &str) -> Result<Option<PostingWindow>, sqlx::Error> {
    let row: Option<(i32, i32, i32)> = sqlx::query_as(
        r#"
        SELECT start_hour, end_hour, interval_hours
        FROM posting_windows
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(start, end, interval)| PostingWindow {
        start_hour: start as u32,
        end_hour: end as u32,
        interval_hours: interval as u32,
    }))
}

pub async fn upsert(
    pool: &PgPool,
    user_id: &str,
    window: &PostingWindow,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO posting_windows (user_id, start_hour, end_hour, interval_hours)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id)
        DO UPDATE SET start_hour = EXCLUDED.start_hour,
                      end_hour = EXCLUDED.end_hour,
                      interval_hours = EXCLUDED.interval_hours,
                      updated_at = now()
        "#,
    )
    .bind(user_id)
    .bind(window.start_hour as i32)
    .bind(window.end_hour as i32)
    .bind(window.interval_hours as i32)
    .execute(pool)
    .await?;
    Ok(())
}
