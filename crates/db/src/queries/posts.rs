//! Post database operations.
//!
//! Posts are the unit of scheduling: every lifecycle transition and every
//! scoped clear goes through here. Scoped statements derive their WHERE
//! clause from a `QueueScope` so the isolation guard has a single SQL
//! rendering.

use crate::models::{MediaKind, Post, PostMode, PostStatus};
use chrono::{DateTime, Utc};
use postq_core::scope::{ChannelFilter, QueueScope};
use sqlx::{PgPool, Postgres, QueryBuilder};

const POST_COLUMNS: &str = "id, user_id, channel_id, mode, media_ref, media_type, caption, \
     status, scheduled_time, recurrence_id, batch_id, failure_reason, retry_count, \
     created_at, posted_at, updated_at";

/// A deleted row reduced to what cleanup needs. Occurrence rows share
/// their media blob with the recurrence template, so cleanup must know
/// whether a ref is exclusively owned.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClearedPost {
    pub id: String,
    pub media_ref: String,
    pub recurrence_id: Option<String>,
}

fn push_scope<'a>(qb: &mut QueryBuilder<'a, Postgres>, scope: &'a QueueScope) {
    qb.push(" AND user_id = ").push_bind(&scope.user_id);
    if let ChannelFilter::Only(channel_id) = &scope.channel {
        qb.push(" AND channel_id = ").push_bind(channel_id);
    }
    if let Some(mode) = scope.mode {
        qb.push(" AND mode = ").push_bind(PostMode::from(mode));
    }
}

/// Insert a post in `queued` state. The channel id is fixed here, at
/// upload time, and no later statement ever updates it.
#[allow(clippy::too_many_arguments)]
pub async fn create(
    pool: &PgPool,
    id: &str,
    user_id: &str,
    channel_id: &str,
    mode: PostMode,
    media_ref: &str,
    media_type: MediaKind,
    caption: Option<&str>,
    batch_id: Option<&str>,
) -> Result<Post, sqlx::Error> {
    sqlx::query_as::<_, Post>(&format!(
        r#"
        INSERT INTO posts (id, user_id, channel_id, mode, media_ref, media_type, caption, batch_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {POST_COLUMNS}
        "#,
    ))
    .bind(id)
    .bind(user_id)
    .bind(channel_id)
    .bind(mode)
    .bind(media_ref)
    .bind(media_type)
    .bind(caption)
    .bind(batch_id)
    .fetch_one(pool)
    .await
}

/// Insert a recurrence occurrence directly in `scheduled` state.
#[allow(clippy::too_many_arguments)]
pub async fn create_occurrence(
    pool: &PgPool,
    id: &str,
    user_id: &str,
    channel_id: &str,
    media_ref: &str,
    media_type: MediaKind,
    caption: Option<&str>,
    recurrence_id: &str,
    scheduled_time: DateTime<Utc>,
) -> Result<Post, sqlx::Error> {
    sqlx::query_as::<_, Post>(&format!(
        r#"
        INSERT INTO posts
            (id, user_id, channel_id, mode, media_ref, media_type, caption,
             status, scheduled_time, recurrence_id)
        VALUES ($1, $2, $3, 'described', $4, $5, $6, 'scheduled', $7, $8)
        RETURNING {POST_COLUMNS}
        "#,
    ))
    .bind(id)
    .bind(user_id)
    .bind(channel_id)
    .bind(media_ref)
    .bind(media_type)
    .bind(caption)
    .bind(scheduled_time)
    .bind(recurrence_id)
    .fetch_one(pool)
    .await
}

pub async fn get_by_id(pool: &PgPool, id: &str) -> Result<Option<Post>, sqlx::Error> {
    sqlx::query_as::<_, Post>(&format!(
        r#"
        SELECT {POST_COLUMNS}
        FROM posts
        WHERE id = $1
        "#,
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Fetch a user's posts by id, in the order the ids were given.
pub async fn list_by_ids(
    pool: &PgPool,
    user_id: &str,
    ids: &[String],
) -> Result<Vec<Post>, sqlx::Error> {
    let rows = sqlx::query_as::<_, Post>(&format!(
        r#"
        SELECT {POST_COLUMNS}
        FROM posts
        WHERE user_id = $1 AND id = ANY($2)
        "#,
    ))
    .bind(user_id)
    .bind(ids)
    .fetch_all(pool)
    .await?;

    let mut by_id: std::collections::HashMap<String, Post> =
        rows.into_iter().map(|p| (p.id.clone(), p)).collect();
    Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
}

pub async fn list_by_batch(
    pool: &PgPool,
    user_id: &str,
    batch_id: &str,
    status: PostStatus,
) -> Result<Vec<Post>, sqlx::Error> {
    sqlx::query_as::<_, Post>(&format!(
        r#"
        SELECT {POST_COLUMNS}
        FROM posts
        WHERE user_id = $1 AND batch_id = $2 AND status = $3
        ORDER BY created_at ASC
        "#,
    ))
    .bind(user_id)
    .bind(batch_id)
    .bind(status)
    .fetch_all(pool)
    .await
}

pub async fn list_in_scope(
    pool: &PgPool,
    scope: &QueueScope,
    status: PostStatus,
) -> Result<Vec<Post>, sqlx::Error> {
    let mut qb = QueryBuilder::new(format!("SELECT {POST_COLUMNS} FROM posts WHERE status = "));
    qb.push_bind(status);
    push_scope(&mut qb, scope);
    qb.push(" ORDER BY created_at ASC");
    qb.build_query_as::<Post>().fetch_all(pool).await
}

/// Transition `queued` posts to `scheduled`, one call per batch of
/// assignments, all-or-nothing. A post that is no longer `queued` (raced
/// with a clear) aborts the whole transaction.
pub async fn schedule_many(
    pool: &PgPool,
    user_id: &str,
    assignments: &[(String, DateTime<Utc>)],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    for (post_id, scheduled_time) in assignments {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET status = 'scheduled', scheduled_time = $1, updated_at = now()
            WHERE id = $2 AND user_id = $3 AND status = 'queued'
            "#,
        )
        .bind(scheduled_time)
        .bind(post_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() != 1 {
            return Err(sqlx::Error::RowNotFound);
        }
    }

    tx.commit().await?;
    Ok(())
}

/// Delete posts with `status` inside the scope, returning the removed rows
/// so the caller can release their media blobs.
pub async fn delete_by_scope(
    pool: &PgPool,
    scope: &QueueScope,
    status: PostStatus,
) -> Result<Vec<ClearedPost>, sqlx::Error> {
    let mut qb = QueryBuilder::new("DELETE FROM posts WHERE status = ");
    qb.push_bind(status);
    push_scope(&mut qb, scope);
    qb.push(" RETURNING id, media_ref, recurrence_id");
    qb.build_query_as::<ClearedPost>().fetch_all(pool).await
}

/// Due-work scan for the firing engine, oldest first.
pub async fn list_due(
    pool: &PgPool,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<Post>, sqlx::Error> {
    sqlx::query_as::<_, Post>(&format!(
        r#"
        SELECT {POST_COLUMNS}
        FROM posts
        WHERE status = 'scheduled' AND scheduled_time <= $1
        ORDER BY scheduled_time ASC
        LIMIT $2
        "#,
    ))
    .bind(now)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Claim a due post for publishing. The conditional update is the
/// at-most-once gate: losing the race (another poller, or a concurrent
/// clear) returns `None` and the caller moves on.
pub async fn claim(pool: &PgPool, id: &str) -> Result<Option<Post>, sqlx::Error> {
    sqlx::query_as::<_, Post>(&format!(
        r#"
        UPDATE posts
        SET status = 'publishing', updated_at = now()
        WHERE id = $1 AND status = 'scheduled'
        RETURNING {POST_COLUMNS}
        "#,
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn mark_posted(pool: &PgPool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE posts
        SET status = 'posted', posted_at = now(), updated_at = now()
        WHERE id = $1 AND status = 'publishing'
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_failed(pool: &PgPool, id: &str, reason: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE posts
        SET status = 'failed', failure_reason = $1, updated_at = now()
        WHERE id = $2 AND status = 'publishing'
        "#,
    )
    .bind(reason)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Manual retry: reset a failed post back to `queued`. Returns false when
/// the post is missing, owned by someone else, or not failed.
pub async fn retry_failed(pool: &PgPool, user_id: &str, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE posts
        SET status = 'queued', scheduled_time = NULL, failure_reason = NULL,
            retry_count = retry_count + 1, updated_at = now()
        WHERE id = $1 AND user_id = $2 AND status = 'failed'
        "#,
    )
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Recovery sweep for claims orphaned by a worker crash. A `publishing`
/// row whose claim timestamp predates the cutoff has no live worker
/// behind it; mark it failed so the owner can retry. The age condition
/// leaves in-flight claims of the current cycle untouched.
pub async fn fail_stale_publishing(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        UPDATE posts
        SET status = 'failed', failure_reason = 'interrupted during publishing',
            updated_at = now()
        WHERE status = 'publishing' AND updated_at < $1
        RETURNING id
        "#,
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

pub async fn counts_by_status(
    pool: &PgPool,
    user_id: &str,
) -> Result<Vec<(String, i64)>, sqlx::Error> {
    sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT status::text, COUNT(*)
        FROM posts
        WHERE user_id = $1
        GROUP BY status
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn next_scheduled(
    pool: &PgPool,
    user_id: &str,
    limit: i64,
) -> Result<Vec<Post>, sqlx::Error> {
    sqlx::query_as::<_, Post>(&format!(
        r#"
        SELECT {POST_COLUMNS}
        FROM posts
        WHERE user_id = $1 AND status = 'scheduled'
        ORDER BY scheduled_time ASC
        LIMIT $2
        "#,
    ))
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use postq_core::types::PostMode as CorePostMode;

    // The rendered WHERE clause must agree with `QueueScope::matches`:
    // the scope is the one source of truth for isolation, and the SQL
    // is only its rendering.
    fn rendered(scope: &QueueScope) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("DELETE FROM posts WHERE status = ");
        qb.push_bind(PostStatus::Queued);
        push_scope(&mut qb, scope);
        qb.into_sql()
    }

    #[test]
    fn test_scope_sql_channel_and_mode() {
        let scope = QueueScope::channel("u1", "ch_a").with_mode(CorePostMode::Bulk);
        let sql = rendered(&scope);
        assert!(sql.contains(" AND user_id = $2"));
        assert!(sql.contains(" AND channel_id = $3"));
        assert!(sql.contains(" AND mode = $4"));
    }

    #[test]
    fn test_scope_sql_channel_without_mode() {
        let scope = QueueScope::channel("u1", "ch_a");
        let sql = rendered(&scope);
        assert!(sql.contains(" AND user_id = $2"));
        assert!(sql.contains(" AND channel_id = $3"));
        assert!(!sql.contains(" AND mode = "));
    }

    #[test]
    fn test_scope_sql_all_channels_stays_user_bound() {
        let scope = QueueScope::all_channels("u1");
        let sql = rendered(&scope);
        assert!(sql.contains(" AND user_id = $2"));
        assert!(!sql.contains(" AND channel_id = "));
        assert!(!sql.contains(" AND mode = "));

        // Widening to all channels never drops the user predicate, in
        // SQL or in the in-memory predicate.
        assert!(scope.matches("u1", "ch_anything", CorePostMode::Described));
        assert!(!scope.matches("u2", "ch_anything", CorePostMode::Described));
    }

    #[test]
    fn test_scope_sql_mode_only_filter() {
        let mut scope = QueueScope::all_channels("u1");
        scope.mode = Some(CorePostMode::Bulk);
        let sql = rendered(&scope);
        assert!(sql.contains(" AND user_id = $2"));
        assert!(!sql.contains(" AND channel_id = "));
        assert!(sql.contains(" AND mode = $3"));

        assert!(scope.matches("u1", "ch_a", CorePostMode::Bulk));
        assert!(!scope.matches("u1", "ch_a", CorePostMode::Described));
    }
}
