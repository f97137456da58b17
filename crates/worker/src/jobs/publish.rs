//! The firing cycle.
//!
//! Each cycle re-derives due work from `scheduled` rows, claims one post at
//! a time with a conditional update, publishes it, and records the outcome.
//! A claim that loses its race is skipped silently; a failed publish marks
//! the post `failed` and stops there, since retries are a manual operation.

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use postq_core::recurrence::Advance;
use postq_core::types::PostTemplate;
use postq_db::models::Post;
use tracing::{error, info, warn};

use crate::WorkerState;

const CYCLE_LIMIT: i64 = 50;

// A claim this many poll intervals old has no live worker behind it.
const STALE_CLAIM_INTERVALS: i64 = 5;

/// Cutoff below which a `publishing` claim counts as orphaned. Claims of
/// the current cycle are always newer than one interval, so a live claim
/// can never fall past this line.
fn stale_cutoff(now: DateTime<Utc>, poll_interval_secs: u64) -> DateTime<Utc> {
    now - Duration::seconds(poll_interval_secs as i64 * STALE_CLAIM_INTERVALS)
}

pub async fn run_cycle(state: &WorkerState) -> anyhow::Result<()> {
    // Recover claims stranded by a crash between claiming and marking.
    // Without this sweep such rows are invisible to both the due-work
    // scan and the manual retry path.
    let cutoff = stale_cutoff(Utc::now(), state.poll_interval_secs);
    let stranded = postq_db::queries::posts::fail_stale_publishing(&state.db, cutoff).await?;
    for post_id in &stranded {
        warn!(%post_id, "reset interrupted publish to failed");
    }

    let due = postq_db::queries::posts::list_due(&state.db, Utc::now(), CYCLE_LIMIT).await?;

    for post in due {
        let post_id = post.id.clone();
        if let Err(err) = fire_post(state, post).await {
            // One bad post must not stall the rest of the cycle.
            error!(post_id, %err, "failed to process due post");
        }
    }

    Ok(())
}

async fn fire_post(state: &WorkerState, post: Post) -> anyhow::Result<()> {
    // The conditional claim is what makes firing at-most-once: a concurrent
    // clear or a second worker leaves nothing to claim.
    let Some(post) = postq_db::queries::posts::claim(&state.db, &post.id).await? else {
        return Ok(());
    };

    if !state.media.exists(&post.media_ref).await {
        warn!(post_id = post.id, media_ref = post.media_ref, "media blob missing");
        postq_db::queries::posts::mark_failed(&state.db, &post.id, "media blob missing").await?;
        return Ok(());
    }

    let template = PostTemplate {
        user_id: post.user_id.clone(),
        channel_id: post.channel_id.clone(),
        media_ref: post.media_ref.clone(),
        media_type: post.media_type.into(),
        caption: post.caption.clone(),
    };
    let outcome = state.transport.publish(&template).await;

    match outcome {
        Ok(()) => {
            postq_db::queries::posts::mark_posted(&state.db, &post.id).await?;
            info!(post_id = post.id, channel_id = post.channel_id, "post published");

            if post.recurrence_id.is_some() {
                advance_recurrence(state, &post).await?;
            }
        }
        Err(err) => {
            warn!(post_id = post.id, %err, "publish failed");
            postq_db::queries::posts::mark_failed(&state.db, &post.id, &err.to_string()).await?;
        }
    }

    Ok(())
}

/// After an occurrence publishes, either insert the next one or retire the
/// recurrence. Advancing only on success means a failed occurrence pauses
/// the series until someone retries it.
async fn advance_recurrence(state: &WorkerState, post: &Post) -> anyhow::Result<()> {
    let recurrence_id = post
        .recurrence_id
        .as_deref()
        .context("occurrence without recurrence id")?;
    let previous = post
        .scheduled_time
        .context("occurrence without scheduled time")?;

    let Some(recurrence) = postq_db::queries::recurrences::get_by_id(&state.db, recurrence_id)
        .await?
    else {
        warn!(recurrence_id, "recurrence row missing, not advancing");
        return Ok(());
    };

    // None here means the recurrence was stopped while we published.
    let Some(fired) = postq_db::queries::recurrences::record_fired(&state.db, recurrence_id)
        .await?
    else {
        return Ok(());
    };

    match recurrence.rule().next_after(previous, fired) {
        Advance::Next(next_time) => {
            let occurrence_id = format!("post_{}", nanoid::nanoid!(12));
            postq_db::queries::posts::create_occurrence(
                &state.db,
                &occurrence_id,
                &recurrence.user_id,
                &recurrence.channel_id,
                &recurrence.media_ref,
                recurrence.media_type,
                recurrence.caption.as_deref(),
                recurrence_id,
                next_time,
            )
            .await?;
            info!(recurrence_id, %next_time, "next occurrence scheduled");
        }
        Advance::Finished => {
            postq_db::queries::recurrences::deactivate(&state.db, recurrence_id).await?;
            // The series is over; nothing references the template blob now.
            state.media.delete(&recurrence.media_ref).await;
            info!(recurrence_id, fired, "recurrence completed");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn test_stale_cutoff_trails_now_by_five_intervals() {
        let now = utc("2025-06-01T12:00:00Z");
        assert_eq!(stale_cutoff(now, 5), utc("2025-06-01T11:59:35Z"));
        assert_eq!(stale_cutoff(now, 60), utc("2025-06-01T11:55:00Z"));
    }

    #[test]
    fn test_stale_cutoff_spares_live_claims() {
        let now = utc("2025-06-01T12:00:00Z");
        let cutoff = stale_cutoff(now, 5);

        // A claim from the current or previous cycle stays untouched.
        let just_claimed = now - Duration::seconds(5);
        assert!(just_claimed >= cutoff);

        // A claim orphaned by a dead worker falls past the line and gets
        // reset, which is the only path out of the in-flight state.
        let orphaned = now - Duration::seconds(300);
        assert!(orphaned < cutoff);
    }
}
