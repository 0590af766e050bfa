//! One end-to-end sync run: fetch, parse, normalize, reconcile.
//!
//! Each invocation runs to completion with no persistent state of its own;
//! the only cross-run state is the episodes table itself. Every run owns
//! exactly one `rss_sync_log` row for its lifetime, written best-effort so
//! a logging failure can never mask the sync's real outcome.

mod reconcile;

pub use reconcile::{outcome, reconcile, EpisodeStore, SyncSummary};

use chrono::Utc;
use thiserror::Error;

use crate::config::Config;
use crate::feed::{fetch_feed, normalize, parse_feed, FetchError, NormalizedEpisode};
use crate::storage::{Database, SyncStatus};

/// Fatal sync failures. Per-item persistence errors are not here; they are
/// recovered locally and reported in [`SyncSummary::errors`].
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Failed to fetch RSS feed: {0}")]
    Fetch(#[from] FetchError),
}

/// Run one sync against the configured feed.
///
/// Transport failures abort the run before any item is processed and mark
/// the run's log row `failed`. Everything after a successful fetch is
/// best-effort per item; the returned summary carries the tallies and any
/// per-item errors.
pub async fn run_sync(
    db: &Database,
    client: &reqwest::Client,
    config: &Config,
) -> Result<SyncSummary, SyncError> {
    let started_at = Utc::now();

    let run_id = match db.start_sync_run(started_at.timestamp()).await {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::warn!(error = %e, "Could not open a sync log row, continuing without one");
            None
        }
    };

    tracing::info!(url = %config.feed_url, "Fetching RSS feed");
    let text = match fetch_feed(client, &config.feed_url).await {
        Ok(text) => text,
        Err(e) => {
            record_run(db, run_id, SyncStatus::Failed, &SyncSummary::default(), Some(&e.to_string()))
                .await;
            return Err(e.into());
        }
    };

    let parsed = parse_feed(&text);
    if parsed.skipped > 0 {
        tracing::debug!(
            skipped = parsed.skipped,
            "Items without guid, title or enclosure skipped"
        );
    }
    tracing::info!(count = parsed.items.len(), "Parsed episodes from RSS feed");

    let now = Utc::now();
    let episodes: Vec<NormalizedEpisode> = parsed
        .items
        .into_iter()
        .map(|item| normalize(item, now, &config.default_cover_image))
        .collect();

    let summary = reconcile(db, &episodes).await;
    let status = outcome(&summary);

    let error_message = if summary.errors.is_empty() {
        None
    } else {
        Some(summary.errors.join("; "))
    };
    record_run(db, run_id, status, &summary, error_message.as_deref()).await;

    tracing::info!(
        added = summary.added,
        updated = summary.updated,
        total = summary.total,
        errors = summary.errors.len(),
        status = %status,
        "Sync completed"
    );

    Ok(summary)
}

/// Close the run's log row. Best-effort: failures are logged, never raised.
async fn record_run(
    db: &Database,
    run_id: Option<i64>,
    status: SyncStatus,
    summary: &SyncSummary,
    error_message: Option<&str>,
) {
    let Some(id) = run_id else {
        return;
    };

    match db
        .complete_sync_run(
            id,
            Utc::now().timestamp(),
            status,
            summary.added as i64,
            summary.updated as i64,
            summary.total as i64,
            error_message,
        )
        .await
    {
        Ok(true) => {}
        Ok(false) => tracing::warn!(run_id = id, "Sync log row was already completed"),
        Err(e) => tracing::warn!(run_id = id, error = %e, "Could not record sync outcome"),
    }
}
