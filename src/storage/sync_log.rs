use anyhow::{anyhow, Result};

use super::schema::Database;
use super::types::{SyncRun, SyncStatus};

impl Database {
    // ========================================================================
    // Sync-run log
    // ========================================================================

    /// Open a log row for a sync run in the `running` state, returning its id.
    pub async fn start_sync_run(&self, started_at: i64) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO rss_sync_log (started_at, status) VALUES (?, ?)",
        )
        .bind(started_at)
        .bind(SyncStatus::Running.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Move a run's log row to its terminal state with the final tallies.
    ///
    /// Guarded on `status = 'running'` so a row can only be completed once;
    /// returns whether the transition happened.
    pub async fn complete_sync_run(
        &self,
        id: i64,
        completed_at: i64,
        status: SyncStatus,
        added: i64,
        updated: i64,
        total: i64,
        error_message: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE rss_sync_log
            SET completed_at = ?, status = ?, episodes_added = ?,
                episodes_updated = ?, episodes_total = ?, error_message = ?
            WHERE id = ? AND status = 'running'
        "#,
        )
        .bind(completed_at)
        .bind(status.as_str())
        .bind(added)
        .bind(updated)
        .bind(total)
        .bind(error_message)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Most recent sync runs, newest first. Feeds the admin sync page.
    pub async fn latest_sync_runs(&self, limit: i64) -> Result<Vec<SyncRun>> {
        type Row = (i64, i64, Option<i64>, String, i64, i64, i64, Option<String>);

        let rows = sqlx::query_as::<_, Row>(
            r#"
            SELECT id, started_at, completed_at, status, episodes_added,
                   episodes_updated, episodes_total, error_message
            FROM rss_sync_log
            ORDER BY started_at DESC, id DESC
            LIMIT ?
        "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, started_at, completed_at, status, added, updated, total, error_message)| {
                let status = SyncStatus::parse(&status)
                    .ok_or_else(|| anyhow!("unknown sync status '{}' in log row {}", status, id))?;
                Ok(SyncRun {
                    id,
                    started_at,
                    completed_at,
                    status,
                    episodes_added: added,
                    episodes_updated: updated,
                    episodes_total: total,
                    error_message,
                })
            })
            .collect()
    }
}
