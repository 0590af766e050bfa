use anyhow::Result;

use super::schema::Database;
use super::types::Episode;
use crate::feed::NormalizedEpisode;

/// Maximum number of episodes any listing query returns. The show publishes
/// weekly; this is years of headroom while bounding response size.
const MAX_EPISODES: i64 = 500;

impl Database {
    // ========================================================================
    // Reconciliation operations
    // ========================================================================

    /// Look up a persisted episode by its feed-assigned guid.
    pub async fn find_episode_by_guid(&self, guid: &str) -> Result<Option<Episode>> {
        let row = sqlx::query_as::<_, Episode>(
            r#"
            SELECT id, guid, title, description, audio_url, published_date,
                   duration, duration_minutes, cover_image, season, episode,
                   is_preview, created_at, rss_imported_at
            FROM episodes
            WHERE guid = ?
        "#,
        )
        .bind(guid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Insert a newly synced episode, returning its internal id.
    pub async fn insert_episode(&self, ep: &NormalizedEpisode) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO episodes (guid, title, description, audio_url, published_date,
                                  duration, duration_minutes, cover_image, season, episode,
                                  is_preview, created_at, rss_imported_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(&ep.guid)
        .bind(&ep.title)
        .bind(&ep.description)
        .bind(&ep.audio_url)
        .bind(ep.published_date.timestamp())
        .bind(&ep.duration)
        .bind(ep.duration_minutes)
        .bind(&ep.cover_image)
        .bind(ep.season)
        .bind(ep.episode)
        .bind(ep.is_preview)
        .bind(ep.imported_at.timestamp())
        .bind(ep.imported_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Update the mutable fields of an existing episode from a fresh sync.
    ///
    /// Identity (`id`, `guid`) and creation metadata (`created_at`) are
    /// never touched; the feed remains the source of truth for everything
    /// else.
    pub async fn update_episode(&self, id: i64, ep: &NormalizedEpisode) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE episodes
            SET title = ?, description = ?, audio_url = ?, published_date = ?,
                duration = ?, duration_minutes = ?, cover_image = ?, season = ?,
                episode = ?, is_preview = ?, rss_imported_at = ?
            WHERE id = ?
        "#,
        )
        .bind(&ep.title)
        .bind(&ep.description)
        .bind(&ep.audio_url)
        .bind(ep.published_date.timestamp())
        .bind(&ep.duration)
        .bind(ep.duration_minutes)
        .bind(&ep.cover_image)
        .bind(ep.season)
        .bind(ep.episode)
        .bind(ep.is_preview)
        .bind(ep.imported_at.timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ========================================================================
    // Website queries
    // ========================================================================

    /// All published episodes, newest first. Previews (manually staged,
    /// unpublished records) are excluded.
    pub async fn list_episodes(&self) -> Result<Vec<Episode>> {
        let rows = sqlx::query_as::<_, Episode>(
            r#"
            SELECT id, guid, title, description, audio_url, published_date,
                   duration, duration_minutes, cover_image, season, episode,
                   is_preview, created_at, rss_imported_at
            FROM episodes
            WHERE is_preview = 0
            ORDER BY published_date DESC
            LIMIT ?
        "#,
        )
        .bind(MAX_EPISODES)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Published episodes whose title or description contains the search
    /// term, newest first. The term is matched literally (LIKE wildcards in
    /// user input are escaped).
    pub async fn search_episodes(&self, term: &str) -> Result<Vec<Episode>> {
        let pattern = format!("%{}%", escape_like(term));

        let rows = sqlx::query_as::<_, Episode>(
            r#"
            SELECT id, guid, title, description, audio_url, published_date,
                   duration, duration_minutes, cover_image, season, episode,
                   is_preview, created_at, rss_imported_at
            FROM episodes
            WHERE is_preview = 0
              AND (title LIKE ? ESCAPE '\' OR description LIKE ? ESCAPE '\')
            ORDER BY published_date DESC
            LIMIT ?
        "#,
        )
        .bind(&pattern)
        .bind(&pattern)
        .bind(MAX_EPISODES)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// The most recently published episode, if any.
    pub async fn latest_episode(&self) -> Result<Option<Episode>> {
        let row = sqlx::query_as::<_, Episode>(
            r#"
            SELECT id, guid, title, description, audio_url, published_date,
                   duration, duration_minutes, cover_image, season, episode,
                   is_preview, created_at, rss_imported_at
            FROM episodes
            WHERE is_preview = 0
            ORDER BY published_date DESC
            LIMIT 1
        "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
