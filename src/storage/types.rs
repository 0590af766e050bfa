use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

// ============================================================================
// Rows
// ============================================================================

/// A persisted episode.
///
/// `guid` is the reconciliation key (unique across the table); `id` is the
/// internal identity the website links against. Timestamps are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Episode {
    pub id: i64,
    pub guid: String,
    pub title: String,
    pub description: String,
    pub audio_url: String,
    pub published_date: i64,
    pub duration: String,
    pub duration_minutes: i64,
    pub cover_image: String,
    pub season: i64,
    pub episode: i64,
    pub is_preview: bool,
    pub created_at: i64,
    pub rss_imported_at: i64,
}

/// One sync-run log row.
#[derive(Debug, Clone)]
pub struct SyncRun {
    pub id: i64,
    pub started_at: i64,
    pub completed_at: Option<i64>,
    pub status: SyncStatus,
    pub episodes_added: i64,
    pub episodes_updated: i64,
    pub episodes_total: i64,
    pub error_message: Option<String>,
}

// ============================================================================
// Sync status state machine
// ============================================================================

/// Lifecycle of one sync run: `Running` at creation, then exactly one
/// transition to a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Running,
    /// No per-item errors.
    Success,
    /// Some items failed but at least one was added.
    Partial,
    /// Items failed and nothing was added: the run made no forward progress.
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Running => "running",
            SyncStatus::Success => "success",
            SyncStatus::Partial => "partial",
            SyncStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(SyncStatus::Running),
            "success" => Some(SyncStatus::Success),
            "partial" => Some(SyncStatus::Partial),
            "failed" => Some(SyncStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SyncStatus::Running)
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
