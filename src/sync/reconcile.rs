//! Reconciliation of normalized episodes against the persisted table.
//!
//! Items are processed strictly in order, one at a time, so every failure
//! can be attributed to exactly one episode title. A failing write is
//! recorded and the batch continues; one bad item never aborts the run.

use anyhow::Result;

use crate::feed::NormalizedEpisode;
use crate::storage::{Database, Episode, SyncStatus};

/// Persistence seam for reconciliation. `Database` is the production
/// implementation; tests substitute doubles to exercise failure paths.
#[allow(async_fn_in_trait)]
pub trait EpisodeStore {
    async fn find_by_guid(&self, guid: &str) -> Result<Option<Episode>>;
    async fn insert(&self, episode: &NormalizedEpisode) -> Result<()>;
    async fn update(&self, id: i64, episode: &NormalizedEpisode) -> Result<()>;
}

impl EpisodeStore for Database {
    async fn find_by_guid(&self, guid: &str) -> Result<Option<Episode>> {
        self.find_episode_by_guid(guid).await
    }

    async fn insert(&self, episode: &NormalizedEpisode) -> Result<()> {
        self.insert_episode(episode).await.map(|_| ())
    }

    async fn update(&self, id: i64, episode: &NormalizedEpisode) -> Result<()> {
        self.update_episode(id, episode).await
    }
}

/// Per-run tally returned to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub added: usize,
    pub updated: usize,
    pub total: usize,
    pub errors: Vec<String>,
}

/// Classify a finished run.
///
/// `Failed` means errors occurred and nothing was added (no forward
/// progress). `Partial` means errors occurred but the run still added
/// something. `Success` means a clean run.
pub fn outcome(summary: &SyncSummary) -> SyncStatus {
    if summary.errors.is_empty() {
        SyncStatus::Success
    } else if summary.added == 0 {
        SyncStatus::Failed
    } else {
        SyncStatus::Partial
    }
}

enum Applied {
    Added,
    Updated,
}

/// Upsert each episode by guid, in input order.
///
/// Duplicate guids within one batch are each applied in turn, so the last
/// occurrence determines the persisted state.
pub async fn reconcile<S: EpisodeStore>(store: &S, episodes: &[NormalizedEpisode]) -> SyncSummary {
    let mut summary = SyncSummary {
        total: episodes.len(),
        ..SyncSummary::default()
    };

    for episode in episodes {
        match apply_one(store, episode).await {
            Ok(Applied::Added) => {
                tracing::debug!(guid = %episode.guid, title = %episode.title, "Added new episode");
                summary.added += 1;
            }
            Ok(Applied::Updated) => {
                tracing::debug!(guid = %episode.guid, title = %episode.title, "Updated episode");
                summary.updated += 1;
            }
            Err(e) => {
                tracing::warn!(
                    title = %episode.title,
                    error = %e,
                    "Episode write failed, continuing with the rest of the batch"
                );
                summary
                    .errors
                    .push(format!("Error processing episode \"{}\": {}", episode.title, e));
            }
        }
    }

    summary
}

async fn apply_one<S: EpisodeStore>(store: &S, episode: &NormalizedEpisode) -> Result<Applied> {
    match store.find_by_guid(&episode.guid).await? {
        Some(existing) => {
            store.update(existing.id, episode).await?;
            Ok(Applied::Updated)
        }
        None => {
            store.insert(episode).await?;
            Ok(Applied::Added)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use chrono::{TimeZone, Utc};
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    fn normalized(guid: &str, title: &str) -> NormalizedEpisode {
        NormalizedEpisode {
            guid: guid.to_string(),
            title: title.to_string(),
            description: String::new(),
            audio_url: format!("https://cdn.example.com/{}.mp3", guid),
            published_date: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            duration: "30:00".to_string(),
            duration_minutes: 30,
            cover_image: "https://cdn.example.com/cover.jpg".to_string(),
            season: 1,
            episode: 1,
            is_preview: false,
            imported_at: Utc.timestamp_opt(1_750_000_000, 0).unwrap(),
        }
    }

    /// In-memory store double. Guids listed in `fail_on` make every write
    /// and lookup for that episode fail, simulating a persistence outage
    /// scoped to single items.
    #[derive(Default)]
    struct MemStore {
        rows: Mutex<HashMap<String, (i64, String)>>, // guid -> (id, title)
        fail_on: HashSet<String>,
    }

    impl MemStore {
        fn failing_on(guids: &[&str]) -> Self {
            Self {
                fail_on: guids.iter().map(|g| g.to_string()).collect(),
                ..Self::default()
            }
        }

        fn titles(&self) -> Vec<String> {
            let rows = self.rows.lock().unwrap();
            let mut titles: Vec<_> = rows.values().cloned().collect();
            titles.sort_by_key(|(id, _)| *id);
            titles.into_iter().map(|(_, t)| t).collect()
        }
    }

    impl EpisodeStore for MemStore {
        async fn find_by_guid(&self, guid: &str) -> Result<Option<Episode>> {
            if self.fail_on.contains(guid) {
                return Err(anyhow!("connection reset by peer"));
            }
            let rows = self.rows.lock().unwrap();
            Ok(rows.get(guid).map(|(id, title)| Episode {
                id: *id,
                guid: guid.to_string(),
                title: title.clone(),
                description: String::new(),
                audio_url: String::new(),
                published_date: 0,
                duration: String::new(),
                duration_minutes: 0,
                cover_image: String::new(),
                season: 1,
                episode: 0,
                is_preview: false,
                created_at: 0,
                rss_imported_at: 0,
            }))
        }

        async fn insert(&self, episode: &NormalizedEpisode) -> Result<()> {
            let mut rows = self.rows.lock().unwrap();
            let id = rows.len() as i64 + 1;
            rows.insert(episode.guid.clone(), (id, episode.title.clone()));
            Ok(())
        }

        async fn update(&self, id: i64, episode: &NormalizedEpisode) -> Result<()> {
            let mut rows = self.rows.lock().unwrap();
            rows.insert(episode.guid.clone(), (id, episode.title.clone()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_new_items_are_added_known_items_updated() {
        let store = MemStore::default();
        store.insert(&normalized("g1", "Old")).await.unwrap();

        let batch = vec![normalized("g1", "Renamed"), normalized("g2", "Fresh")];
        let summary = reconcile(&store, &batch).await;

        assert_eq!(summary.added, 1);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.total, 2);
        assert!(summary.errors.is_empty());
        assert_eq!(store.titles(), vec!["Renamed", "Fresh"]);
    }

    #[tokio::test]
    async fn test_failure_on_item_three_of_five_does_not_stop_the_batch() {
        let store = MemStore::failing_on(&["g3"]);
        let batch: Vec<_> = (1..=5)
            .map(|n| normalized(&format!("g{}", n), &format!("Episode {}", n)))
            .collect();

        let summary = reconcile(&store, &batch).await;

        assert_eq!(summary.added, 4); // items 1, 2, 4, 5
        assert_eq!(summary.updated, 0);
        assert_eq!(summary.total, 5);
        assert_eq!(summary.errors.len(), 1);
        assert!(
            summary.errors[0].contains("Episode 3"),
            "error should name the failing item's title: {}",
            summary.errors[0]
        );
    }

    #[tokio::test]
    async fn test_duplicate_guid_last_occurrence_wins() {
        let store = MemStore::default();
        let batch = vec![normalized("dup", "First"), normalized("dup", "Second")];

        let summary = reconcile(&store, &batch).await;

        assert_eq!(summary.added, 1);
        assert_eq!(summary.updated, 1);
        assert_eq!(store.titles(), vec!["Second"]);
    }

    #[tokio::test]
    async fn test_outcome_classification() {
        let clean = SyncSummary {
            added: 2,
            updated: 3,
            total: 5,
            errors: vec![],
        };
        assert_eq!(outcome(&clean), SyncStatus::Success);

        let some_progress = SyncSummary {
            added: 1,
            updated: 0,
            total: 2,
            errors: vec!["boom".to_string()],
        };
        assert_eq!(outcome(&some_progress), SyncStatus::Partial);

        let no_progress = SyncSummary {
            added: 0,
            updated: 4,
            total: 5,
            errors: vec!["boom".to_string()],
        };
        assert_eq!(outcome(&no_progress), SyncStatus::Failed);
    }
}
