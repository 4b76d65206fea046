//! Read access to product snapshots written by file ingestion.

use std::sync::Arc;

use anyhow::{Context, Result};
use livequery_common::{ProductSnapshot, SnapshotStatus};
use livequery_store::{RecordStore, RecordStoreExt};
use tracing::{debug, warn};

#[derive(Clone)]
pub struct SnapshotReader {
    store: Arc<dyn RecordStore>,
}

impl SnapshotReader {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// The most recent usable snapshot, if any.
    ///
    /// Only READY snapshots with non-empty raw text qualify. Recency is
    /// `processed_at`, else `timestamp`, else 0; the first of equally recent
    /// snapshots in key order wins.
    pub async fn latest_ready(&self) -> Result<Option<ProductSnapshot>> {
        let snapshots = self.scan().await?;

        let mut best: Option<ProductSnapshot> = None;
        for snapshot in snapshots.into_iter().filter(ProductSnapshot::is_usable) {
            let newer = best
                .as_ref()
                .map_or(true, |current| snapshot.recency() > current.recency());
            if newer {
                best = Some(snapshot);
            }
        }

        match &best {
            Some(snapshot) => debug!(file_key = %snapshot.file_key, "Using product snapshot"),
            None => debug!("No ready product snapshot"),
        }
        Ok(best)
    }

    /// READY snapshots that carry a non-empty `result`, for display.
    pub async fn ready_results(&self) -> Result<Vec<ProductSnapshot>> {
        Ok(self
            .scan()
            .await?
            .into_iter()
            .filter(|s| {
                s.status == SnapshotStatus::Ready
                    && s.result.as_deref().is_some_and(|r| !r.is_empty())
            })
            .collect())
    }

    /// Store `snapshot` under its file key, replacing any earlier version.
    pub async fn register(&self, snapshot: &ProductSnapshot) -> Result<()> {
        self.store
            .put_as(&snapshot.file_key, snapshot)
            .await
            .with_context(|| format!("failed to store snapshot {}", snapshot.file_key))
    }

    async fn scan(&self) -> Result<Vec<ProductSnapshot>> {
        let rows = self
            .store
            .scan()
            .await
            .context("failed to scan product snapshots")?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value(row) {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed snapshot record");
                    None
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livequery_store::MemoryRecordStore;

    fn snapshot(
        key: &str,
        raw: &str,
        processed_at: Option<i64>,
        timestamp: Option<i64>,
    ) -> ProductSnapshot {
        ProductSnapshot {
            processed_at,
            timestamp,
            ..ProductSnapshot::ready(key, raw)
        }
    }

    async fn reader(snapshots: &[ProductSnapshot]) -> SnapshotReader {
        let reader = SnapshotReader::new(Arc::new(MemoryRecordStore::new()));
        for s in snapshots {
            reader.register(s).await.unwrap();
        }
        reader
    }

    #[tokio::test]
    async fn empty_table_has_no_snapshot() {
        assert!(reader(&[]).await.latest_ready().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn picks_most_recently_processed() {
        let reader = reader(&[
            snapshot("a.txt", "old", Some(100), None),
            snapshot("b.txt", "new", Some(200), None),
            snapshot("c.txt", "older", None, Some(150)),
        ])
        .await;
        let best = reader.latest_ready().await.unwrap().unwrap();
        assert_eq!(best.file_key, "b.txt");
    }

    #[tokio::test]
    async fn falls_back_to_timestamp() {
        let reader = reader(&[
            snapshot("a.txt", "one", None, Some(300)),
            snapshot("b.txt", "two", Some(200), None),
        ])
        .await;
        assert_eq!(reader.latest_ready().await.unwrap().unwrap().file_key, "a.txt");
    }

    #[tokio::test]
    async fn skips_unusable_snapshots() {
        let mut failed = snapshot("z.txt", "broken", Some(999), None);
        failed.status = SnapshotStatus::Failed;
        let blank = snapshot("y.txt", "", Some(998), None);
        let reader = reader(&[failed, blank, snapshot("a.txt", "ok", Some(1), None)]).await;
        assert_eq!(reader.latest_ready().await.unwrap().unwrap().file_key, "a.txt");
    }

    #[tokio::test]
    async fn ties_keep_the_first_in_key_order() {
        let reader = reader(&[
            snapshot("b.txt", "two", Some(5), None),
            snapshot("a.txt", "one", Some(5), None),
        ])
        .await;
        assert_eq!(reader.latest_ready().await.unwrap().unwrap().file_key, "a.txt");
    }

    #[tokio::test]
    async fn ready_results_require_a_result() {
        let mut with_result = snapshot("a.txt", "raw", Some(1), None);
        with_result.result = Some("summary".into());
        let reader = reader(&[with_result, snapshot("b.txt", "raw", Some(2), None)]).await;
        let results = reader.ready_results().await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].file_key, "a.txt");
    }
}
