use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use db::{DBService, DbErr, models::blob_deletion::BlobDeletion, retry::retry_on_busy};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{blob_store::BlobStore, config::WorkerConfig};

const BATCH_LIMIT: u64 = 50;
const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(600);

/// Delay before retry number `attempt` (1-based): 1s, 2s, 4s, ... capped at
/// ten minutes.
pub fn backoff_delay(attempt: i32) -> Duration {
    let exponent = attempt.saturating_sub(1).clamp(0, 16) as u32;
    BACKOFF_BASE
        .saturating_mul(2u32.saturating_pow(exponent))
        .min(BACKOFF_CAP)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainSummary {
    pub deleted: usize,
    pub failed: usize,
    pub abandoned: usize,
}

/// Drains the durable blob deletion queue.
#[derive(Clone)]
pub struct BlobDeletionWorker {
    db: DBService,
    store: Arc<dyn BlobStore>,
    poll_interval: Duration,
    max_attempts: i32,
}

impl BlobDeletionWorker {
    pub fn new(db: DBService, store: Arc<dyn BlobStore>, workers: &WorkerConfig) -> Self {
        Self {
            db,
            store,
            poll_interval: workers.blob_deletion_poll_interval(),
            max_attempts: workers.blob_deletion_max_attempts,
        }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if let Err(err) = self.drain_due(Utc::now()).await {
                    tracing::error!(error = %err, "blob deletion pass failed");
                }
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            }
            tracing::debug!("blob deletion worker stopped");
        })
    }

    /// Attempts every deletion due at `now`.
    pub async fn drain_due(&self, now: DateTime<Utc>) -> Result<DrainSummary, DbErr> {
        let pool = &self.db.pool;
        let due = retry_on_busy(|| BlobDeletion::fetch_due(pool, now, self.max_attempts, BATCH_LIMIT))
            .await?;

        let mut summary = DrainSummary::default();
        for job in due {
            match self.store.delete(&job.bucket, &job.object_key).await {
                Ok(()) => {
                    retry_on_busy(|| BlobDeletion::mark_completed(pool, job.id)).await?;
                    tracing::debug!(bucket = %job.bucket, key = %job.object_key, "blob deleted");
                    summary.deleted += 1;
                }
                Err(err) => {
                    let message = err.to_string();
                    let next_attempt_at = now
                        + chrono::Duration::from_std(backoff_delay(job.attempts + 1))
                            .unwrap_or_else(|_| chrono::Duration::seconds(600));
                    let attempts = retry_on_busy(|| {
                        BlobDeletion::record_failure(pool, job.id, &message, next_attempt_at)
                    })
                    .await?;

                    if attempts >= self.max_attempts {
                        tracing::error!(
                            bucket = %job.bucket,
                            key = %job.object_key,
                            attempts,
                            error = %message,
                            "giving up on blob deletion, manual cleanup required"
                        );
                        summary.abandoned += 1;
                    } else {
                        tracing::warn!(
                            bucket = %job.bucket,
                            key = %job.object_key,
                            attempts,
                            error = %message,
                            %next_attempt_at,
                            "blob deletion failed, will retry"
                        );
                        summary.failed += 1;
                    }
                }
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::services::{
        blob_store::{BlobStoreError, LocalBlobStore},
        test_support::setup_db,
    };

    /// Fails the first `failures` deletes, then succeeds.
    struct FlakyStore {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BlobStore for FlakyStore {
        async fn put(
            &self,
            _bucket: &str,
            _key: &str,
            _body: Vec<u8>,
            _content_type: &str,
        ) -> Result<(), BlobStoreError> {
            Ok(())
        }

        async fn delete(&self, _bucket: &str, _key: &str) -> Result<(), BlobStoreError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                Err(BlobStoreError::Upstream("connection reset".to_string()))
            } else {
                Ok(())
            }
        }

        async fn presigned_url(
            &self,
            _bucket: &str,
            _key: &str,
            _expires_in: Duration,
        ) -> Result<String, BlobStoreError> {
            Ok(String::new())
        }
    }

    fn worker(db: DBService, store: Arc<dyn BlobStore>, max_attempts: i32) -> BlobDeletionWorker {
        BlobDeletionWorker::new(
            db,
            store,
            &WorkerConfig {
                blob_deletion_max_attempts: max_attempts,
                ..Default::default()
            },
        )
    }

    #[test]
    fn backoff_doubles_up_to_ten_minutes() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(5), Duration::from_secs(16));
        assert_eq!(backoff_delay(10), Duration::from_secs(512));
        assert_eq!(backoff_delay(11), Duration::from_secs(600));
        assert_eq!(backoff_delay(1000), Duration::from_secs(600));
    }

    #[tokio::test]
    async fn failures_are_retried_after_backoff() {
        let db = setup_db().await;
        BlobDeletion::enqueue(&db.pool, "uploads", "todos/a/attachments/x").await.unwrap();
        let store = Arc::new(FlakyStore {
            failures: 1,
            calls: AtomicUsize::new(0),
        });
        let worker = worker(db.clone(), store, 5);

        let now = Utc::now();
        let first = worker.drain_due(now).await.unwrap();
        assert_eq!(first.failed, 1);

        // Not due again until the backoff has elapsed.
        let early = worker.drain_due(now).await.unwrap();
        assert_eq!(early, DrainSummary::default());

        let later = worker
            .drain_due(now + chrono::Duration::seconds(2))
            .await
            .unwrap();
        assert_eq!(later.deleted, 1);
        assert_eq!(BlobDeletion::pending_count(&db.pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn worker_gives_up_after_max_attempts() {
        let db = setup_db().await;
        BlobDeletion::enqueue(&db.pool, "uploads", "stuck").await.unwrap();
        let store = Arc::new(FlakyStore {
            failures: usize::MAX,
            calls: AtomicUsize::new(0),
        });
        let worker = worker(db.clone(), store, 2);

        let now = Utc::now();
        assert_eq!(worker.drain_due(now).await.unwrap().failed, 1);
        let later = now + chrono::Duration::hours(1);
        assert_eq!(worker.drain_due(later).await.unwrap().abandoned, 1);
        assert_eq!(worker.drain_due(later).await.unwrap(), DrainSummary::default());

        let job = BlobDeletion::find_by_key(&db.pool, "stuck").await.unwrap().unwrap();
        assert_eq!(job.attempts, 2);
        assert!(job.completed_at.is_none());
        assert_eq!(job.last_error.as_deref(), Some("blob storage request failed: connection reset"));
    }

    #[tokio::test]
    async fn missing_objects_count_as_deleted() {
        let dir = TempDir::new().unwrap();
        let db = setup_db().await;
        BlobDeletion::enqueue(&db.pool, "uploads", "todos/a/attachments/never-written")
            .await
            .unwrap();
        let store = Arc::new(LocalBlobStore::new(dir.path()).await.unwrap());

        let summary = worker(db.clone(), store, 3).drain_due(Utc::now()).await.unwrap();
        assert_eq!(summary.deleted, 1);
        assert_eq!(BlobDeletion::pending_count(&db.pool).await.unwrap(), 0);
    }
}
