use std::{future::Future, time::Duration};

use sea_orm::DbErr;

const MAX_RETRIES: usize = 3;
const INITIAL_BACKOFF_MS: u64 = 50;
const MAX_BACKOFF_MS: u64 = 1_000;

/// Re-runs `op` while sqlite reports the database as locked. Any other error
/// is returned on the first occurrence.
pub async fn retry_on_busy<T, F, Fut>(mut op: F) -> Result<T, DbErr>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbErr>>,
{
    let mut backoff = Duration::from_millis(INITIAL_BACKOFF_MS);
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if is_busy(&err) && attempt < MAX_RETRIES => {
                attempt += 1;
                tracing::debug!(attempt, "database busy, retrying");
                tokio::time::sleep(backoff).await;
                let next_ms = (backoff.as_millis() as u64)
                    .saturating_mul(2)
                    .min(MAX_BACKOFF_MS);
                backoff = Duration::from_millis(next_ms);
            }
            Err(err) => return Err(err),
        }
    }
}

fn is_busy(err: &DbErr) -> bool {
    let message = err.to_string();
    message.contains("database is locked") || message.contains("database is busy")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn retries_busy_errors_then_succeeds() {
        let attempts = AtomicUsize::new(0);
        let value = retry_on_busy(|| {
            let seen = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if seen < 2 {
                    Err(DbErr::Custom("database is locked".to_string()))
                } else {
                    Ok(7)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let attempts = AtomicUsize::new(0);
        let result: Result<(), DbErr> = retry_on_busy(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(DbErr::Custom("constraint failed".to_string())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let attempts = AtomicUsize::new(0);
        let result: Result<(), DbErr> = retry_on_busy(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(DbErr::Custom("database is busy".to_string())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), MAX_RETRIES + 1);
    }
}
