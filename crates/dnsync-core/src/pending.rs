//! Waiting for asynchronously applied changes
//!
//! Some provider APIs accept a change and apply it later. Such providers
//! call [`wait_until_applied`] from `apply_changes` so that a pass only
//! completes once the change is live.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};

/// State of a submitted change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    Pending,
    Done,
}

/// Poll `check` until it reports [`ChangeStatus::Done`]
///
/// `check` is called at most `max_attempts` times, `delay` apart. Errors
/// from `check` are returned immediately.
///
/// # Errors
///
/// Returns [`Error::PendingTimeout`] if the change is still pending after
/// the last attempt.
pub async fn wait_until_applied<F, Fut>(
    provider: &str,
    change: &str,
    max_attempts: usize,
    delay: Duration,
    mut check: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ChangeStatus>>,
{
    for attempt in 1..=max_attempts {
        match check().await? {
            ChangeStatus::Done => {
                debug!("Change {} at {} applied after {} checks", change, provider, attempt);
                return Ok(());
            }
            ChangeStatus::Pending => {
                debug!("Change {} at {} still pending (check {}/{})", change, provider, attempt, max_attempts);

                // Wait before the next check (unless this was the last attempt)
                if attempt < max_attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(Error::PendingTimeout {
        provider: provider.to_string(),
        change: change.to_string(),
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_done_after_retries() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let result = wait_until_applied("mock", "c1", 5, Duration::from_secs(1), move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Ok(ChangeStatus::Pending)
                } else {
                    Ok(ChangeStatus::Done)
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let err = wait_until_applied("mock", "c1", 3, Duration::from_secs(1), || async {
            Ok(ChangeStatus::Pending)
        })
        .await
        .unwrap_err();

        assert!(err.is_fatal());
        assert!(matches!(err, Error::PendingTimeout { attempts: 3, .. }));
    }
}
