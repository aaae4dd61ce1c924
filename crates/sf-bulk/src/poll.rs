//! Waiting for a job to reach a terminal state.

use std::future::Future;

use tokio::time::{sleep, timeout};
use tracing::info;

use crate::error::{Error, ErrorKind, Result};
use crate::types::{JobState, PollOptions};

/// Fetch the job on a fixed interval until its state is terminal.
///
/// With `options.timeout` the wait gives up with [`ErrorKind::Timeout`].
/// Giving up, or dropping the returned future, only stops the local wait:
/// the remote job keeps running.
pub(crate) async fn wait_for_job<T, F, Fut>(
    job_id: &str,
    options: &PollOptions,
    mut fetch: F,
    state_of: fn(&T) -> JobState,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let interval = options.interval;
    let wait = async move {
        let mut last = None;
        loop {
            let current = fetch().await?;
            let state = state_of(&current);
            if last != Some(state) {
                info!(job_id, %state, "Job state");
                last = Some(state);
            }
            if state.is_terminal() {
                return Ok(current);
            }
            sleep(interval).await;
        }
    };

    match options.timeout {
        Some(limit) => timeout(limit, wait).await.map_err(|_| {
            Error::new(ErrorKind::Timeout {
                job_id: job_id.to_string(),
                waited: limit,
            })
        })?,
        None => wait.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn options(timeout: Option<Duration>) -> PollOptions {
        PollOptions {
            interval: Duration::from_millis(5),
            timeout,
        }
    }

    #[tokio::test]
    async fn test_returns_first_terminal_state() {
        let calls = AtomicUsize::new(0);
        let states = [JobState::UploadComplete, JobState::InProgress, JobState::JobComplete];

        let state = wait_for_job(
            "750A",
            &options(None),
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(states[n]) }
            },
            |s: &JobState| *s,
        )
        .await
        .unwrap();

        assert_eq!(state, JobState::JobComplete);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_timeout_stops_waiting() {
        let err = wait_for_job(
            "750B",
            &options(Some(Duration::from_millis(40))),
            || async { Ok(JobState::InProgress) },
            |s: &JobState| *s,
        )
        .await
        .unwrap_err();

        assert!(matches!(err.kind, ErrorKind::Timeout { ref job_id, .. } if job_id == "750B"));
    }

    #[tokio::test]
    async fn test_fetch_error_propagates() {
        let err = wait_for_job(
            "750C",
            &options(None),
            || async {
                Err::<JobState, _>(forcelink_client::Error::new(
                    forcelink_client::ErrorKind::Connection("reset".into()),
                )
                .into())
            },
            |s: &JobState| *s,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err.client_kind(),
            Some(forcelink_client::ErrorKind::Connection(_))
        ));
    }
}
