//! Async task poller
//!
//! Mutating cloud calls return an opaque flow/task handle and finish in the
//! background. `await_completion` polls a status probe until the task reaches
//! a terminal state, a fatal error occurs, or the time budget runs out.
//!
//! The probe owns all vendor-specific knowledge: which describe call to make,
//! which status literals mean what, and whether a call error is fatal or
//! transient. The poller never touches resource state; callers re-read the
//! resource after a successful wait.

use std::time::{Duration, Instant};

use thiserror::Error;

use crate::provider::ProviderError;
use crate::retry::READ_RETRY_TIMEOUT;

/// Pause between status probes
pub const TASK_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Classified result of one status probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    /// Still running, keep polling
    Pending,
    /// Terminal success
    Success,
    /// Terminal failure, carrying the status the API reported
    Failed(String),
}

/// Failure of the probe call itself
#[derive(Debug)]
pub enum ProbeError {
    /// Typed API refusal; polling again cannot change the outcome
    Fatal(ProviderError),
    /// Transport-level or otherwise unclassified failure; keep polling
    Transient(ProviderError),
}

/// Terminal error of a polling wait
#[derive(Debug, Error)]
pub enum TaskError {
    /// The task itself reported a failed status
    #[error("task failed with status: {status}")]
    Failed { status: String },

    /// No terminal status was observed within the budget
    #[error("task still pending after {}s", timeout.as_secs())]
    TimedOut { timeout: Duration },

    /// The status probe failed fatally; carries that error unchanged
    #[error(transparent)]
    Fatal(#[from] ProviderError),
}

impl From<TaskError> for ProviderError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::Fatal(inner) => inner,
            other => ProviderError::new(other.to_string()),
        }
    }
}

/// Interval and overall budget for one polling wait
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollConfig {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Default budget for asynchronous flows: six read-retry windows
    pub fn task() -> Self {
        Self::new(TASK_POLL_INTERVAL, READ_RETRY_TIMEOUT * 6)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Poll `probe` until the task completes, fails, or the budget is spent.
///
/// Probe errors are classified by the caller: `ProbeError::Fatal` aborts the
/// wait immediately and is returned unchanged, `ProbeError::Transient` is
/// treated like a pending status. A timeout is reported as
/// `TaskError::TimedOut`, distinct from a task-reported failure.
pub async fn await_completion<F, Fut>(config: PollConfig, mut probe: F) -> Result<(), TaskError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<TaskState, ProbeError>>,
{
    let deadline = Instant::now() + config.timeout;

    loop {
        match probe().await {
            Ok(TaskState::Success) => return Ok(()),
            Ok(TaskState::Failed(status)) => return Err(TaskError::Failed { status }),
            Ok(TaskState::Pending) => {}
            Err(ProbeError::Fatal(err)) => return Err(TaskError::Fatal(err)),
            Err(ProbeError::Transient(_)) => {}
        }

        if Instant::now() + config.interval > deadline {
            return Err(TaskError::TimedOut {
                timeout: config.timeout,
            });
        }
        tokio::time::sleep(config.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn quick() -> PollConfig {
        PollConfig::new(Duration::from_millis(1), Duration::from_millis(200))
    }

    fn scripted(
        states: Vec<Result<TaskState, ProbeError>>,
    ) -> (
        std::sync::Arc<AtomicUsize>,
        impl FnMut() -> std::future::Ready<Result<TaskState, ProbeError>>,
    ) {
        let calls = std::sync::Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut script = states.into_iter();
        let probe = move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(script.next().expect("probe called past end of script"))
        };
        (calls, probe)
    }

    #[tokio::test]
    async fn pending_pending_success_queries_exactly_three_times() {
        let (calls, probe) = scripted(vec![
            Ok(TaskState::Pending),
            Ok(TaskState::Pending),
            Ok(TaskState::Success),
        ]);

        let result = await_completion(quick(), probe).await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failure_embeds_reported_status() {
        let (_, probe) = scripted(vec![
            Ok(TaskState::Pending),
            Ok(TaskState::Failed("UNPAID".to_string())),
        ]);

        let err = await_completion(quick(), probe).await.unwrap_err();

        assert!(matches!(err, TaskError::Failed { .. }));
        assert!(err.to_string().contains("UNPAID"));
    }

    #[tokio::test]
    async fn fatal_probe_error_stops_immediately_and_is_unchanged() {
        let (calls, probe) = scripted(vec![Err(ProbeError::Fatal(ProviderError::new(
            "InvalidParameterValue.ClusterNotFound",
        )))]);

        let err = await_completion(quick(), probe).await.unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        match err {
            TaskError::Fatal(inner) => {
                assert_eq!(inner.message, "InvalidParameterValue.ClusterNotFound")
            }
            other => panic!("expected fatal, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn transient_probe_errors_keep_polling() {
        let (calls, probe) = scripted(vec![
            Err(ProbeError::Transient(ProviderError::new("connection reset"))),
            Err(ProbeError::Transient(ProviderError::new("connection reset"))),
            Ok(TaskState::Success),
        ]);

        let result = await_completion(quick(), probe).await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn timeout_is_distinct_from_failure() {
        let config = PollConfig::new(Duration::from_millis(2), Duration::from_millis(20));

        let err = await_completion(config, || std::future::ready(Ok(TaskState::Pending)))
            .await
            .unwrap_err();

        assert!(matches!(err, TaskError::TimedOut { .. }));
        assert!(!matches!(err, TaskError::Failed { .. }));
        assert!(err.to_string().contains("still pending"));
    }

    #[tokio::test]
    async fn fatal_survives_conversion_to_provider_error() {
        let (_, probe) = scripted(vec![Err(ProbeError::Fatal(ProviderError::new(
            "AuthFailure.SignatureExpire",
        )))]);

        let err = await_completion(quick(), probe).await.unwrap_err();
        let provider_err = ProviderError::from(err);

        assert_eq!(provider_err.message, "AuthFailure.SignatureExpire");
    }
}
