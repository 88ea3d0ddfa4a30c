//! Status vocabularies and error classification
//!
//! Every asynchronous wait in this provider polls a describe call and maps
//! its status field through one of these enums. Each API family has its own
//! vocabulary; parsing is total, unknown values land in an `Other` variant
//! instead of being silently treated as pending or done.

use vela_core::provider::ProviderError;
use vela_core::retry::RetryError;
use vela_core::task::{ProbeError, TaskState};
use vela_tencent::TencentError;

/// API error codes that are worth retrying regardless of call site
const RETRYABLE_CODES: &[&str] = &[
    "FailedOperation",
    "InternalError",
    "TradeUnknownError",
    "RequestLimitExceeded",
    "ResourceInUse",
    "ResourceUnavailable",
];

/// Classify a call failure for the retry loop.
///
/// Transport and decode failures are always transient. API refusals are
/// permanent unless their code is in the shared retryable list or in
/// `extra_retryable`, which call sites use for codes that mean "billing or
/// flow still propagating" on their particular action.
pub fn call_error(err: TencentError, extra_retryable: &[&str]) -> RetryError {
    if !err.is_api() {
        return RetryError::Transient(ProviderError::new(err.to_string()));
    }
    let retryable = err
        .code()
        .is_some_and(|code| RETRYABLE_CODES.contains(&code) || extra_retryable.contains(&code));
    if retryable {
        RetryError::Transient(ProviderError::new(err.to_string()))
    } else {
        RetryError::Permanent(ProviderError::new(err.to_string()))
    }
}

/// Classify a status-probe failure for the task poller.
///
/// A typed API refusal cannot be polled away; anything else (transport,
/// malformed body) is treated like a pending status and probed again.
pub fn probe_error(err: TencentError) -> ProbeError {
    if err.is_api() {
        ProbeError::Fatal(ProviderError::new(err.to_string()))
    } else {
        ProbeError::Transient(ProviderError::new(err.to_string()))
    }
}

/// Cluster lifecycle status reported by DescribeClusters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterStatus {
    Creating,
    Running,
    Isolated,
    Offlined,
    Deleted,
    Other(String),
}

impl ClusterStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            "creating" => Self::Creating,
            "running" => Self::Running,
            "isolated" => Self::Isolated,
            "offlined" => Self::Offlined,
            "deleted" => Self::Deleted,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Creating => "creating",
            Self::Running => "running",
            Self::Isolated => "isolated",
            Self::Offlined => "offlined",
            Self::Deleted => "deleted",
            Self::Other(s) => s,
        }
    }

    /// Terminal states in which the cluster no longer serves traffic and is
    /// reported as absent to the planner
    pub fn is_gone(&self) -> bool {
        matches!(self, Self::Isolated | Self::Offlined | Self::Deleted)
    }
}

/// Serverless pause/resume status of a cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerlessStatus {
    Resume,
    Pause,
    Resuming,
    Pausing,
    Other(String),
}

impl ServerlessStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            "resume" => Self::Resume,
            "pause" => Self::Pause,
            "resuming" => Self::Resuming,
            "pausing" => Self::Pausing,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Resume => "resume",
            Self::Pause => "pause",
            Self::Resuming => "resuming",
            Self::Pausing => "pausing",
            Self::Other(s) => s,
        }
    }

    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Resuming | Self::Pausing)
    }
}

/// Result of one DescribeFlow probe.
///
/// Flow status is numeric: 0 done, 1 failed, 2 still processing. Any other
/// code is surfaced as a failure carrying the raw number.
pub fn flow_state(status: i64) -> TaskState {
    match status {
        0 => TaskState::Success,
        2 => TaskState::Pending,
        other => TaskState::Failed(other.to_string()),
    }
}

/// Result of one DescribeAsyncRequestInfo probe.
///
/// INITIAL and RUNNING mean the task is still working; SUCCESS is terminal.
/// Every other status (FAILED, KILLED, PAUSED, REMOVED) ends the wait with
/// that status and the task's own message in the error. An empty status is
/// a response the task tracker has not populated yet.
pub fn async_request_state(status: &str, message: &str) -> TaskState {
    match status {
        "" | "INITIAL" | "RUNNING" => TaskState::Pending,
        "SUCCESS" => TaskState::Success,
        other if message.is_empty() => TaskState::Failed(other.to_string()),
        other => TaskState::Failed(format!("{} ({})", other, message)),
    }
}

/// Result of one license bind schedule probe.
///
/// Bind task status is numeric: 0 binding, 1 bound, 2 failed. Codes this
/// provider does not know yet are treated as still binding so a vocabulary
/// extension on the API side cannot flip a working bind into a failure.
pub fn bind_task_state(status: i64, err_msg: &str) -> TaskState {
    match status {
        1 => TaskState::Success,
        2 if err_msg.is_empty() => TaskState::Failed("2".to_string()),
        2 => TaskState::Failed(format!("2 ({})", err_msg)),
        _ => TaskState::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: &str) -> TencentError {
        TencentError::Api {
            code: code.to_string(),
            message: "refused".to_string(),
            request_id: "req-1".to_string(),
        }
    }

    #[test]
    fn typed_refusal_is_permanent() {
        let classified = call_error(api_error("InvalidParameterValue.ClusterNotFound"), &[]);
        assert!(matches!(classified, RetryError::Permanent(_)));
    }

    #[test]
    fn shared_retryable_codes_are_transient() {
        let classified = call_error(api_error("RequestLimitExceeded"), &[]);
        assert!(matches!(classified, RetryError::Transient(_)));
    }

    #[test]
    fn extra_retryable_code_applies_to_one_call_site() {
        let code = "InvalidParameterValue.DealNameNotFound";
        assert!(matches!(
            call_error(api_error(code), &[code]),
            RetryError::Transient(_)
        ));
        assert!(matches!(
            call_error(api_error(code), &[]),
            RetryError::Permanent(_)
        ));
    }

    #[test]
    fn probe_classification_matches_error_kind() {
        assert!(matches!(
            probe_error(api_error("UnsupportedOperation")),
            ProbeError::Fatal(_)
        ));
        assert!(matches!(
            probe_error(TencentError::MissingEnvVar("X".to_string())),
            ProbeError::Transient(_)
        ));
    }

    #[test]
    fn cluster_status_round_trips() {
        for s in ["creating", "running", "isolated", "offlined", "deleted"] {
            assert_eq!(ClusterStatus::parse(s).as_str(), s);
        }
        let unknown = ClusterStatus::parse("resizing");
        assert_eq!(unknown, ClusterStatus::Other("resizing".to_string()));
        assert!(!unknown.is_gone());
        assert!(ClusterStatus::parse("offlined").is_gone());
    }

    #[test]
    fn serverless_status_round_trips() {
        assert!(ServerlessStatus::parse("pausing").is_transitioning());
        assert!(!ServerlessStatus::parse("pause").is_transitioning());
        assert_eq!(ServerlessStatus::parse("resume").as_str(), "resume");
    }

    #[test]
    fn flow_states() {
        assert_eq!(flow_state(0), TaskState::Success);
        assert_eq!(flow_state(2), TaskState::Pending);
        assert_eq!(flow_state(1), TaskState::Failed("1".to_string()));
        assert_eq!(flow_state(7), TaskState::Failed("7".to_string()));
    }

    #[test]
    fn async_request_states() {
        assert_eq!(async_request_state("INITIAL", ""), TaskState::Pending);
        assert_eq!(async_request_state("RUNNING", ""), TaskState::Pending);
        assert_eq!(async_request_state("", ""), TaskState::Pending);
        assert_eq!(async_request_state("SUCCESS", ""), TaskState::Success);
        assert_eq!(
            async_request_state("FAILED", "param rejected"),
            TaskState::Failed("FAILED (param rejected)".to_string())
        );
        assert_eq!(
            async_request_state("KILLED", ""),
            TaskState::Failed("KILLED".to_string())
        );
    }

    #[test]
    fn bind_task_states() {
        assert_eq!(bind_task_state(0, ""), TaskState::Pending);
        assert_eq!(bind_task_state(1, ""), TaskState::Success);
        assert_eq!(
            bind_task_state(2, "machine offline"),
            TaskState::Failed("2 (machine offline)".to_string())
        );
        assert_eq!(bind_task_state(9, ""), TaskState::Pending);
    }
}
