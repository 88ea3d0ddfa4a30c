//! Error types for TencentCloud API calls

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TencentError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// Error reported by the API itself. These carry a stable error code
    /// such as "InvalidParameterValue.ClusterNotFound" and indicate the
    /// request was received and rejected; retrying the same request will
    /// not change the outcome unless the code says otherwise.
    #[error("[TencentCloudSDKError] Code={code}, Message={message}, RequestId={request_id}")]
    Api {
        code: String,
        message: String,
        request_id: String,
    },

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode API response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl TencentError {
    /// Whether this is a typed API error (as opposed to transport noise)
    pub fn is_api(&self) -> bool {
        matches!(self, TencentError::Api { .. })
    }

    /// Error code, if the API reported one
    pub fn code(&self) -> Option<&str> {
        match self {
            TencentError::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Whether the API error code equals the given code
    pub fn is_code(&self, expected: &str) -> bool {
        self.code() == Some(expected)
    }

    /// Whether the API error code starts with the given prefix, e.g.
    /// "FailedOperation." to match a whole code family
    pub fn code_starts_with(&self, prefix: &str) -> bool {
        self.code().is_some_and(|c| c.starts_with(prefix))
    }

    /// Whether the API error message contains the given fragment. Some
    /// operations only signal "not ready yet" through message text.
    pub fn message_contains(&self, fragment: &str) -> bool {
        match self {
            TencentError::Api { message, .. } => message.contains(fragment),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, TencentError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: &str, message: &str) -> TencentError {
        TencentError::Api {
            code: code.to_string(),
            message: message.to_string(),
            request_id: "f3d2a1b0-0000-0000-0000-000000000000".to_string(),
        }
    }

    #[test]
    fn code_predicates() {
        let err = api_error("InvalidParameterValue.ClusterNotFound", "cluster not found");
        assert!(err.is_api());
        assert!(err.is_code("InvalidParameterValue.ClusterNotFound"));
        assert!(err.code_starts_with("InvalidParameterValue"));
        assert!(!err.is_code("InternalError"));
    }

    #[test]
    fn message_fragment_matching() {
        let err = api_error("FailedOperation", "return not found valid deal");
        assert!(err.message_contains("not found valid deal"));
        assert!(!err.message_contains("record not found"));
    }

    #[test]
    fn display_includes_code_and_request_id() {
        let err = api_error("AuthFailure.SignatureExpire", "signature expired");
        let text = err.to_string();
        assert!(text.contains("AuthFailure.SignatureExpire"));
        assert!(text.contains("RequestId=f3d2a1b0"));
    }
}
