//! Static credentials loaded from the environment

use crate::error::{Result, TencentError};

/// API credentials
#[derive(Debug, Clone)]
pub struct Credential {
    pub secret_id: String,
    pub secret_key: String,
    /// STS session token for temporary credentials
    pub security_token: Option<String>,
}

impl Credential {
    pub fn new(secret_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            secret_id: secret_id.into(),
            secret_key: secret_key.into(),
            security_token: None,
        }
    }

    pub fn with_security_token(mut self, token: impl Into<String>) -> Self {
        self.security_token = Some(token.into());
        self
    }

    /// Create credentials from environment variables
    pub fn from_env() -> Result<Self> {
        let secret_id = std::env::var("TENCENTCLOUD_SECRET_ID")
            .map_err(|_| TencentError::MissingEnvVar("TENCENTCLOUD_SECRET_ID".to_string()))?;
        let secret_key = std::env::var("TENCENTCLOUD_SECRET_KEY")
            .map_err(|_| TencentError::MissingEnvVar("TENCENTCLOUD_SECRET_KEY".to_string()))?;
        let security_token = std::env::var("TENCENTCLOUD_SECURITY_TOKEN").ok();

        Ok(Self {
            secret_id,
            secret_key,
            security_token,
        })
    }

    /// Region from `TENCENTCLOUD_REGION`, falling back to ap-guangzhou
    pub fn region_from_env() -> String {
        std::env::var("TENCENTCLOUD_REGION").unwrap_or_else(|_| "ap-guangzhou".to_string())
    }
}
