//! HTTP client for the TencentCloud JSON API
//!
//! Every action is a POST to https://{service}.tencentcloudapi.com/ with
//! the action, version and region in X-TC-* headers and a signed JSON
//! body. Responses arrive wrapped in a {"Response": {...}} envelope that
//! carries either the payload or an embedded Error object.

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::credential::Credential;
use crate::error::{Result, TencentError};
use crate::sign;

/// Shared API client
#[derive(Debug, Clone)]
pub struct TencentClient {
    http: reqwest::Client,
    credential: Credential,
    region: String,
}

impl TencentClient {
    pub fn new(credential: Credential, region: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            credential,
            region: region.into(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Send one API request and decode its Response body
    pub async fn call<Req, Resp>(
        &self,
        service: &str,
        version: &str,
        action: &str,
        request: &Req,
    ) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let host = format!("{}.tencentcloudapi.com", service);
        let url = format!("https://{}/", host);
        let payload = serde_json::to_string(request)?;
        let now = Utc::now();

        let authorization = sign::authorization(&self.credential, service, &host, &payload, &now);

        tracing::debug!(service, action, region = %self.region, "calling TencentCloud API");

        let mut builder = self
            .http
            .post(&url)
            .header("Authorization", authorization)
            .header("Content-Type", sign::CONTENT_TYPE)
            .header("Host", host)
            .header("X-TC-Action", action)
            .header("X-TC-Version", version)
            .header("X-TC-Timestamp", now.timestamp().to_string())
            .header("X-TC-Region", &self.region);
        if let Some(token) = &self.credential.security_token {
            builder = builder.header("X-TC-Token", token);
        }

        let body: serde_json::Value = builder.body(payload).send().await?.json().await?;
        decode_response(body)
    }
}

/// Unwrap the {"Response": {...}} envelope, surfacing embedded errors
fn decode_response<T: DeserializeOwned>(body: serde_json::Value) -> Result<T> {
    let response = body
        .get("Response")
        .cloned()
        .unwrap_or(serde_json::Value::Null);

    if let Some(error) = response.get("Error") {
        let code = error
            .get("Code")
            .and_then(|v| v.as_str())
            .unwrap_or("UnknownError")
            .to_string();
        let message = error
            .get("Message")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let request_id = response
            .get("RequestId")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        return Err(TencentError::Api {
            code,
            message,
            request_id,
        });
    }

    Ok(serde_json::from_value(response)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct DealNamesResponse {
        #[serde(rename = "DealNames")]
        deal_names: Vec<String>,
    }

    #[test]
    fn decode_success_envelope() {
        let body = json!({
            "Response": {
                "RequestId": "2f3c0e1a-0000-0000-0000-000000000000",
                "DealNames": ["20230831-dealname-12345"]
            }
        });

        let decoded: DealNamesResponse = decode_response(body).unwrap();
        assert_eq!(decoded.deal_names, vec!["20230831-dealname-12345"]);
    }

    #[test]
    fn decode_error_envelope() {
        let body = json!({
            "Response": {
                "RequestId": "2f3c0e1a-0000-0000-0000-000000000000",
                "Error": {
                    "Code": "InvalidParameterValue.ClusterNotFound",
                    "Message": "cluster not found"
                }
            }
        });

        let err = decode_response::<DealNamesResponse>(body).unwrap_err();
        match err {
            TencentError::Api { code, message, request_id } => {
                assert_eq!(code, "InvalidParameterValue.ClusterNotFound");
                assert_eq!(message, "cluster not found");
                assert!(request_id.starts_with("2f3c0e1a"));
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn decode_missing_envelope_is_a_decode_error() {
        let err = decode_response::<DealNamesResponse>(json!({"ok": true})).unwrap_err();
        assert!(matches!(err, TencentError::Decode(_)));
    }
}
