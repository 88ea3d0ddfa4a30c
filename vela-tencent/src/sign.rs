//! TC3-HMAC-SHA256 request signing
//!
//! All TencentCloud JSON API calls are POSTs to "/" with a JSON body,
//! so the canonical request always signs the same two headers
//! (content-type and host) and an empty query string.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::credential::Credential;

const ALGORITHM: &str = "TC3-HMAC-SHA256";
const SIGNED_HEADERS: &str = "content-type;host";

pub(crate) const CONTENT_TYPE: &str = "application/json; charset=utf-8";

type HmacSha256 = Hmac<Sha256>;

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn canonical_request(host: &str, payload: &str) -> String {
    format!(
        "POST\n/\n\ncontent-type:{}\nhost:{}\n\n{}\n{}",
        CONTENT_TYPE,
        host,
        SIGNED_HEADERS,
        sha256_hex(payload.as_bytes())
    )
}

fn string_to_sign(timestamp: i64, scope: &str, canonical: &str) -> String {
    format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        timestamp,
        scope,
        sha256_hex(canonical.as_bytes())
    )
}

/// Build the Authorization header value for one request
pub(crate) fn authorization(
    credential: &Credential,
    service: &str,
    host: &str,
    payload: &str,
    now: &DateTime<Utc>,
) -> String {
    let date = now.format("%Y-%m-%d").to_string();
    let scope = format!("{}/{}/tc3_request", date, service);

    let canonical = canonical_request(host, payload);
    let to_sign = string_to_sign(now.timestamp(), &scope, &canonical);

    let secret_date = hmac_sha256(
        format!("TC3{}", credential.secret_key).as_bytes(),
        date.as_bytes(),
    );
    let secret_service = hmac_sha256(&secret_date, service.as_bytes());
    let secret_signing = hmac_sha256(&secret_service, b"tc3_request");
    let signature = hex::encode(hmac_sha256(&secret_signing, to_sign.as_bytes()));

    format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, credential.secret_id, scope, SIGNED_HEADERS, signature
    )
}
