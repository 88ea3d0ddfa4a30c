//! TencentCloud API client for Vela
//!
//! Implements the small slice of the TencentCloud JSON API that the
//! provider needs: TC3-HMAC-SHA256 request signing, the response
//! envelope, and typed request/response models for the CynosDB and
//! CWP services.
//!
//! Credentials come from `TENCENTCLOUD_SECRET_ID` / `TENCENTCLOUD_SECRET_KEY`
//! (plus optional `TENCENTCLOUD_SECURITY_TOKEN` and `TENCENTCLOUD_REGION`).

pub mod client;
pub mod credential;
pub mod cwp;
pub mod cynosdb;
pub mod error;
mod sign;

pub use client::TencentClient;
pub use credential::Credential;
pub use error::{Result, TencentError};
