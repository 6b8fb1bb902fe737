//! Search requests and per-call options

use std::time::Duration;

use serde::{Deserialize, Serialize};
use chrono::Utc;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

/// A search request: target index expression plus request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Index expression (e.g. `logs-*`)
    pub index: String,
    /// Request body (query, aggs, size, ...)
    pub body: Value,
    /// `preference` request parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preference: Option<String>,
}

impl SearchRequest {
    pub fn new(index: impl Into<String>, body: Value) -> Self {
        Self {
            index: index.into(),
            body,
            preference: None,
        }
    }

    pub fn with_preference(mut self, preference: impl Into<String>) -> Self {
        self.preference = Some(preference.into());
        self
    }

    /// SHA-256 of the target, the preference and the canonical body
    ///
    /// Object keys serialize in sorted order, so equal bodies written with
    /// different key orders share a fingerprint. Callers that want to
    /// collapse identical in-flight requests key on this.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.index.as_bytes());
        hasher.update(b"\n");
        if let Some(preference) = &self.preference {
            hasher.update(preference.as_bytes());
            hasher.update(b"\n");
        }
        hasher.update(self.body.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Fresh session id for [`quarry_config::RequestPreference::SessionId`]
///
/// Derived from the process id and the current time; unique per process
/// start, not secret.
pub fn new_session_id() -> String {
    let mut hasher = Sha256::new();
    hasher.update(std::process::id().to_le_bytes());
    hasher.update(
        Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_default()
            .to_le_bytes(),
    );
    let digest = hex::encode(hasher.finalize());
    digest[..32].to_string()
}

/// Per-call options for [`crate::SearchCoordinator::search`]
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Overrides the coordinator's default timeout
    pub timeout: Option<Duration>,
    /// Cancelling this token aborts the request
    pub signal: Option<CancellationToken>,
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }
}
