//! Search request coordinator
//!
//! [`SearchCoordinator::search`] hands out a [`PendingSearch`]. Nothing is
//! sent until [`PendingSearch::run`] is awaited. The run races the backend
//! against the caller's signal and the timeout, and terminates exactly once.

use std::future::pending;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use quarry_config::SearchConfig;

use crate::backend::SearchBackend;
use crate::error::{BackendErrorKind, Result, SearchError, TransportError};
use crate::inspector::{Inspector, RequestRecord, RequestStatus};
use crate::request::{SearchOptions, SearchRequest};
use crate::response::{backend_error_kind, error_message, is_error_response, is_partial_response};

/// Dispatches searches to a backend and records them
pub struct SearchCoordinator {
    backend: Arc<dyn SearchBackend>,
    inspector: Arc<Inspector>,
    default_timeout: Option<Duration>,
    next_id: AtomicU64,
}

impl SearchCoordinator {
    /// Create a coordinator; a zero configured timeout means no timeout
    pub fn new(backend: Arc<dyn SearchBackend>, config: &SearchConfig) -> Self {
        let default_timeout = if config.timeout.is_zero() {
            None
        } else {
            Some(config.timeout)
        };
        Self {
            backend,
            inspector: Arc::new(Inspector::new(config.inspector_capacity)),
            default_timeout,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn inspector(&self) -> &Arc<Inspector> {
        &self.inspector
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Prepare a search; each call is an independent request
    pub fn search(&self, request: SearchRequest, options: SearchOptions) -> PendingSearch {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let timeout = options.timeout.or(self.default_timeout);
        let fingerprint = request.fingerprint();
        tracing::debug!(
            request_id = id,
            index = %request.index,
            fingerprint = %fingerprint,
            "created search request"
        );
        PendingSearch {
            id,
            fingerprint,
            request,
            timeout,
            signal: options.signal.unwrap_or_default(),
            backend: Arc::clone(&self.backend),
            inspector: Arc::clone(&self.inspector),
            status: RequestStatus::Created,
            start: Utc::now(),
            response: None,
            error: None,
        }
    }
}

enum Outcome {
    Aborted,
    TimedOut,
    Finished(std::result::Result<Value, TransportError>),
}

/// One outstanding search request
///
/// Dropping it before it terminates records it as aborted; dropping a
/// running [`PendingSearch::run`] future also cancels the backend call.
pub struct PendingSearch {
    id: u64,
    fingerprint: String,
    request: SearchRequest,
    timeout: Option<Duration>,
    signal: CancellationToken,
    backend: Arc<dyn SearchBackend>,
    inspector: Arc<Inspector>,
    status: RequestStatus,
    start: DateTime<Utc>,
    response: Option<Value>,
    error: Option<String>,
}

impl PendingSearch {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn request(&self) -> &SearchRequest {
        &self.request
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    /// Dispatch and wait for the outcome
    pub async fn run(mut self) -> Result<Value> {
        if self.signal.is_cancelled() {
            tracing::debug!(request_id = self.id, "signal fired before dispatch");
            self.finish(RequestStatus::Aborted);
            return Err(SearchError::Aborted { request_id: self.id });
        }

        self.start = Utc::now();
        self.transition(RequestStatus::Dispatched);
        tracing::debug!(
            request_id = self.id,
            backend = self.backend.name(),
            timeout_ms = self.timeout.map(|t| t.as_millis() as u64),
            "dispatching search"
        );

        let backend_token = self.signal.child_token();
        let guard = backend_token.clone().drop_guard();
        let outcome = tokio::select! {
            biased;
            _ = self.signal.cancelled() => Outcome::Aborted,
            _ = expire(self.timeout) => Outcome::TimedOut,
            result = self.backend.search(&self.request, backend_token.clone()) => Outcome::Finished(result),
        };
        guard.disarm();

        match outcome {
            Outcome::Aborted => {
                self.finish(RequestStatus::Aborted);
                Err(SearchError::Aborted { request_id: self.id })
            }
            Outcome::TimedOut => {
                backend_token.cancel();
                let timeout_ms = self.timeout.map(|t| t.as_millis() as u64).unwrap_or_default();
                tracing::warn!(request_id = self.id, timeout_ms, "search timed out");
                self.finish(RequestStatus::TimedOut);
                Err(SearchError::Timeout {
                    request_id: self.id,
                    timeout_ms,
                })
            }
            Outcome::Finished(Err(err)) => {
                self.error = Some(err.to_string());
                self.finish(RequestStatus::Failed);
                Err(SearchError::Backend {
                    request_id: self.id,
                    kind: BackendErrorKind::General,
                    message: err.message,
                })
            }
            Outcome::Finished(Ok(body)) if is_error_response(&body) => {
                let kind = backend_error_kind(&body);
                let message = error_message(&body);
                self.error = Some(message.clone());
                self.response = Some(body);
                self.finish(RequestStatus::Failed);
                Err(SearchError::Backend {
                    request_id: self.id,
                    kind,
                    message,
                })
            }
            Outcome::Finished(Ok(body)) => {
                if is_partial_response(&body) {
                    tracing::warn!(
                        request_id = self.id,
                        kind = %backend_error_kind(&body),
                        "search returned a partial response"
                    );
                }
                self.response = Some(body.clone());
                self.finish(RequestStatus::Completed);
                Ok(body)
            }
        }
    }

    fn transition(&mut self, next: RequestStatus) -> bool {
        if !self.status.can_transition_to(next) {
            tracing::warn!(
                request_id = self.id,
                from = self.status.as_str(),
                to = next.as_str(),
                "ignored invalid request transition"
            );
            return false;
        }
        tracing::trace!(
            request_id = self.id,
            from = self.status.as_str(),
            to = next.as_str(),
            "request transition"
        );
        self.status = next;
        true
    }

    /// Move to a terminal state and record the request
    fn finish(&mut self, status: RequestStatus) {
        if !self.transition(status) {
            return;
        }
        let end = Utc::now();
        tracing::debug!(
            request_id = self.id,
            status = status.as_str(),
            duration_ms = (end - self.start).num_milliseconds(),
            "search finished"
        );
        self.inspector.record(RequestRecord {
            id: self.id,
            fingerprint: self.fingerprint.clone(),
            index: self.request.index.clone(),
            status,
            start: self.start,
            end,
            request: self.request.body.clone(),
            preference: self.request.preference.clone(),
            response: self.response.take(),
            error: self.error.take(),
        });
    }
}

impl Drop for PendingSearch {
    fn drop(&mut self) {
        if !self.status.is_terminal() {
            if self.status == RequestStatus::Created {
                tracing::debug!(request_id = self.id, "search dropped before dispatch");
            } else {
                tracing::debug!(request_id = self.id, "search dropped while running");
            }
            self.finish(RequestStatus::Aborted);
        }
    }
}

async fn expire(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => pending::<()>().await,
    }
}
