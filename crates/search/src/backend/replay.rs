//! Replay backend
//!
//! Answers every search with a canned response, optionally after a delay.
//! Used by tests and by the CLI to run recorded responses through the
//! request lifecycle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::SearchBackend;
use crate::error::TransportError;
use crate::request::SearchRequest;

/// Backend returning canned responses
#[derive(Debug, Default)]
pub struct ReplayBackend {
    default: Option<Value>,
    by_index: HashMap<String, Value>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    tokens: Mutex<Vec<CancellationToken>>,
}

impl ReplayBackend {
    /// Answer every request with `response`
    pub fn new(response: Value) -> Self {
        Self {
            default: Some(response),
            ..Self::default()
        }
    }

    /// Answer requests to `index` with `response`
    pub fn with_index_response(mut self, index: impl Into<String>, response: Value) -> Self {
        self.by_index.insert(index.into(), response);
        self
    }

    /// Wait this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of searches started
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    /// Cancellation tokens received, in call order
    pub fn tokens(&self) -> Vec<CancellationToken> {
        self.tokens.lock().clone()
    }
}

#[async_trait]
impl SearchBackend for ReplayBackend {
    async fn search(
        &self,
        request: &SearchRequest,
        cancel: CancellationToken,
    ) -> Result<Value, TransportError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.tokens.lock().push(cancel.clone());

        if let Some(delay) = self.delay {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TransportError::new("cancelled")),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.by_index
            .get(&request.index)
            .or(self.default.as_ref())
            .cloned()
            .ok_or_else(|| {
                TransportError::new(format!("no recorded response for index '{}'", request.index))
            })
    }

    fn name(&self) -> &'static str {
        "replay"
    }
}
