//! Search backend trait and implementations

pub mod replay;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;
use crate::request::SearchRequest;

/// Search backend trait
///
/// Error responses (an `error` body, failed shards) come back as `Ok` and
/// are classified by the coordinator. `Err` is for transport failures.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Run a search; stop early once `cancel` fires
    async fn search(
        &self,
        request: &SearchRequest,
        cancel: CancellationToken,
    ) -> Result<Value, TransportError>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}
