//! Quarry Search - search request lifecycle
//!
//! Sends composed requests to a [`SearchBackend`] and governs each request
//! from creation to exactly one terminal state:
//! - **Cancellation**: a caller-supplied `CancellationToken` aborts the request
//! - **Timeouts**: a per-request deadline cancels the backend call
//! - **Inspector**: every request is recorded with its request and response
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//!
//! use quarry_config::SearchConfig;
//! use quarry_search::{ReplayBackend, SearchCoordinator, SearchOptions, SearchRequest};
//! use serde_json::json;
//!
//! let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
//! runtime.block_on(async {
//!     let backend = Arc::new(ReplayBackend::new(json!({"took": 1, "hits": {"total": {"value": 0}, "hits": []}})));
//!     let coordinator = SearchCoordinator::new(backend, &SearchConfig::default());
//!
//!     let request = SearchRequest::new("logs-*", json!({"size": 0}));
//!     let response = coordinator.search(request, SearchOptions::new()).run().await.unwrap();
//!
//!     assert_eq!(response["took"], 1);
//!     assert_eq!(coordinator.inspector().len(), 1);
//! });
//! ```

pub mod backend;
pub mod coordinator;
pub mod error;
pub mod inspector;
pub mod request;
pub mod response;
pub mod saved;
pub mod source;

// Re-exports
pub use backend::SearchBackend;
pub use backend::replay::ReplayBackend;
pub use coordinator::{PendingSearch, SearchCoordinator};
pub use error::{BackendErrorKind, Result, SearchError, TransportError};
pub use inspector::{
    Inspector, InspectorStat, RequestRecord, RequestStatus, get_request_inspector_stats,
    get_response_inspector_stats,
};
pub use request::{SearchOptions, SearchRequest, new_session_id};
pub use response::{
    backend_error_kind, error_message, is_complete_response, is_error_response,
    is_partial_response,
};
pub use saved::SavedSearchSource;
pub use source::{SearchResponse, SearchSource};
pub use tokio_util::sync::CancellationToken;
