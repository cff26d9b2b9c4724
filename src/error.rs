//! Error taxonomy for the feed engine.
//!
//! Two layers: `FetchError` is what a single adapter call can produce,
//! `FeedError` is what the assembly pipeline reports to callers. A failed
//! category is recovered inside the blender and never surfaces on its own;
//! only `FeedError::Unavailable` (and cancellation) reach the HTTP layer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use metrics::counter;

/// A single upstream call failing. No retry semantics at this level.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("http transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider returned status {0}")]
    Status(u16),
    #[error("malformed provider payload: {0}")]
    Decode(String),
    #[error("{0}")]
    Other(String),
}

/// Pipeline-level outcome. `Cancelled` is deliberately distinct from
/// `Fetch` so callers can tell "caller gave up" from "upstream gave up".
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("category fetch failed after {attempts} attempts: {source}")]
    Fetch {
        attempts: u32,
        #[source]
        source: FetchError,
    },
    #[error("feed request cancelled")]
    Cancelled,
    #[error("feed unavailable: every category fetch failed")]
    Unavailable,
}

impl FeedError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FeedError::Cancelled)
    }
}

#[derive(serde::Serialize)]
struct ErrorBody {
    error: &'static str,
    retryable: bool,
    message: String,
}

impl IntoResponse for FeedError {
    fn into_response(self) -> Response {
        let (status, error, retryable) = match &self {
            // User-visible and retryable; must stay distinguishable from an
            // empty-but-successful page (which is a plain 200).
            FeedError::Unavailable => {
                counter!("feed_unavailable_total").increment(1);
                (StatusCode::SERVICE_UNAVAILABLE, "feed_unavailable", true)
            }
            FeedError::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, "cancelled", true),
            // A bare category failure should not escape the blender; if it
            // does, report it as a gateway-style error.
            FeedError::Fetch { .. } => (StatusCode::BAD_GATEWAY, "fetch_failed", true),
        };
        let body = ErrorBody {
            error,
            retryable,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
