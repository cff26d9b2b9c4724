use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::blend::Blender;
use crate::config::FeedConfig;
use crate::error::FeedError;
use crate::ledger::{EngagementHistory, EngagementLedger};
use crate::scoring::{self, EngagementObservation};
use crate::session::{SessionPhase, SessionStore};
use crate::source::types::{ContentItem, Interest};

#[derive(Clone)]
pub struct AppState {
    pub blender: Arc<Blender>,
    pub sessions: Arc<SessionStore>,
    pub ledger: Arc<EngagementLedger>,
    pub config: Arc<FeedConfig>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/feed", post(feed))
        .route("/feed/reset", post(feed_reset))
        .route("/engagement", post(engagement))
        .route("/debug/session", get(debug_session))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedReq {
    user_id: String,
    interest: String,
    #[serde(default)]
    offset: Option<usize>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct FeedResp {
    data: Vec<ContentItem>,
    has_more: bool,
}

/// One feed page. The server-held session is authoritative for the cursor;
/// an explicit `offset: 0` on an already-active session is treated as a
/// manual refresh and resets the session first.
async fn feed(
    State(state): State<AppState>,
    Json(req): Json<FeedReq>,
) -> Result<Json<FeedResp>, FeedError> {
    let interest = Interest::new(&req.interest);
    let page_size = req.limit.unwrap_or(state.config.page_size).clamp(1, 100);

    let session_handle = state.sessions.checkout(&req.user_id, &interest);
    let mut session = session_handle.lock().await;
    if req.offset == Some(0) && session.phase() != SessionPhase::Fresh {
        session.reset();
    }

    let history = state.ledger.top_engaged_interests(&req.user_id, 10);
    let cancel = CancellationToken::new();

    let assemble = state.blender.assemble_feed(
        &mut session,
        &req.user_id,
        &interest,
        &history,
        page_size,
        &cancel,
    );
    // One stuck category is already bounded per-category; this bounds the
    // page as a whole.
    let page = match tokio::time::timeout(state.config.per_page_timeout(), assemble).await {
        Ok(res) => res?,
        Err(_) => {
            cancel.cancel();
            return Err(FeedError::Unavailable);
        }
    };

    Ok(Json(FeedResp {
        data: page.items,
        has_more: page.has_more,
    }))
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResetReq {
    user_id: String,
    interest: String,
}

#[derive(serde::Serialize)]
struct ResetResp {
    reset: bool,
}

async fn feed_reset(State(state): State<AppState>, Json(req): Json<ResetReq>) -> Json<ResetResp> {
    let reset = state.sessions.reset(&req.user_id, &Interest::new(&req.interest));
    Json(ResetResp { reset })
}

#[derive(serde::Serialize)]
struct ScoreResp {
    score: i32,
}

/// Score one observation and fold it into the in-process engagement
/// ledger. Durable recording lives behind the external history boundary.
async fn engagement(
    State(state): State<AppState>,
    Json(obs): Json<EngagementObservation>,
) -> Json<ScoreResp> {
    let score = scoring::score(&obs);
    state.ledger.record(&obs, score);
    Json(ScoreResp { score })
}

#[derive(serde::Serialize)]
struct SessionInfo {
    phase: SessionPhase,
    offset: usize,
    seen: usize,
}

async fn debug_session(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Json<Option<SessionInfo>> {
    let user_id = q.get("user_id").cloned().unwrap_or_default();
    let interest = Interest::new(q.get("interest").cloned().unwrap_or_default());
    let Some(handle) = state.sessions.peek(&user_id, &interest) else {
        return Json(None);
    };
    let session = handle.lock().await;
    Json(Some(SessionInfo {
        phase: session.phase(),
        offset: session.offset(),
        seen: session.seen_count(),
    }))
}
