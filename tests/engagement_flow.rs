// tests/engagement_flow.rs
//
// End-to-end adaptation loop: engagement observations recorded through the
// API shift the blend, so the most-engaged other interest gets its own
// category fetch on the next page.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{body::Body, http::Request, Router};
use serde_json::json;
use tower::ServiceExt as _;

use adaptive_feed_engine::api::{self, AppState};
use adaptive_feed_engine::blend::Blender;
use adaptive_feed_engine::config::FeedConfig;
use adaptive_feed_engine::error::FetchError;
use adaptive_feed_engine::ledger::EngagementLedger;
use adaptive_feed_engine::session::SessionStore;
use adaptive_feed_engine::source::catalog::QueryCatalog;
use adaptive_feed_engine::source::types::{ContentItem, ContentSource, Interest};

struct RecordingSource {
    queries: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ContentSource for RecordingSource {
    async fn fetch(&self, query: &str, count: usize) -> Result<Vec<ContentItem>, FetchError> {
        self.queries.lock().unwrap().push(query.to_string());
        let slug: String = query
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '-' })
            .collect();
        Ok((0..count)
            .map(|i| ContentItem {
                title: format!("{query} {i}"),
                url: format!("https://flow.test/{slug}/{i}"),
                source_domain: "flow.test".into(),
                excerpt: String::new(),
                image_url: None,
                interest: Interest::new(""),
            })
            .collect())
    }
    fn name(&self) -> &'static str {
        "recording"
    }
}

fn post(uri: &str, payload: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

#[tokio::test]
async fn engagement_history_steers_the_next_page() {
    let catalog = Arc::new(QueryCatalog::default_seed());
    let queries = Arc::new(Mutex::new(Vec::new()));
    let config = Arc::new(FeedConfig::default());
    let state = AppState {
        blender: Arc::new(Blender::new(
            Arc::new(RecordingSource {
                queries: queries.clone(),
            }),
            catalog.clone(),
            config.clone(),
        )),
        sessions: Arc::new(SessionStore::new()),
        ledger: Arc::new(EngagementLedger::with_capacity(100)),
        config,
    };
    let app: Router = api::router(state);

    // The user keeps opening design links.
    for i in 0..3 {
        let obs = json!({
            "userId": "u1",
            "linkUrl": format!("https://flow.test/design/{i}"),
            "timeSpentMs": 4000,
            "scrolled": true,
            "action": "open",
            "interestTag": "design"
        });
        let resp = app.clone().oneshot(post("/engagement", obs)).await.unwrap();
        assert!(resp.status().is_success());
    }

    // Next tech page should dedicate a category fetch to design.
    let resp = app
        .oneshot(post("/feed", json!({ "userId": "u1", "interest": "tech", "limit": 10 })))
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let design_q = catalog.primary_query(&Interest::new("design"));
    let queries = queries.lock().unwrap();
    assert!(
        queries.iter().any(|q| q == &design_q),
        "design should be the top-engaged category, fetched queries: {queries:?}"
    );
}

// Clients don't always send lowercase tags; "Design" must still land on
// the design ledger key and resolve the catalog's design query, never a
// fabricated fallback query.
#[tokio::test]
async fn mixed_case_engagement_tags_hit_the_catalog() {
    let catalog = Arc::new(QueryCatalog::default_seed());
    let queries = Arc::new(Mutex::new(Vec::new()));
    let config = Arc::new(FeedConfig::default());
    let state = AppState {
        blender: Arc::new(Blender::new(
            Arc::new(RecordingSource {
                queries: queries.clone(),
            }),
            catalog.clone(),
            config.clone(),
        )),
        sessions: Arc::new(SessionStore::new()),
        ledger: Arc::new(EngagementLedger::with_capacity(100)),
        config,
    };
    let app: Router = api::router(state);

    for i in 0..3 {
        let obs = json!({
            "userId": "u1",
            "linkUrl": format!("https://flow.test/design/{i}"),
            "timeSpentMs": 4000,
            "scrolled": true,
            "action": "open",
            "interestTag": "Design"
        });
        let resp = app.clone().oneshot(post("/engagement", obs)).await.unwrap();
        assert!(resp.status().is_success());
    }

    let resp = app
        .oneshot(post("/feed", json!({ "userId": "u1", "interest": "tech", "limit": 10 })))
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let design_q = catalog.primary_query(&Interest::new("design"));
    let queries = queries.lock().unwrap();
    assert!(
        queries.iter().any(|q| q == &design_q),
        "mixed-case tag should normalize to design, fetched queries: {queries:?}"
    );
}
