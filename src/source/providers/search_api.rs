// src/source/providers/search_api.rs
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Deserialize;

use crate::error::FetchError;
use crate::source::types::{ContentItem, ContentSource, Interest};
use crate::source::{clean_text, domain_of, truncate_chars, EXCERPT_MAX_CHARS, TITLE_MAX_CHARS};

const ENV_ENDPOINT: &str = "SEARCH_API_URL";
const ENV_API_KEY: &str = "SEARCH_API_KEY";

/// Raw provider payload: `{"data": [ ... ]}` with loosely-shaped results.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResponse {
    data: Vec<RawResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawResult {
    title: Option<String>,
    url: Option<String>,
    description: Option<String>,
    markdown: Option<String>,
    metadata: Option<RawMetadata>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMetadata {
    #[serde(rename = "sourceURL")]
    source_url: Option<String>,
    title: Option<String>,
    description: Option<String>,
    image: Option<String>,
}

/// First non-empty markdown paragraph, used when the provider sends no
/// description at all.
fn first_markdown_paragraph(md: &str) -> Option<String> {
    md.split("\n\n")
        .map(str::trim)
        .find(|p| !p.is_empty() && !p.starts_with('#'))
        .map(|p| p.to_string())
}

impl RawResult {
    /// Normalize one raw result, or `None` when no url can be resolved
    /// (data-quality drop, not an error).
    fn normalize(self) -> Option<ContentItem> {
        let meta = self.metadata.unwrap_or_default();
        let url = self
            .url
            .or(meta.source_url)
            .filter(|u| !u.trim().is_empty())?;

        let title_raw = self
            .title
            .or(meta.title)
            .map(|t| clean_text(&t))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| domain_of(&url));

        let excerpt_raw = self
            .description
            .or(meta.description)
            .or_else(|| self.markdown.as_deref().and_then(first_markdown_paragraph))
            .map(|d| clean_text(&d))
            .unwrap_or_default();

        Some(ContentItem {
            title: truncate_chars(&title_raw, TITLE_MAX_CHARS),
            source_domain: domain_of(&url),
            excerpt: truncate_chars(&excerpt_raw, EXCERPT_MAX_CHARS),
            image_url: meta.image.filter(|i| !i.trim().is_empty()),
            // Assigned per category by the blender when it tags the batch.
            interest: Interest::new(""),
            url,
        })
    }
}

/// Parse a raw provider response body into normalized items, capped at
/// `limit`. Items without a resolvable url are dropped silently.
pub fn parse_search_payload(body: &str, limit: usize) -> Result<Vec<ContentItem>, FetchError> {
    let resp: SearchResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;
    let total = resp.data.len();
    let mut items: Vec<ContentItem> = resp
        .data
        .into_iter()
        .filter_map(RawResult::normalize)
        .collect();
    let dropped = total.saturating_sub(items.len());
    if dropped > 0 {
        counter!("feed_source_dropped_total").increment(dropped as u64);
    }
    items.truncate(limit);
    Ok(items)
}

/// HTTP adapter for the search/crawl API. One outbound call shape:
/// `POST {endpoint} {"query": ..., "limit": ...}`.
pub struct SearchApiSource {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl SearchApiSource {
    /// A failed client build (broken TLS backend) is a startup error, not
    /// something to paper over with a default client.
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .context("building search api http client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }

    /// Endpoint from `SEARCH_API_URL` (required), key from `SEARCH_API_KEY`.
    pub fn from_env() -> anyhow::Result<Self> {
        let endpoint = std::env::var(ENV_ENDPOINT)
            .map_err(|_| anyhow::anyhow!("{ENV_ENDPOINT} is not set"))?;
        let api_key = std::env::var(ENV_API_KEY).ok();
        Self::new(endpoint, api_key)
    }
}

#[async_trait]
impl ContentSource for SearchApiSource {
    async fn fetch(&self, query: &str, count: usize) -> Result<Vec<ContentItem>, FetchError> {
        let t0 = std::time::Instant::now();

        let mut req = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "query": query, "limit": count }));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = resp.text().await?;
        let items = parse_search_payload(&body, count)?;

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("feed_source_fetch_ms").record(ms);
        counter!("feed_source_items_total").increment(items.len() as u64);

        Ok(items)
    }

    fn name(&self) -> &'static str {
        "search-api"
    }
}
