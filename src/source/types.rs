// src/source/types.rs
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// A user-selectable content category (e.g. "tech", "design").
/// Normalized to lowercase so map keys and wire values always agree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Interest(String);

impl Interest {
    pub fn new<S: AsRef<str>>(s: S) -> Self {
        Self(s.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Deserialization must normalize too; a derived impl would admit
// un-normalized wire values ("Design") that miss catalog and ledger keys.
impl<'de> Deserialize<'de> for Interest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Interest::new)
    }
}

impl fmt::Display for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One normalized content link. `url` is the identity key for dedup within
/// and across pages of the same session. Immutable once produced, except
/// that the blender assigns `interest` when it tags a category's batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub title: String,
    pub url: String,
    pub source_domain: String,
    pub excerpt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(rename = "interestTag")]
    pub interest: Interest,
}

/// Abstraction over the external search/crawl provider. One single-shot
/// call per invocation; retry belongs to the resilient fetch layer.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch(&self, query: &str, count: usize) -> Result<Vec<ContentItem>, FetchError>;
    fn name(&self) -> &'static str;
}
