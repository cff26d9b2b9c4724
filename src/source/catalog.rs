//! # Query Catalog
//!
//! Static mapping from interest categories to provider search queries.
//!
//! - Loads from TOML or JSON config (`queries` table).
//! - Keys are normalized lowercase interest tags.
//! - Includes a built-in `default_seed()` with common categories.
//! - The catalog's key set defines the universe of interests the blender
//!   can draw random categories from.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::source::types::Interest;

const ENV_PATH: &str = "FEED_CATALOG_PATH";

/// Interest → query-strings lookup table.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryCatalog {
    #[serde(default)]
    queries: BTreeMap<String, Vec<String>>,
}

impl QueryCatalog {
    /// Load from an explicit path. Supports TOML or JSON.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading query catalog from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let parsed: QueryCatalog = match ext.as_str() {
            "json" => serde_json::from_str(&content).context("parsing query catalog json")?,
            _ => toml::from_str(&content).context("parsing query catalog toml")?,
        };
        if parsed.queries.is_empty() {
            return Err(anyhow!("query catalog has no interests"));
        }
        Ok(parsed.normalized())
    }

    /// Load using env var + fallbacks:
    /// 1) $FEED_CATALOG_PATH
    /// 2) config/catalog.toml
    /// 3) built-in seed
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("FEED_CATALOG_PATH points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        let toml_p = PathBuf::from("config/catalog.toml");
        if toml_p.exists() {
            return Self::load_from(&toml_p);
        }
        Ok(Self::default_seed())
    }

    fn normalized(self) -> Self {
        let queries = self
            .queries
            .into_iter()
            .map(|(k, v)| (Interest::new(k).as_str().to_string(), v))
            .filter(|(_, v)| !v.is_empty())
            .collect();
        Self { queries }
    }

    /// Every interest the catalog knows. Order is stable (sorted by tag)
    /// so tests and the random pool are reproducible up to the shuffle.
    pub fn all_interests(&self) -> Vec<Interest> {
        self.queries.keys().map(Interest::new).collect()
    }

    pub fn contains(&self, interest: &Interest) -> bool {
        self.queries.contains_key(interest.as_str())
    }

    pub fn queries_for(&self, interest: &Interest) -> Option<&[String]> {
        self.queries.get(interest.as_str()).map(|v| v.as_slice())
    }

    /// The query the blender sends for an interest. First catalog entry for
    /// determinism; unknown interests fall back to the tag itself.
    pub fn primary_query(&self, interest: &Interest) -> String {
        self.queries_for(interest)
            .and_then(|qs| qs.first())
            .cloned()
            .unwrap_or_else(|| format!("latest {} articles", interest))
    }

    /// Built-in seed with common categories. Used when no config is found.
    pub fn default_seed() -> Self {
        let mut queries = BTreeMap::new();
        for (tag, qs) in [
            (
                "tech",
                vec![
                    "latest technology news and product launches",
                    "software engineering deep dives",
                ],
            ),
            (
                "design",
                vec![
                    "product design and UX case studies",
                    "graphic design inspiration articles",
                ],
            ),
            (
                "science",
                vec![
                    "recent scientific discoveries explained",
                    "space and physics news",
                ],
            ),
            (
                "business",
                vec![
                    "startup and business strategy articles",
                    "market and economy analysis",
                ],
            ),
            ("sports", vec!["sports news and match analysis"]),
            (
                "health",
                vec!["health and fitness evidence-based articles"],
            ),
            (
                "entertainment",
                vec!["film tv and music features"],
            ),
            ("travel", vec!["travel guides and destination stories"]),
        ] {
            queries.insert(
                tag.to_string(),
                qs.into_iter().map(String::from).collect(),
            );
        }
        Self { queries }
    }
}
