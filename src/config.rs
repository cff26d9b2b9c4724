//! Feed engine configuration.
//!
//! Loaded once at startup from TOML (`FEED_CONFIG_PATH`, then
//! `config/feed.toml`, else built-in defaults). Weight validation happens
//! at load time: an invalid configuration is a fatal startup error, never
//! a per-request error.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use crate::retry::FetchPolicy;

const ENV_PATH: &str = "FEED_CONFIG_PATH";
const WEIGHT_SUM_EPSILON: f64 = 1e-3;

/// Blend fractions per category slot. Must sum to 1.0 ± epsilon.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct FeedWeights {
    pub current: f64,
    pub top_engaged: f64,
    pub random: f64,
}

impl Default for FeedWeights {
    fn default() -> Self {
        Self {
            current: 0.60,
            top_engaged: 0.25,
            random: 0.15,
        }
    }
}

impl FeedWeights {
    pub fn validate(&self) -> Result<()> {
        for (name, w) in [
            ("current", self.current),
            ("top_engaged", self.top_engaged),
            ("random", self.random),
        ] {
            if !(0.0..=1.0).contains(&w) {
                bail!("feed weight `{name}` = {w} is outside [0, 1]");
            }
        }
        let sum = self.current + self.top_engaged + self.random;
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            bail!("feed weights sum to {sum}, expected 1.0 ± {WEIGHT_SUM_EPSILON}");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub weights: FeedWeights,
    /// Default page size when a request does not name one.
    pub page_size: usize,
    /// Extra items requested beyond the page to absorb dedup/drop loss.
    pub overfetch_margin: usize,
    /// Cap on concurrently fetched random interests.
    pub random_fanout_cap: usize,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub per_category_timeout_secs: u64,
    /// Bound on the whole page assembly, so one stuck category cannot
    /// stall a page indefinitely.
    pub per_page_timeout_secs: u64,
    pub session_ttl_secs: u64,
    pub eviction_interval_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            weights: FeedWeights::default(),
            page_size: 20,
            overfetch_margin: 10,
            random_fanout_cap: 2,
            max_attempts: 3,
            backoff_base_ms: 1_000,
            per_category_timeout_secs: 30,
            per_page_timeout_secs: 45,
            session_ttl_secs: 1_800,
            eviction_interval_secs: 60,
        }
    }
}

impl FeedConfig {
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading feed config from {}", path.display()))?;
        let cfg: FeedConfig = toml::from_str(&content).context("parsing feed config toml")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Env var + fallbacks:
    /// 1) $FEED_CONFIG_PATH
    /// 2) config/feed.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("FEED_CONFIG_PATH points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        let toml_p = PathBuf::from("config/feed.toml");
        if toml_p.exists() {
            return Self::load_from(&toml_p);
        }
        let cfg = Self::default();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        if self.page_size == 0 {
            bail!("page_size must be positive");
        }
        if self.random_fanout_cap == 0 {
            bail!("random_fanout_cap must be positive");
        }
        if self.max_attempts == 0 {
            bail!("max_attempts must be positive");
        }
        Ok(())
    }

    pub fn fetch_policy(&self) -> FetchPolicy {
        FetchPolicy {
            max_attempts: self.max_attempts,
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            per_category_timeout: Duration::from_secs(self.per_category_timeout_secs),
        }
    }

    pub fn per_page_timeout(&self) -> Duration {
        Duration::from_secs(self.per_page_timeout_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        FeedConfig::default().validate().expect("defaults valid");
    }

    #[test]
    fn alternate_weight_variant_parses() {
        let toml = r#"
            [weights]
            current = 0.7
            top_engaged = 0.2
            random = 0.1
        "#;
        let cfg: FeedConfig = toml::from_str(toml).unwrap();
        cfg.validate().unwrap();
        assert!((cfg.weights.current - 0.7).abs() < f64::EPSILON);
        assert_eq!(cfg.page_size, 20); // untouched fields keep defaults
    }

    #[test]
    fn bad_weight_sum_is_fatal() {
        let toml = r#"
            [weights]
            current = 0.7
            top_engaged = 0.25
            random = 0.15
        "#;
        let cfg: FeedConfig = toml::from_str(toml).unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn negative_weight_is_fatal() {
        let w = FeedWeights {
            current: 1.2,
            top_engaged: -0.2,
            random: 0.0,
        };
        assert!(w.validate().is_err());
    }

    #[serial_test::serial]
    #[test]
    fn env_path_must_exist() {
        std::env::set_var(ENV_PATH, "/nonexistent/feed.toml");
        assert!(FeedConfig::load_default().is_err());
        std::env::remove_var(ENV_PATH);
    }
}
