//! # Resilient Fetcher
//! Wraps a single-shot [`ContentSource`] call with bounded retry,
//! exponential backoff, a per-category timeout, and cooperative
//! cancellation.
//!
//! Cancellation is checked before each attempt and during the backoff
//! sleep — never preemptively mid-call — and surfaces as the distinct
//! [`FeedError::Cancelled`] so callers can tell it apart from exhausted
//! retries.

use std::time::Duration;

use metrics::counter;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{FeedError, FetchError};
use crate::source::types::{ContentItem, ContentSource};

/// Retry/timeout knobs for one category fetch.
#[derive(Debug, Clone, Copy)]
pub struct FetchPolicy {
    /// Attempts including the first one.
    pub max_attempts: u32,
    /// Backoff before retry `k` is `backoff_base * 2^(k-1)`.
    pub backoff_base: Duration,
    /// Budget for the whole attempt loop, backoff included.
    pub per_category_timeout: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
            per_category_timeout: Duration::from_secs(30),
        }
    }
}

/// Fetch with retry. Binary outcome per category: either the full item
/// list of one successful attempt, or the last error after exhausting
/// attempts (or `Cancelled` / timeout).
pub async fn fetch_with_retry(
    source: &dyn ContentSource,
    query: &str,
    count: usize,
    policy: FetchPolicy,
    cancel: &CancellationToken,
) -> Result<Vec<ContentItem>, FeedError> {
    let attempts = policy.max_attempts.max(1);

    let attempt_loop = async {
        let mut last_err: Option<FetchError> = None;

        for attempt in 0..attempts {
            if cancel.is_cancelled() {
                return Err(FeedError::Cancelled);
            }
            if attempt > 0 {
                let delay = policy.backoff_base * 2u32.saturating_pow(attempt - 1);
                tokio::select! {
                    _ = cancel.cancelled() => return Err(FeedError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            match source.fetch(query, count).await {
                Ok(items) => return Ok(items),
                Err(e) => {
                    warn!(
                        provider = source.name(),
                        query,
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        error = %e,
                        "category fetch attempt failed"
                    );
                    counter!("feed_fetch_retries_total").increment(1);
                    last_err = Some(e);
                }
            }
        }

        Err(FeedError::Fetch {
            attempts,
            source: last_err.unwrap_or_else(|| FetchError::Other("no attempts made".into())),
        })
    };

    match tokio::time::timeout(policy.per_category_timeout, attempt_loop).await {
        Ok(res) => res,
        Err(_) => Err(FeedError::Fetch {
            attempts,
            source: FetchError::Other(format!(
                "per-category timeout of {:?} elapsed",
                policy.per_category_timeout
            )),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use crate::source::types::Interest;

    struct FlakySource {
        calls: Arc<AtomicU32>,
        fail_first: u32,
    }

    #[async_trait]
    impl ContentSource for FlakySource {
        async fn fetch(&self, _query: &str, _count: usize) -> Result<Vec<ContentItem>, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err(FetchError::Status(503))
            } else {
                Ok(vec![ContentItem {
                    title: "t".into(),
                    url: format!("https://x.test/{n}"),
                    source_domain: "x.test".into(),
                    excerpt: String::new(),
                    image_url: None,
                    interest: Interest::new("tech"),
                }])
            }
        }
        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    fn fast_policy() -> FetchPolicy {
        FetchPolicy {
            max_attempts: 3,
            backoff_base: Duration::from_millis(10),
            per_category_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn success_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let src = FlakySource {
            calls: calls.clone(),
            fail_first: 2,
        };
        let token = CancellationToken::new();
        let out = fetch_with_retry(&src, "q", 5, fast_policy(), &token).await;
        assert!(out.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_surface_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let src = FlakySource {
            calls: calls.clone(),
            fail_first: u32::MAX,
        };
        let token = CancellationToken::new();
        let out = fetch_with_retry(&src, "q", 5, fast_policy(), &token).await;
        match out {
            Err(FeedError::Fetch { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected Fetch error, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn pre_cancelled_token_skips_all_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let src = FlakySource {
            calls: calls.clone(),
            fail_first: u32::MAX,
        };
        let token = CancellationToken::new();
        token.cancel();
        let out = fetch_with_retry(&src, "q", 5, fast_policy(), &token).await;
        assert!(matches!(out, Err(FeedError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn per_category_timeout_is_a_fetch_error() {
        struct StuckSource;
        #[async_trait]
        impl ContentSource for StuckSource {
            async fn fetch(
                &self,
                _query: &str,
                _count: usize,
            ) -> Result<Vec<ContentItem>, FetchError> {
                tokio::time::sleep(Duration::from_secs(120)).await;
                Ok(vec![])
            }
            fn name(&self) -> &'static str {
                "stuck"
            }
        }
        let token = CancellationToken::new();
        let policy = FetchPolicy {
            per_category_timeout: Duration::from_secs(30),
            ..FetchPolicy::default()
        };
        let out = fetch_with_retry(&StuckSource, "q", 5, policy, &token).await;
        assert!(matches!(out, Err(FeedError::Fetch { .. })));
    }
}
