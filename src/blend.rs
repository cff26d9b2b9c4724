//! # Weighted Blender
//! The orchestrator: computes category quotas from configured weights,
//! issues concurrent resilient fetches per category, then merges,
//! deduplicates, shuffles, and slices the result into one feed page.
//!
//! A failed category degrades to an empty result; the page only fails as a
//! whole when every category fails *and* the single-category fallback
//! fails too.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use rand::seq::SliceRandom;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{FeedConfig, FeedWeights};
use crate::error::FeedError;
use crate::ranking::{self, InterestEngagementSummary};
use crate::retry;
use crate::session::PaginationSession;
use crate::source::catalog::QueryCatalog;
use crate::source::types::{ContentItem, ContentSource, Interest};

/// One assembled page. `has_more` is a best-effort signal: "fewer items
/// than requested" can be a false exhaustion under upstream rate limiting,
/// so treat it as a hint, not a guarantee.
#[derive(Debug, Clone)]
pub struct FeedPage {
    pub items: Vec<ContentItem>,
    pub has_more: bool,
}

/// Item counts per category slot for one assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryQuotas {
    pub current: usize,
    pub top_engaged: usize,
    pub random: usize,
}

/// Quota per slot is `round(fetch_total * weight)`. A missing top-engaged
/// interest folds its quota into the current interest instead of
/// discarding it.
pub fn compute_quotas(
    fetch_total: usize,
    weights: &FeedWeights,
    has_top_engaged: bool,
) -> CategoryQuotas {
    let t = fetch_total as f64;
    let mut current = (t * weights.current).round() as usize;
    let top_engaged = (t * weights.top_engaged).round() as usize;
    let random = (t * weights.random).round() as usize;
    if !has_top_engaged {
        current += top_engaged;
        return CategoryQuotas {
            current,
            top_engaged: 0,
            random,
        };
    }
    CategoryQuotas {
        current,
        top_engaged,
        random,
    }
}

pub struct Blender {
    source: Arc<dyn ContentSource>,
    catalog: Arc<QueryCatalog>,
    config: Arc<FeedConfig>,
}

impl Blender {
    pub fn new(
        source: Arc<dyn ContentSource>,
        catalog: Arc<QueryCatalog>,
        config: Arc<FeedConfig>,
    ) -> Self {
        crate::metrics::ensure_feed_metrics_described();
        Self {
            source,
            catalog,
            config,
        }
    }

    /// Assemble one page for `(user, current interest)`.
    ///
    /// The caller must hold the session exclusively for the duration of the
    /// call; on any error the session is left untouched so the same page
    /// can be retried idempotently.
    pub async fn assemble_feed(
        &self,
        session: &mut PaginationSession,
        user_id: &str,
        current: &Interest,
        history: &[InterestEngagementSummary],
        page_size: usize,
        cancel: &CancellationToken,
    ) -> Result<FeedPage, FeedError> {
        let t0 = Instant::now();
        let cfg = &self.config;

        // Overfetch past the page so dedup/drop loss still fills the slice.
        let fetch_total = page_size + session.offset() + cfg.overfetch_margin;

        let top = ranking::top_engaged(history, current);
        let quotas = compute_quotas(fetch_total, &cfg.weights, top.is_some());

        let mut pool: Vec<Interest> = self
            .catalog
            .all_interests()
            .into_iter()
            .filter(|i| i != current && top.as_ref() != Some(i))
            .collect();
        pool.shuffle(&mut rand::rng());
        pool.truncate(cfg.random_fanout_cap);

        // Fetch plan: current, top-engaged if present, up to the fan-out
        // cap of random interests with the random quota split evenly
        // (ceiling) across them. At most 4 concurrent outbound calls.
        let mut plan: Vec<(Interest, usize)> = Vec::with_capacity(2 + pool.len());
        plan.push((current.clone(), quotas.current));
        if let Some(t) = &top {
            plan.push((t.clone(), quotas.top_engaged));
        }
        if quotas.random > 0 && !pool.is_empty() {
            let per_random = quotas.random.div_ceil(pool.len());
            for r in &pool {
                plan.push((r.clone(), per_random));
            }
        }
        plan.retain(|(_, quota)| *quota > 0);

        let policy = cfg.fetch_policy();
        let fetches = plan.iter().map(|(interest, quota)| {
            let child = cancel.child_token();
            let query = self.catalog.primary_query(interest);
            let quota = *quota;
            async move {
                let res =
                    retry::fetch_with_retry(self.source.as_ref(), &query, quota, policy, &child)
                        .await;
                (interest, quota, res)
            }
        });
        let results = futures::future::join_all(fetches).await;

        if cancel.is_cancelled() {
            return Err(FeedError::Cancelled);
        }

        let mut tagged: Vec<ContentItem> = Vec::new();
        let mut any_full_quota = false;
        let mut all_failed = true;
        for (interest, quota, res) in results {
            match res {
                Ok(items) => {
                    all_failed = false;
                    if items.len() >= quota {
                        any_full_quota = true;
                    }
                    for mut it in items {
                        it.interest = interest.clone();
                        tagged.push(it);
                    }
                }
                Err(FeedError::Cancelled) => return Err(FeedError::Cancelled),
                Err(e) => {
                    counter!("feed_category_failures_total").increment(1);
                    warn!(interest = %interest, error = %e, "category fetch degraded to empty");
                }
            }
        }

        if all_failed {
            tagged = self.fallback_fetch(current, page_size, cancel).await?;
            any_full_quota = tagged.len() >= page_size + cfg.overfetch_margin;
        }

        // Dedup by url against the batch itself and everything this
        // session already served.
        let mut in_batch: HashSet<String> = HashSet::new();
        let mut batch: Vec<ContentItem> = Vec::with_capacity(tagged.len());
        let mut dup_dropped = 0u64;
        for it in tagged {
            if session.has_seen(&it.url) || !in_batch.insert(it.url.clone()) {
                dup_dropped += 1;
                continue;
            }
            batch.push(it);
        }
        if dup_dropped > 0 {
            counter!("feed_duplicates_dropped_total").increment(dup_dropped);
        }

        // Order-erasing shuffle so category results don't clump.
        batch.shuffle(&mut rand::rng());

        let start = session.offset().min(batch.len());
        let end = (start + page_size).min(batch.len());
        let page: Vec<ContentItem> = batch[start..end].to_vec();

        let fully_consumed = end >= batch.len();
        let has_more = !fully_consumed || any_full_quota;

        session.commit_page(page.iter().map(|i| i.url.as_str()), has_more);

        counter!("feed_pages_total").increment(1);
        histogram!("feed_assemble_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        info!(
            user_id,
            interest = %current,
            served = page.len(),
            batch = batch.len(),
            has_more,
            "assembled feed page"
        );

        Ok(FeedPage {
            items: page,
            has_more,
        })
    }

    /// Last resort after every category failed: one more attempt against
    /// the current interest alone. Failing that, the page is unavailable —
    /// a user-visible, retryable error, never a silent empty feed.
    async fn fallback_fetch(
        &self,
        current: &Interest,
        page_size: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<ContentItem>, FeedError> {
        counter!("feed_fallback_total").increment(1);
        warn!(interest = %current, "all categories failed; trying single-category fallback");

        let count = page_size + self.config.overfetch_margin;
        let query = self.catalog.primary_query(current);
        match retry::fetch_with_retry(
            self.source.as_ref(),
            &query,
            count,
            self.config.fetch_policy(),
            cancel,
        )
        .await
        {
            Ok(mut items) => {
                for it in &mut items {
                    it.interest = current.clone();
                }
                Ok(items)
            }
            Err(FeedError::Cancelled) => Err(FeedError::Cancelled),
            Err(e) => {
                warn!(interest = %current, error = %e, "fallback fetch failed");
                Err(FeedError::Unavailable)
            }
        }
    }
}
