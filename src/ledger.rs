//! ledger.rs — in-memory engagement aggregation behind the same trait the
//! external history store implements. Running average + sample count per
//! (user, interest); durable recording lives outside this crate.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::ranking::InterestEngagementSummary;
use crate::scoring::EngagementObservation;
use crate::source::types::Interest;

/// Read-only view of per-user engagement history, pre-sorted descending by
/// average score. Implemented here by [`EngagementLedger`]; a production
/// deployment can substitute a client for the real persistence layer.
pub trait EngagementHistory: Send + Sync {
    fn top_engaged_interests(&self, user_id: &str, limit: usize) -> Vec<InterestEngagementSummary>;
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    total: i64,
    count: usize,
}

/// Thread-safe bounded aggregate of engagement scores.
#[derive(Debug)]
pub struct EngagementLedger {
    inner: Mutex<HashMap<(String, Interest), Tally>>,
    cap: usize,
}

impl EngagementLedger {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            cap: cap.min(100_000),
        }
    }

    /// Fold one scored observation into the (user, interest) tally.
    /// New keys past the capacity bound are dropped with a warning.
    pub fn record(&self, obs: &EngagementObservation, score: i32) {
        let key = (obs.user_id.clone(), obs.interest.clone());
        let mut map = self.inner.lock().expect("ledger mutex poisoned");
        if map.len() >= self.cap && !map.contains_key(&key) {
            tracing::warn!(user_id = %obs.user_id, "engagement ledger at capacity; observation dropped");
            return;
        }
        let t = map.entry(key).or_default();
        t.total += score as i64;
        t.count += 1;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("ledger mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EngagementHistory for EngagementLedger {
    fn top_engaged_interests(&self, user_id: &str, limit: usize) -> Vec<InterestEngagementSummary> {
        let map = self.inner.lock().expect("ledger mutex poisoned");
        let mut out: Vec<InterestEngagementSummary> = map
            .iter()
            .filter(|((uid, _), t)| uid == user_id && t.count > 0)
            .map(|((_, interest), t)| InterestEngagementSummary {
                interest: interest.clone(),
                average_score: t.total as f32 / t.count as f32,
                sample_count: t.count,
            })
            .collect();
        out.sort_by(|a, b| {
            b.average_score
                .partial_cmp(&a.average_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        out.truncate(limit);
        out
    }
}
