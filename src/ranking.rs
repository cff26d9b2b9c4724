//! # Interest Ranker
//! Picks the single most-engaged interest other than the user's current
//! selection. Pure, no I/O.
//!
//! The ranker sorts by `average_score` descending itself instead of relying
//! on caller-supplied ordering; pre-sorted callers see identical results
//! because the sort is stable.

use serde::{Deserialize, Serialize};

use crate::source::types::Interest;

/// Per-interest engagement aggregate, read from the engagement history
/// boundary (or the in-process ledger).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterestEngagementSummary {
    #[serde(rename = "interestTag")]
    pub interest: Interest,
    pub average_score: f32,
    pub sample_count: usize,
}

/// Return the best-engaged interest excluding `exclude`, or `None` when no
/// entry qualifies (new user, or nothing with a positive average).
pub fn top_engaged(
    history: &[InterestEngagementSummary],
    exclude: &Interest,
) -> Option<Interest> {
    let mut candidates: Vec<&InterestEngagementSummary> = history
        .iter()
        .filter(|s| &s.interest != exclude && s.average_score > 0.0)
        .collect();
    candidates.sort_by(|a, b| {
        b.average_score
            .partial_cmp(&a.average_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.first().map(|s| s.interest.clone())
}
