//! # Engagement Scorer
//! Pure mapping from one interaction observation to a bounded score.
//! Total function, no I/O, no failure mode — any client can reproduce the
//! numbers bit-for-bit for test-vector comparison.

use serde::{Deserialize, Serialize};

use crate::source::types::Interest;

/// Dwell time above which an item counts as "read".
const DWELL_THRESHOLD_MS: u64 = 2000;

/// What the user did with a content item, if anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngagementAction {
    #[default]
    None,
    Open,
    Save,
    NotInterested,
}

/// One raw interaction observation, produced by the UI layer each time an
/// item leaves the viewport or the user acts on it. Write-once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementObservation {
    pub user_id: String,
    pub link_url: String,
    #[serde(default)]
    pub time_spent_ms: u64,
    #[serde(default)]
    pub scrolled: bool,
    #[serde(default)]
    pub action: EngagementAction,
    #[serde(rename = "interestTag")]
    pub interest: Interest,
    #[serde(default, rename = "timestamp")]
    pub ts_unix: Option<u64>,
}

/// Score an observation into `[0, 100]`.
///
/// Start at 0; +50 for dwell time over 2s; +10 for a scroll; +30 open,
/// +20 save, -20 not-interested; clamp. Keep this exact — clients replay
/// the same formula.
pub fn score(obs: &EngagementObservation) -> i32 {
    let mut s = 0i32;
    if obs.time_spent_ms > DWELL_THRESHOLD_MS {
        s += 50;
    }
    if obs.scrolled {
        s += 10;
    }
    s += match obs.action {
        EngagementAction::None => 0,
        EngagementAction::Open => 30,
        EngagementAction::Save => 20,
        EngagementAction::NotInterested => -20,
    };
    s.clamp(0, 100)
}
