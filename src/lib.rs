// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod blend;
pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod ranking;
pub mod retry;
pub mod scoring;
pub mod session;
pub mod source;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::blend::{Blender, FeedPage};
pub use crate::config::{FeedConfig, FeedWeights};
pub use crate::error::{FeedError, FetchError};
pub use crate::ledger::{EngagementHistory, EngagementLedger};
pub use crate::ranking::InterestEngagementSummary;
pub use crate::scoring::{score, EngagementAction, EngagementObservation};
pub use crate::session::{PaginationSession, SessionPhase, SessionStore};
pub use crate::source::types::{ContentItem, ContentSource, Interest};
