//! # Pagination Session
//! Per-(user, interest) cursor state that lets the blender be called
//! repeatedly to grow an infinite-scroll feed without re-delivering items,
//! plus the process-wide store that owns the sessions.
//!
//! Invariants:
//! - `seen_urls` never shrinks except on explicit reset.
//! - `offset` is monotonically non-decreasing within a session lifetime.
//! - A failed assembly never mutates a session; the page can be retried
//!   idempotently.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use metrics::gauge;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::source::types::Interest;

/// `Fresh` (no page served) → `Active` (has more) → `Exhausted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Fresh,
    Active,
    Exhausted,
}

#[derive(Debug)]
pub struct PaginationSession {
    seen_urls: HashSet<String>,
    offset: usize,
    phase: SessionPhase,
}

impl Default for PaginationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl PaginationSession {
    pub fn new() -> Self {
        Self {
            seen_urls: HashSet::new(),
            offset: 0,
            phase: SessionPhase::Fresh,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_exhausted(&self) -> bool {
        self.phase == SessionPhase::Exhausted
    }

    pub fn seen_count(&self) -> usize {
        self.seen_urls.len()
    }

    pub fn has_seen(&self, url: &str) -> bool {
        self.seen_urls.contains(url)
    }

    /// Back to `Fresh`: clears urls and offset. Interest change and manual
    /// refresh both land here.
    pub fn reset(&mut self) {
        self.seen_urls.clear();
        self.offset = 0;
        self.phase = SessionPhase::Fresh;
    }

    /// Commit one successfully served page. Called by the blender only
    /// after every fallible step is done.
    pub fn commit_page<'a, I>(&mut self, urls: I, has_more: bool)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut served = 0usize;
        for u in urls {
            self.seen_urls.insert(u.to_string());
            served += 1;
        }
        self.offset += served;
        self.phase = if has_more {
            SessionPhase::Active
        } else {
            SessionPhase::Exhausted
        };
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SessionKey {
    user_id: String,
    interest: Interest,
}

struct SessionEntry {
    session: Arc<tokio::sync::Mutex<PaginationSession>>,
    last_access: Instant,
}

/// Process-wide session map keyed by (user, interest). Hands out one
/// async mutex per session so concurrent feed calls for the same key are
/// serialized without a global lock. Idle sessions are evicted on a TTL.
pub struct SessionStore {
    inner: Mutex<HashMap<SessionKey, SessionEntry>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Get-or-create the session for a key, refreshing its access time.
    pub fn checkout(&self, user_id: &str, interest: &Interest) -> Arc<tokio::sync::Mutex<PaginationSession>> {
        let key = SessionKey {
            user_id: user_id.to_string(),
            interest: interest.clone(),
        };
        let mut map = self.inner.lock().expect("session store mutex poisoned");
        let entry = map.entry(key).or_insert_with(|| SessionEntry {
            session: Arc::new(tokio::sync::Mutex::new(PaginationSession::new())),
            last_access: Instant::now(),
        });
        entry.last_access = Instant::now();
        let handle = entry.session.clone();
        gauge!("feed_sessions_live").set(map.len() as f64);
        handle
    }

    /// Existing session for a key, without creating one.
    pub fn peek(&self, user_id: &str, interest: &Interest) -> Option<Arc<tokio::sync::Mutex<PaginationSession>>> {
        let key = SessionKey {
            user_id: user_id.to_string(),
            interest: interest.clone(),
        };
        let map = self.inner.lock().expect("session store mutex poisoned");
        map.get(&key).map(|e| e.session.clone())
    }

    /// Drop the session for a key. The next checkout starts `Fresh`, which
    /// is exactly the reset transition; an in-flight call keeps its own
    /// handle and finishes against the orphaned session.
    pub fn reset(&self, user_id: &str, interest: &Interest) -> bool {
        let key = SessionKey {
            user_id: user_id.to_string(),
            interest: interest.clone(),
        };
        let mut map = self.inner.lock().expect("session store mutex poisoned");
        let removed = map.remove(&key).is_some();
        gauge!("feed_sessions_live").set(map.len() as f64);
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("session store mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict sessions idle longer than `ttl`. Sessions with an in-flight
    /// handle (extra Arc holders) are kept regardless of age.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let mut map = self.inner.lock().expect("session store mutex poisoned");
        let before = map.len();
        map.retain(|_, e| {
            Arc::strong_count(&e.session) > 1 || e.last_access.elapsed() < ttl
        });
        let evicted = before - map.len();
        gauge!("feed_sessions_live").set(map.len() as f64);
        evicted
    }

    /// Background sweeper in the interval-task style used elsewhere in the
    /// service.
    pub fn spawn_eviction_task(self: &Arc<Self>, ttl: Duration, interval: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = store.evict_idle(ttl);
                if evicted > 0 {
                    tracing::info!(evicted, live = store.len(), "evicted idle feed sessions");
                }
            }
        })
    }
}
