use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time registration of the feed series so they show up on /metrics
/// before first use.
pub fn ensure_feed_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("feed_pages_total", "Feed pages successfully assembled.");
        describe_counter!(
            "feed_category_failures_total",
            "Category fetches degraded to empty after exhausting retries."
        );
        describe_counter!(
            "feed_fetch_retries_total",
            "Individual fetch attempts that failed."
        );
        describe_counter!(
            "feed_fallback_total",
            "Single-category fallback attempts after all categories failed."
        );
        describe_counter!(
            "feed_unavailable_total",
            "Pages that failed terminally (fallback failed too)."
        );
        describe_counter!(
            "feed_duplicates_dropped_total",
            "Items dropped by url dedup against the batch and session."
        );
        describe_counter!(
            "feed_source_items_total",
            "Normalized items returned by the content source."
        );
        describe_counter!(
            "feed_source_dropped_total",
            "Provider results dropped for missing a resolvable url."
        );
        describe_histogram!("feed_assemble_ms", "Page assembly wall time in milliseconds.");
        describe_histogram!(
            "feed_source_fetch_ms",
            "Content source call time in milliseconds."
        );
        describe_gauge!("feed_sessions_live", "Pagination sessions currently held.");
        describe_gauge!("feed_session_ttl_secs", "Configured idle session TTL.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Initialize the Prometheus recorder and expose a static gauge for
    /// the configured session TTL.
    pub fn init(session_ttl_secs: u64) -> Self {
        let builder = PrometheusBuilder::new();

        let handle = builder
            .install_recorder()
            .expect("prometheus: install recorder");

        ensure_feed_metrics_described();
        gauge!("feed_session_ttl_secs").set(session_ttl_secs as f64);

        Self { handle }
    }

    /// Router exposing `/metrics` in the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
