use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

#[derive(Debug, Default)]
pub struct AppMetrics {
    requests_total: AtomicU64,
    flagged_total: AtomicU64,
    review_total: AtomicU64,
    passed_total: AtomicU64,
    age_override_total: AtomicU64,
    semantic_fallback_total: AtomicU64,
    total_latency_millis: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub flagged_total: u64,
    pub review_total: u64,
    pub passed_total: u64,
    pub age_override_total: u64,
    pub semantic_fallback_total: u64,
    pub avg_latency_millis: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("moderation_requests_total").increment(1);
    }

    pub fn inc_flagged(&self) {
        self.flagged_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("moderation_decisions_total", "decision" => "FLAG").increment(1);
    }

    pub fn inc_review(&self) {
        self.review_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("moderation_decisions_total", "decision" => "REVIEW_QUEUE").increment(1);
    }

    pub fn inc_passed(&self) {
        self.passed_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("moderation_decisions_total", "decision" => "PASS").increment(1);
    }

    pub fn inc_age_override(&self) {
        self.age_override_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("moderation_age_overrides_total").increment(1);
    }

    pub fn inc_semantic_fallback(&self) {
        self.semantic_fallback_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("moderation_semantic_fallback_total").increment(1);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
        metrics::histogram!("moderation_latency_seconds").record(duration.as_secs_f64());
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = self.requests_total.load(Ordering::Relaxed);
        let latency = self.total_latency_millis.load(Ordering::Relaxed);

        MetricsSnapshot {
            requests_total: requests,
            flagged_total: self.flagged_total.load(Ordering::Relaxed),
            review_total: self.review_total.load(Ordering::Relaxed),
            passed_total: self.passed_total.load(Ordering::Relaxed),
            age_override_total: self.age_override_total.load(Ordering::Relaxed),
            semantic_fallback_total: self.semantic_fallback_total.load(Ordering::Relaxed),
            avg_latency_millis: if requests == 0 {
                0.0
            } else {
                latency as f64 / requests as f64
            },
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,komal_api=info,komal_engine=info,komal_taxonomy=info,komal_ml=info",
                service_name
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(std::io::stderr)
            .init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_averages_latency_per_request() {
        let metrics = AppMetrics::default();
        metrics.inc_request();
        metrics.inc_request();
        metrics.inc_flagged();
        metrics.inc_semantic_fallback();
        metrics.observe_latency(Duration::from_millis(10));
        metrics.observe_latency(Duration::from_millis(30));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_total, 2);
        assert_eq!(snapshot.flagged_total, 1);
        assert_eq!(snapshot.semantic_fallback_total, 1);
        assert_eq!(snapshot.avg_latency_millis, 20.0);
    }

    #[test]
    fn empty_snapshot_has_zero_latency() {
        assert_eq!(AppMetrics::default().snapshot().avg_latency_millis, 0.0);
    }
}
