use std::fmt::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

#[derive(Debug, Default)]
pub struct Metrics {
    request_total: AtomicU64,
    request_success: AtomicU64,
    request_error: AtomicU64,
    shared_cache_hits: AtomicU64,
    shared_cache_misses: AtomicU64,
    user_recalculations: AtomicU64,
    group_recalculations: AtomicU64,
    fail_closed_denials: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.request_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.request_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.request_error.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_shared_cache_hit(&self) {
        self.shared_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_shared_cache_miss(&self) {
        self.shared_cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_user_recalculation(&self) {
        self.user_recalculations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_group_recalculation(&self) {
        self.group_recalculations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fail_closed(&self) {
        self.fail_closed_denials.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_total(&self) -> u64 {
        self.request_total.load(Ordering::Relaxed)
    }

    pub fn request_success(&self) -> u64 {
        self.request_success.load(Ordering::Relaxed)
    }

    pub fn request_error(&self) -> u64 {
        self.request_error.load(Ordering::Relaxed)
    }

    pub fn shared_cache_hits(&self) -> u64 {
        self.shared_cache_hits.load(Ordering::Relaxed)
    }

    pub fn shared_cache_misses(&self) -> u64 {
        self.shared_cache_misses.load(Ordering::Relaxed)
    }

    pub fn user_recalculations(&self) -> u64 {
        self.user_recalculations.load(Ordering::Relaxed)
    }

    pub fn group_recalculations(&self) -> u64 {
        self.group_recalculations.load(Ordering::Relaxed)
    }

    pub fn fail_closed_denials(&self) -> u64 {
        self.fail_closed_denials.load(Ordering::Relaxed)
    }

    pub fn render_prometheus(&self) -> String {
        let counters = [
            ("requests_total", "Total number of requests.", self.request_total()),
            ("requests_success_total", "Total successful requests.", self.request_success()),
            ("requests_error_total", "Total failed requests.", self.request_error()),
            ("shared_cache_hits_total", "Shared permission cache hits.", self.shared_cache_hits()),
            (
                "shared_cache_misses_total",
                "Shared permission cache misses.",
                self.shared_cache_misses(),
            ),
            (
                "user_recalculations_total",
                "User recalculations triggered explicitly.",
                self.user_recalculations(),
            ),
            (
                "group_recalculations_total",
                "Group recalculations triggered explicitly.",
                self.group_recalculations(),
            ),
            (
                "fail_closed_denials_total",
                "Authorization checks denied because of an error.",
                self.fail_closed_denials(),
            ),
        ];

        let mut output = String::new();
        for (name, help, value) in counters {
            let _ = writeln!(output, "# HELP grantwell_{name} {help}");
            let _ = writeln!(output, "# TYPE grantwell_{name} counter");
            let _ = writeln!(output, "grantwell_{name} {value}");
        }
        output
    }
}

pub async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        metrics.render_prometheus(),
    )
}
