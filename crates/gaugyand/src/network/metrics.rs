//! Prometheus metrics for the analysis service

use prometheus::{
    register_counter_vec_with_registry, register_histogram_vec_with_registry, CounterVec,
    Encoder, HistogramVec, Registry, TextEncoder,
};
use std::sync::Arc;

/// Service metrics for Prometheus
#[derive(Clone)]
pub struct GauMetrics {
    /// Analyses by outcome (success or an error code)
    pub analyses_total: CounterVec,
    /// register/login/logout/token attempts by outcome
    pub auth_events_total: CounterVec,
    pub model_latency_seconds: HistogramVec,
    pub rate_limit_violations_total: CounterVec,

    registry: Arc<Registry>,
}

impl GauMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let analyses_total = register_counter_vec_with_registry!(
            "gaugyan_analyses_total",
            "Total number of analyses by outcome",
            &["outcome"],
            registry
        )?;

        let auth_events_total = register_counter_vec_with_registry!(
            "gaugyan_auth_events_total",
            "Total number of authentication events by event and outcome",
            &["event", "outcome"],
            registry
        )?;

        let model_latency_seconds = register_histogram_vec_with_registry!(
            "gaugyan_model_latency_seconds",
            "Model call latency in seconds by flow",
            &["flow"],
            vec![0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 40.0, 80.0],
            registry
        )?;

        let rate_limit_violations_total = register_counter_vec_with_registry!(
            "gaugyan_rate_limit_violations_total",
            "Total number of rate limit violations by scope",
            &["scope"],
            registry
        )?;

        Ok(Self {
            analyses_total,
            auth_events_total,
            model_latency_seconds,
            rate_limit_violations_total,
            registry: Arc::new(registry),
        })
    }

    pub fn record_analysis(&self, outcome: &str) {
        self.analyses_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_auth_event(&self, event: &str, outcome: &str) {
        self.auth_events_total
            .with_label_values(&[event, outcome])
            .inc();
    }

    pub fn record_model_latency(&self, flow: &str, duration_secs: f64) {
        self.model_latency_seconds
            .with_label_values(&[flow])
            .observe(duration_secs);
    }

    pub fn record_rate_limit_violation(&self, scope: &str) {
        self.rate_limit_violations_total
            .with_label_values(&[scope])
            .inc();
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}
