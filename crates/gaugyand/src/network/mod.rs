//! HTTP middleware and service metrics

pub mod metrics;
pub mod middleware;

pub use metrics::GauMetrics;
pub use middleware::RateLimiter;
