//! Observability infrastructure for the gateway
//!
//! Prometheus metrics for resolution-cache behavior, upstream API errors,
//! slow-query detections and tool usage, exposed through the server's
//! `/metrics` endpoint.

use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter, IntCounterVec,
    IntGauge,
};
use std::sync::OnceLock;

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<GatewayMetricsInner> = OnceLock::new();

struct GatewayMetricsInner {
    resolution_cache_hits: IntCounter,
    resolution_cache_misses: IntCounter,
    resolution_failures: IntCounter,
    api_errors: IntCounter,
    slow_queries_detected: IntCounter,
    tool_invocations: IntCounterVec,
    applications_in_roster: IntGauge,
}

impl GatewayMetricsInner {
    fn new() -> Self {
        Self {
            resolution_cache_hits: register_int_counter!(
                "newrelic_gateway_resolution_cache_hits_total",
                "Application name resolutions served from the cache"
            )
            .expect("Failed to register resolution_cache_hits"),

            resolution_cache_misses: register_int_counter!(
                "newrelic_gateway_resolution_cache_misses_total",
                "Application name resolutions that required a matcher call"
            )
            .expect("Failed to register resolution_cache_misses"),

            resolution_failures: register_int_counter!(
                "newrelic_gateway_resolution_failures_total",
                "Application name resolutions that failed"
            )
            .expect("Failed to register resolution_failures"),

            api_errors: register_int_counter!(
                "newrelic_gateway_api_errors_total",
                "Failed requests to New Relic endpoints"
            )
            .expect("Failed to register api_errors"),

            slow_queries_detected: register_int_counter!(
                "newrelic_gateway_slow_queries_detected_total",
                "Database operations whose average query time exceeded the threshold"
            )
            .expect("Failed to register slow_queries_detected"),

            tool_invocations: register_int_counter_vec!(
                "newrelic_gateway_tool_invocations_total",
                "Tool invocations received over the MCP transport",
                &["tool"]
            )
            .expect("Failed to register tool_invocations"),

            applications_in_roster: register_int_gauge!(
                "newrelic_gateway_applications_in_roster",
                "Applications currently held in the roster snapshot"
            )
            .expect("Failed to register applications_in_roster"),
        }
    }
}

/// Gateway metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct GatewayMetrics {
    _private: (),
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(GatewayMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &GatewayMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn inc_cache_hit(&self) {
        self.inner().resolution_cache_hits.inc();
    }

    pub fn inc_cache_miss(&self) {
        self.inner().resolution_cache_misses.inc();
    }

    pub fn inc_resolution_failure(&self) {
        self.inner().resolution_failures.inc();
    }

    pub fn inc_api_error(&self) {
        self.inner().api_errors.inc();
    }

    pub fn add_slow_queries(&self, count: u64) {
        self.inner().slow_queries_detected.inc_by(count);
    }

    pub fn inc_tool_invocation(&self, tool: &str) {
        self.inner().tool_invocations.with_label_values(&[tool]).inc();
    }

    pub fn set_roster_size(&self, count: i64) {
        self.inner().applications_in_roster.set(count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_metrics_handle() {
        // Metrics register against the global registry once; the handle
        // is cheap and observations must not panic.
        let metrics = GatewayMetrics::new();

        metrics.inc_cache_hit();
        metrics.inc_cache_miss();
        metrics.inc_resolution_failure();
        metrics.inc_api_error();
        metrics.add_slow_queries(3);
        metrics.inc_tool_invocation("get_newrelic_apm_metrics");
        metrics.set_roster_size(12);
    }
}
