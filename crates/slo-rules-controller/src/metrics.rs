//! Prometheus metrics for reconciliation
//!
//! - `slo_rules_reconcile_total` (counter) - passes by backend and outcome
//! - `slo_rules_reconcile_duration_seconds` (histogram) - pass duration by backend
//! - `slo_rules_reconcile_errors_total` (counter) - failed passes by backend and step
//!
//! ```rust,no_run
//! use slo_rules_controller::metrics::ReconcileMetricsRegistry;
//!
//! let registry = ReconcileMetricsRegistry::new().unwrap();
//! registry.reconcile().record_pass("config-map", "created");
//! println!("{}", registry.encode_text().unwrap());
//! ```

use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Metrics error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("Failed to encode metrics: {0}")]
    Encode(String),
}

pub type Result<T> = std::result::Result<T, MetricsError>;

const NAMESPACE: &str = "slo_rules";

pub struct ReconcileMetrics {
    /// Passes by backend and outcome (created, updated, skipped, error)
    reconcile_total: CounterVec,

    /// Pass duration in seconds by backend
    duration_seconds: HistogramVec,

    /// Failed passes by backend and failing step
    errors_total: CounterVec,
}

impl ReconcileMetrics {
    /// Create the metrics and register them with `registry`
    pub fn new(registry: &Registry) -> Result<Self> {
        let reconcile_total = CounterVec::new(
            Opts::new("reconcile_total", "Total number of reconciliation passes")
                .namespace(NAMESPACE),
            &["backend", "outcome"],
        )?;

        let duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "reconcile_duration_seconds",
                "Reconciliation pass duration in seconds",
            )
            .namespace(NAMESPACE)
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["backend"],
        )?;

        let errors_total = CounterVec::new(
            Opts::new(
                "reconcile_errors_total",
                "Total number of failed reconciliation passes",
            )
            .namespace(NAMESPACE),
            &["backend", "step"],
        )?;

        registry.register(Box::new(reconcile_total.clone()))?;
        registry.register(Box::new(duration_seconds.clone()))?;
        registry.register(Box::new(errors_total.clone()))?;

        Ok(Self {
            reconcile_total,
            duration_seconds,
            errors_total,
        })
    }

    pub fn record_pass(&self, backend: &str, outcome: &str) {
        self.reconcile_total
            .with_label_values(&[backend, outcome])
            .inc();
    }

    /// Count a failed pass; also counted under `reconcile_total{outcome="error"}`
    pub fn record_error(&self, backend: &str, step: &str) {
        self.record_pass(backend, "error");
        self.errors_total.with_label_values(&[backend, step]).inc();
    }

    pub fn observe_duration(&self, backend: &str, duration_secs: f64) {
        self.duration_seconds
            .with_label_values(&[backend])
            .observe(duration_secs);
    }

    pub fn pass_count(&self, backend: &str, outcome: &str) -> f64 {
        self.reconcile_total
            .with_label_values(&[backend, outcome])
            .get()
    }

    pub fn error_count(&self, backend: &str, step: &str) -> f64 {
        self.errors_total.with_label_values(&[backend, step]).get()
    }

    /// Start a timer that observes the pass duration on drop
    pub fn start_timer<'a>(&'a self, backend: &'a str) -> ReconcileTimer<'a> {
        ReconcileTimer {
            start: Instant::now(),
            backend,
            metrics: self,
        }
    }
}

/// RAII guard for timing a reconciliation pass
pub struct ReconcileTimer<'a> {
    start: Instant,
    backend: &'a str,
    metrics: &'a ReconcileMetrics,
}

impl<'a> ReconcileTimer<'a> {
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

impl<'a> Drop for ReconcileTimer<'a> {
    fn drop(&mut self) {
        self.metrics
            .observe_duration(self.backend, self.start.elapsed().as_secs_f64());
    }
}

/// Registry owning the reconcile metrics
pub struct ReconcileMetricsRegistry {
    registry: Arc<Registry>,
    reconcile: Arc<ReconcileMetrics>,
}

impl ReconcileMetricsRegistry {
    pub fn new() -> Result<Self> {
        Self::with_registry(Arc::new(Registry::new()))
    }

    /// Register into an existing Prometheus registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let reconcile = Arc::new(ReconcileMetrics::new(&registry)?);
        Ok(Self {
            registry,
            reconcile,
        })
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Shared handle for a [`crate::Reconciler`]
    pub fn reconcile(&self) -> Arc<ReconcileMetrics> {
        Arc::clone(&self.reconcile)
    }

    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// Encode metrics as text for scraping
    pub fn encode_text(&self) -> Result<String> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.gather(), &mut buffer)
            .map_err(|e| MetricsError::Encode(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| MetricsError::Encode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_pass_and_error() {
        let registry = ReconcileMetricsRegistry::new().unwrap();
        let metrics = registry.reconcile();

        metrics.record_pass("config-map", "created");
        metrics.record_pass("config-map", "updated");
        metrics.record_pass("config-map", "updated");
        metrics.record_error("mimir", "get");

        assert_eq!(metrics.pass_count("config-map", "updated"), 2.0);
        assert_eq!(metrics.pass_count("mimir", "error"), 1.0);
        assert_eq!(metrics.error_count("mimir", "get"), 1.0);
    }

    #[test]
    fn test_timer_observes_on_drop() {
        let registry = ReconcileMetricsRegistry::new().unwrap();
        let metrics = registry.reconcile();
        {
            let _timer = metrics.start_timer("prometheus-rule");
        }

        let text = registry.encode_text().unwrap();
        assert!(text.contains("slo_rules_reconcile_duration_seconds_count{backend=\"prometheus-rule\"} 1"));
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Arc::new(Registry::new());
        ReconcileMetricsRegistry::with_registry(Arc::clone(&registry)).unwrap();
        assert!(ReconcileMetricsRegistry::with_registry(registry).is_err());
    }

    #[test]
    fn test_encode_text_names() {
        let registry = ReconcileMetricsRegistry::new().unwrap();
        registry.reconcile().record_error("config-map", "update");

        let text = registry.encode_text().unwrap();
        assert!(text.contains("slo_rules_reconcile_total"));
        assert!(text.contains("slo_rules_reconcile_errors_total{backend=\"config-map\",step=\"update\"} 1"));
    }
}
