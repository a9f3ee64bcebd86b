//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `odap_phase_total` - Phase outcomes by role, phase and outcome
//! - `odap_ledger_actions_total` - Ledger actions by DLT, operation and outcome
//! - `odap_ledger_action_duration_seconds` - Histogram of ledger call latencies
//! - `odap_reverts_total` - Reverts by outcome

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};
use std::sync::Arc;
use std::time::Duration;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Phase outcomes
    pub phases: IntCounterVec,

    /// Ledger action outcomes
    pub ledger_actions: IntCounterVec,

    /// Ledger call latency
    pub ledger_duration: HistogramVec,

    /// Revert outcomes
    pub reverts: IntCounterVec,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let phases = IntCounterVec::new(
            Opts::new("odap_phase_total", "Phase outcomes"),
            &["role", "phase", "outcome"],
        )?;
        registry.register(Box::new(phases.clone()))?;

        let ledger_actions = IntCounterVec::new(
            Opts::new("odap_ledger_actions_total", "Ledger actions performed"),
            &["dlt", "operation", "outcome"],
        )?;
        registry.register(Box::new(ledger_actions.clone()))?;

        let ledger_duration = HistogramVec::new(
            HistogramOpts::new(
                "odap_ledger_action_duration_seconds",
                "Histogram of ledger call latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
            &["dlt", "operation"],
        )?;
        registry.register(Box::new(ledger_duration.clone()))?;

        let reverts = IntCounterVec::new(
            Opts::new("odap_reverts_total", "Session reverts"),
            &["outcome"],
        )?;
        registry.register(Box::new(reverts.clone()))?;

        Ok(Self {
            phases,
            ledger_actions,
            ledger_duration,
            reverts,
            registry,
        })
    }

    /// Record a phase outcome (`role` is `client` or `server`)
    pub fn record_phase(&self, role: &str, phase: &str, ok: bool) {
        self.phases
            .with_label_values(&[role, phase, outcome(ok)])
            .inc();
    }

    /// Record a ledger action
    pub fn record_ledger_action(&self, dlt: &str, operation: &str, ok: bool) {
        self.ledger_actions
            .with_label_values(&[dlt, operation, outcome(ok)])
            .inc();
    }

    /// Record a ledger call duration
    pub fn record_ledger_duration(&self, dlt: &str, operation: &str, duration: Duration) {
        self.ledger_duration
            .with_label_values(&[dlt, operation])
            .observe(duration.as_secs_f64());
    }

    /// Record a revert outcome
    pub fn record_revert(&self, ok: bool) {
        self.reverts.with_label_values(&[outcome(ok)]).inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

fn outcome(ok: bool) -> &'static str {
    if ok {
        "success"
    } else {
        "failure"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_independent_registries() {
        // Two gateways in one process must not collide
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();

        a.record_phase("server", "Commence", true);
        assert_eq!(
            a.phases
                .with_label_values(&["server", "Commence", "success"])
                .get(),
            1
        );
        assert_eq!(
            b.phases
                .with_label_values(&["server", "Commence", "success"])
                .get(),
            0
        );
    }

    #[test]
    fn test_record_ledger_and_revert() {
        let metrics = Metrics::new().unwrap();
        metrics.record_ledger_action("FABRIC", "LOCK", false);
        metrics.record_ledger_duration("FABRIC", "LOCK", Duration::from_millis(3));
        metrics.record_revert(true);

        assert_eq!(
            metrics
                .ledger_actions
                .with_label_values(&["FABRIC", "LOCK", "failure"])
                .get(),
            1
        );
        assert_eq!(metrics.reverts.with_label_values(&["success"]).get(), 1);
        assert!(!metrics.registry().gather().is_empty());
    }
}
