//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring settlement.
//!
//! # Metrics
//!
//! - `wallet_credits_total` - Committed credit settlements
//! - `wallet_debits_total` - Committed debit settlements
//! - `wallet_conflicts_total` - Version races lost and retried
//! - `wallet_rejections_total` - Operations rejected before any mutation
//! - `wallet_settle_duration_seconds` - Histogram of settlement latencies
//!
//! Each collector registers into its own registry so several engines can
//! coexist in one process (and in tests).

use prometheus::{Histogram, HistogramOpts, IntCounter, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Committed credits
    pub credits_total: IntCounter,

    /// Committed debits
    pub debits_total: IntCounter,

    /// Lost version races
    pub conflicts_total: IntCounter,

    /// Pre-mutation rejections (invalid amount, insufficient balance, ...)
    pub rejections_total: IntCounter,

    /// Settlement duration histogram
    pub settle_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let credits_total =
            IntCounter::new("wallet_credits_total", "Committed credit settlements")?;
        registry.register(Box::new(credits_total.clone()))?;

        let debits_total = IntCounter::new("wallet_debits_total", "Committed debit settlements")?;
        registry.register(Box::new(debits_total.clone()))?;

        let conflicts_total = IntCounter::new(
            "wallet_conflicts_total",
            "Version races lost and retried",
        )?;
        registry.register(Box::new(conflicts_total.clone()))?;

        let rejections_total = IntCounter::new(
            "wallet_rejections_total",
            "Operations rejected before any mutation",
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        let settle_duration = Histogram::with_opts(
            HistogramOpts::new(
                "wallet_settle_duration_seconds",
                "Histogram of settlement latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(settle_duration.clone()))?;

        Ok(Self {
            credits_total,
            debits_total,
            conflicts_total,
            rejections_total,
            settle_duration,
            registry,
        })
    }

    /// Record a committed credit
    pub fn record_credit(&self, duration_seconds: f64) {
        self.credits_total.inc();
        self.settle_duration.observe(duration_seconds);
    }

    /// Record a committed debit
    pub fn record_debit(&self, duration_seconds: f64) {
        self.debits_total.inc();
        self.settle_duration.observe(duration_seconds);
    }

    /// Record a lost version race
    pub fn record_conflict(&self) {
        self.conflicts_total.inc();
    }

    /// Record a pre-mutation rejection
    pub fn record_rejection(&self) {
        self.rejections_total.inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.credits_total.get(), 0);
        assert_eq!(metrics.debits_total.get(), 0);
    }

    #[test]
    fn test_record_settlements() {
        let metrics = Metrics::new().unwrap();
        metrics.record_credit(0.002);
        metrics.record_credit(0.004);
        metrics.record_debit(0.003);
        assert_eq!(metrics.credits_total.get(), 2);
        assert_eq!(metrics.debits_total.get(), 1);
    }

    #[test]
    fn test_record_conflict_and_rejection() {
        let metrics = Metrics::new().unwrap();
        metrics.record_conflict();
        metrics.record_rejection();
        metrics.record_rejection();
        assert_eq!(metrics.conflicts_total.get(), 1);
        assert_eq!(metrics.rejections_total.get(), 2);
    }

    #[test]
    fn test_independent_registries() {
        // Two collectors must not clash on registration
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.record_credit(0.001);
        assert_eq!(a.credits_total.get(), 1);
        assert_eq!(b.credits_total.get(), 0);
    }
}
