//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `points_awards_total` - Successful awards
//! - `points_spends_total` - Successful spends
//! - `points_rejections_total` - Rejected awards/spends (cap, cooldown, balance)
//! - `points_awarded_sum` - Total points credited
//! - `points_op_duration_seconds` - Histogram of award/spend latencies

use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Successful awards
    pub awards_total: IntCounter,

    /// Successful spends
    pub spends_total: IntCounter,

    /// Rejections (daily cap, cooldown, insufficient balance)
    pub rejections_total: IntCounter,

    /// Total points credited
    pub points_awarded_sum: IntCounter,

    /// Operation duration histogram
    pub op_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("awards_total", &self.awards_total.get())
            .field("spends_total", &self.spends_total.get())
            .field("rejections_total", &self.rejections_total.get())
            .finish()
    }
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let awards_total =
            IntCounter::with_opts(Opts::new("points_awards_total", "Successful awards"))?;
        registry.register(Box::new(awards_total.clone()))?;

        let spends_total =
            IntCounter::with_opts(Opts::new("points_spends_total", "Successful spends"))?;
        registry.register(Box::new(spends_total.clone()))?;

        let rejections_total = IntCounter::with_opts(Opts::new(
            "points_rejections_total",
            "Rejected awards and spends",
        ))?;
        registry.register(Box::new(rejections_total.clone()))?;

        let points_awarded_sum =
            IntCounter::with_opts(Opts::new("points_awarded_sum", "Total points credited"))?;
        registry.register(Box::new(points_awarded_sum.clone()))?;

        let op_duration = Histogram::with_opts(
            HistogramOpts::new(
                "points_op_duration_seconds",
                "Histogram of award/spend latencies",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(op_duration.clone()))?;

        Ok(Self {
            awards_total,
            spends_total,
            rejections_total,
            points_awarded_sum,
            op_duration,
            registry,
        })
    }

    /// Record a successful award
    pub fn record_award(&self, points: u64) {
        self.awards_total.inc();
        self.points_awarded_sum.inc_by(points);
    }

    /// Record a successful spend
    pub fn record_spend(&self) {
        self.spends_total.inc();
    }

    /// Record a rejected award or spend
    pub fn record_rejection(&self) {
        self.rejections_total.inc();
    }

    /// Record operation duration
    pub fn record_op_duration(&self, duration_seconds: f64) {
        self.op_duration.observe(duration_seconds);
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
        assert_eq!(metrics.awards_total.get(), 0);
        assert_eq!(metrics.spends_total.get(), 0);
    }

    #[test]
    fn test_record_award() {
        let metrics = Metrics::new().unwrap();
        metrics.record_award(50);
        metrics.record_award(25);
        assert_eq!(metrics.awards_total.get(), 2);
        assert_eq!(metrics.points_awarded_sum.get(), 75);
    }

    #[test]
    fn test_record_rejection() {
        let metrics = Metrics::new().unwrap();
        metrics.record_rejection();
        assert_eq!(metrics.rejections_total.get(), 1);
    }

    #[test]
    fn test_record_spend_and_duration() {
        let metrics = Metrics::new().unwrap();
        metrics.record_spend();
        metrics.record_op_duration(0.004);
        assert_eq!(metrics.spends_total.get(), 1);
    }
}
