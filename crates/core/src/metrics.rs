//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Notification intake (listener, readiness, admission)
//! - Pipeline (runs, stages, relocated products)
//! - Publishing and ancillary file refreshes

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Intake
// =============================================================================

/// Inbound notifications by outcome.
pub static NOTIFICATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "modis_runner_notifications_total",
            "Total inbound notifications handled",
        ),
        &["outcome"], // "rejected", "not_ready", "duplicate", "dispatched"
    )
    .unwrap()
});

/// Scenes handed to the worker pool.
pub static SCENES_DISPATCHED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "modis_runner_scenes_dispatched_total",
        "Total scenes dispatched for processing",
    )
    .unwrap()
});

/// Scenes with at least one input file recorded.
pub static READINESS_ENTRIES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "modis_runner_readiness_entries",
        "Scenes tracked by the readiness registry",
    )
    .unwrap()
});

/// Scenes admitted and not yet released.
pub static ACTIVE_JOBS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("modis_runner_active_jobs", "Scenes held by the job registry").unwrap()
});

// =============================================================================
// Pipeline
// =============================================================================

/// Pipeline runs by platform and result.
pub static PIPELINE_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("modis_runner_pipeline_runs_total", "Total pipeline runs"),
        &["platform", "result"], // result: "success", "failed"
    )
    .unwrap()
});

/// Stage duration in seconds.
pub static STAGE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "modis_runner_stage_duration_seconds",
            "Duration of external processing stages",
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1200.0]),
        &["stage"],
    )
    .unwrap()
});

/// Stage failures by stage.
pub static STAGE_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "modis_runner_stage_failures_total",
            "Total failed processing stages",
        ),
        &["stage"],
    )
    .unwrap()
});

/// Stage outputs by presence after the stage ran.
pub static PRODUCTS_RELOCATED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "modis_runner_products_total",
            "Stage outputs found present or missing",
        ),
        &["outcome"], // "present", "missing"
    )
    .unwrap()
});

// =============================================================================
// Publishing and ancillary files
// =============================================================================

/// Completion messages published by product level.
pub static MESSAGES_PUBLISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "modis_runner_messages_published_total",
            "Total completion messages published",
        ),
        &["level"],
    )
    .unwrap()
});

/// Connected downstream subscribers.
pub static SUBSCRIBERS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "modis_runner_subscribers",
        "Downstream subscribers currently connected",
    )
    .unwrap()
});

/// Ancillary refresh attempts by result.
pub static ANCILLARY_REFRESHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "modis_runner_ancillary_refreshes_total",
            "Total ancillary file refresh attempts",
        ),
        &["result"], // "fresh", "updated", "failed"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Intake
        Box::new(NOTIFICATIONS_TOTAL.clone()),
        Box::new(SCENES_DISPATCHED.clone()),
        Box::new(READINESS_ENTRIES.clone()),
        Box::new(ACTIVE_JOBS.clone()),
        // Pipeline
        Box::new(PIPELINE_RUNS.clone()),
        Box::new(STAGE_DURATION.clone()),
        Box::new(STAGE_FAILURES.clone()),
        Box::new(PRODUCTS_RELOCATED.clone()),
        // Publishing and ancillary
        Box::new(MESSAGES_PUBLISHED.clone()),
        Box::new(SUBSCRIBERS.clone()),
        Box::new(ANCILLARY_REFRESHES.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn test_all_metrics_register_without_conflicts() {
        let registry = Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
        NOTIFICATIONS_TOTAL.with_label_values(&["dispatched"]).inc();
        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "modis_runner_notifications_total"));
    }
}
