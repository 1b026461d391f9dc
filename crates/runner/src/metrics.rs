//! Prometheus registry of the runner.
//!
//! Collects the core metrics (notifications, pipelines, stages, messages,
//! ancillary refreshes) and gauges refreshed from the registries on scrape.

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntGauge, Registry, TextEncoder};

use modis_runner_core::RegistrySnapshot;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Scenes with at least one file but not yet admitted.
pub static SCENES_PENDING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "modis_runner_scenes_pending",
        "Scenes waiting for more input files",
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    registry.register(Box::new(SCENES_PENDING.clone())).unwrap();

    for metric in modis_runner_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Updates scrape-time gauges from a registry snapshot.
pub fn collect_dynamic_metrics(snapshot: &RegistrySnapshot) {
    SCENES_PENDING.set(snapshot.pending as i64);
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
