//! Prometheus exposition for the narration pipeline. The counters themselves
//! live next to the code that increments them (admission, queue, generator);
//! this module owns the process-wide recorder and the `/metrics` route.

use axum::{routing::get, Router};
use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the process-wide Prometheus recorder. Must run before any
    /// admission, queue, or generation counter is touched, or those
    /// increments land in the no-op recorder and are lost.
    pub fn init(batch_size: usize) -> Self {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("prometheus: install recorder");

        // Static gauge so queue drain counters can be read against the
        // configured per-pass batch size.
        gauge!("queue_batch_size").set(batch_size as f64);

        Self { handle }
    }

    /// Router serving `GET /metrics` in the Prometheus text format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
