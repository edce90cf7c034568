//! Thin metrics glue: installs a Prometheus recorder and names the gauges
//! and counters the rest of the crate increments.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub const DEVICES_CONNECTED: &str = "canopy_devices_connected";
pub const PIGEON_INFLIGHT: &str = "canopy_pigeon_inflight";
pub const PIGEON_TIMEOUTS_TOTAL: &str = "canopy_pigeon_timeouts_total";
pub const PIGEON_NO_LISTENERS_TOTAL: &str = "canopy_pigeon_no_listeners_total";

/// Install the global Prometheus recorder. Call once at process startup.
pub fn install() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .unwrap_or_else(|e| panic!("failed to install prometheus recorder: {e}"))
}

pub fn device_connected() {
    metrics::gauge!(DEVICES_CONNECTED).increment(1.0);
}

pub fn device_disconnected() {
    metrics::gauge!(DEVICES_CONNECTED).decrement(1.0);
}

pub fn pigeon_request_started() {
    metrics::gauge!(PIGEON_INFLIGHT).increment(1.0);
}

pub fn pigeon_request_finished() {
    metrics::gauge!(PIGEON_INFLIGHT).decrement(1.0);
}

pub fn pigeon_timeout() {
    metrics::counter!(PIGEON_TIMEOUTS_TOTAL).increment(1);
}

pub fn pigeon_no_listeners() {
    metrics::counter!(PIGEON_NO_LISTENERS_TOTAL).increment(1);
}
