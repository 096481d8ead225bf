//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render `/metrics`. Call once at startup,
/// before any metric is recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Connections accepted by the listener (counter).
pub const CONNECTIONS_ACCEPTED_TOTAL: &str = "courier_connections_accepted_total";
/// Connections currently open (gauge).
pub const CONNECTIONS_ACTIVE: &str = "courier_connections_active";
/// Listener accept errors (counter).
pub const ACCEPT_ERRORS_TOTAL: &str = "courier_accept_errors_total";
/// Clients currently registered (gauge).
pub const REGISTRY_ENTRIES: &str = "courier_registry_entries";
/// Writes submitted by the dispatcher (counter, labels: kind).
pub const DISPATCH_TOTAL: &str = "courier_dispatch_total";
/// Sends rejected because the client had no registered connection (counter).
pub const DISPATCH_UNKNOWN_CLIENT_TOTAL: &str = "courier_dispatch_unknown_client_total";
/// Resolved writes (counter, labels: kind, outcome).
///
/// `outcome` is `success` or the failure reason (`closed`, `queue_full`,
/// `io`, `dropped`).
pub const DELIVERIES_TOTAL: &str = "courier_deliveries_total";
