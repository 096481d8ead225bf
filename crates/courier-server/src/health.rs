//! `/health` endpoint body.

use std::time::Instant;

use courier_core::ServerState;
use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"ok"` while the listener is accepting, `"unavailable"` otherwise.
    pub status: String,
    /// Lifecycle state.
    pub state: ServerState,
    /// Seconds since the process started.
    pub uptime_secs: u64,
    /// Registered clients.
    pub connections: usize,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, state: ServerState, connections: usize) -> HealthResponse {
    let status = if state.is_accepting() { "ok" } else { "unavailable" };
    HealthResponse {
        status: status.into(),
        state,
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
    }
}
