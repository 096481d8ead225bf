//! Server configuration.

use courier_settings::ServerSettings;
use serde::{Deserialize, Serialize};

/// Configuration for one courier server instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind; `0` lets the OS assign one.
    pub port: u16,
    /// Bound on each connection's pending write queue.
    pub send_queue_capacity: usize,
    /// Port for the HTTP admin endpoints, if enabled.
    pub admin_port: Option<u16>,
}

impl ServerConfig {
    /// Loopback bind on `port`, with the remaining values from the defaults.
    pub fn loopback(port: u16) -> Self {
        Self {
            host: "127.0.0.1".into(),
            port,
            ..Self::default()
        }
    }

    /// Loopback bind on an OS-assigned port.
    pub fn ephemeral_loopback() -> Self {
        Self::loopback(0)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(&ServerSettings::default())
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            send_queue_capacity: settings.send_queue_capacity,
            admin_port: settings.admin_port,
        }
    }
}
