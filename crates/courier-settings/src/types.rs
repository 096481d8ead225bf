//! Settings type definitions.
//!
//! All types use camelCase JSON field names and `#[serde(default)]`, so a
//! partial settings file only needs the keys it overrides.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 9000, "adminPort": 9001 },
///   "logging": { "level": "debug", "format": "json" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CourierSettings {
    /// Listener settings.
    pub server: ServerSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

impl CourierSettings {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.server.send_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "server.sendQueueCapacity must be greater than 0".to_string(),
            ));
        }
        if self.server.host.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "server.host must not be empty".to_string(),
            ));
        }
        if self.server.admin_port.is_some_and(|p| p != 0 && p == self.server.port) {
            return Err(SettingsError::InvalidValue(format!(
                "server.adminPort {} collides with server.port",
                self.server.port
            )));
        }
        Ok(())
    }
}

/// Listener network settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Port client connections are accepted on.
    pub port: u16,
    /// Per-connection outbound queue length.
    pub send_queue_capacity: usize,
    /// Port for `/health` and `/metrics`; disabled when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_port: Option<u16>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 11211,
            send_queue_capacity: 1024,
            admin_port: None,
        }
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Compact,
    /// One JSON object per line.
    Json,
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive (overridden by `RUST_LOG`).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}
