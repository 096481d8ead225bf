//! Listener lifecycle states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// State of the server listener.
///
/// Transitions: `Stopped → Starting → Running → Stopping → Stopped`.
/// A failed bind goes straight from `Starting` back to `Stopped`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerState {
    /// No listener bound, no workers running.
    #[default]
    Stopped,
    /// Bind in progress.
    Starting,
    /// Accepting connections.
    Running,
    /// No longer accepting; draining in-flight work.
    Stopping,
}

impl ServerState {
    /// Whether the listener may accept new connections in this state.
    #[must_use]
    pub fn is_accepting(self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_stopped() {
        assert_eq!(ServerState::default(), ServerState::Stopped);
    }

    #[test]
    fn only_running_accepts() {
        assert!(ServerState::Running.is_accepting());
        assert!(!ServerState::Starting.is_accepting());
        assert!(!ServerState::Stopping.is_accepting());
        assert!(!ServerState::Stopped.is_accepting());
    }

    #[test]
    fn display_matches_serde() {
        for state in [
            ServerState::Stopped,
            ServerState::Starting,
            ServerState::Running,
            ServerState::Stopping,
        ] {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{state}\""));
        }
    }
}
