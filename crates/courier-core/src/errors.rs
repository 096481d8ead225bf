//! Error taxonomy for the Courier push server.
//!
//! - [`CourierError`]: synchronous failures returned to the immediate caller
//!   (unknown client, bind failure, lifecycle misuse)
//! - [`TransportError`]: asynchronous write failures, surfaced only through
//!   delivery reports and logs, never returned across a `send` call

use std::io;

use thiserror::Error;

use crate::ids::ClientId;
use crate::state::ServerState;

/// Errors returned synchronously by Courier operations.
#[derive(Debug, Error)]
pub enum CourierError {
    /// No live connection is registered for the client.
    #[error("no live connection registered for client {client_id}")]
    UnknownClient {
        /// The client that was looked up.
        client_id: ClientId,
    },

    /// The listener could not acquire its port.
    #[error("failed to bind port {port}: {source}")]
    Bind {
        /// The configured port.
        port: u16,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// A lifecycle operation was invoked in a state that does not allow it.
    #[error("cannot {operation} while server is {state}")]
    InvalidState {
        /// Current state.
        state: ServerState,
        /// Operation that was attempted.
        operation: &'static str,
    },

    /// `stop()` was requested while `start()` was still binding.
    #[error("start on port {port} aborted by shutdown")]
    StartAborted {
        /// The configured port.
        port: u16,
    },

    /// A JSON text payload could not be serialized.
    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl CourierError {
    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownClient { .. } => "UNKNOWN_CLIENT",
            Self::Bind { .. } => "BIND_ERROR",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::StartAborted { .. } => "START_ABORTED",
            Self::Serialize(_) => "SERIALIZE_ERROR",
        }
    }

    /// Whether the error should stop the process from reaching `Running`.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Bind { .. })
    }
}

/// Result alias for Courier operations.
pub type Result<T> = std::result::Result<T, CourierError>;

/// Asynchronous write failure on a single connection.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The connection was closed before the write could be attempted.
    #[error("connection closed")]
    Closed,

    /// The connection's send queue was full.
    #[error("send queue full (capacity {capacity})")]
    QueueFull {
        /// Queue capacity of the connection.
        capacity: usize,
    },

    /// The socket write failed.
    #[error("write failed ({kind:?}): {message}")]
    Io {
        /// OS error kind.
        kind: io::ErrorKind,
        /// Error description.
        message: String,
    },

    /// The write request was discarded before it was attempted.
    #[error("write request dropped before completion")]
    Dropped,
}

impl TransportError {
    /// Short label used for metrics.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::QueueFull { .. } => "queue_full",
            Self::Io { .. } => "io",
            Self::Dropped => "dropped",
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
