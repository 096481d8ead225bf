//! # courier-server
//!
//! Long-lived TCP push server.
//!
//! - [`registry`]: `ClientId` to live connection mapping
//! - [`dispatcher`]: the single send path for text and structured messages
//! - [`connection`]: per-connection bounded write queue and writer task
//! - [`delivery`]: asynchronous write outcomes (logs, metrics, broadcast)
//! - [`lifecycle`]: bind, accept, and graceful stop
//! - [`handler`]: seam for the inbound side (handshake, registration)
//! - [`admin`]: `/health` and `/metrics` over HTTP

#![deny(unsafe_code)]

pub mod admin;
pub mod config;
pub mod connection;
pub mod delivery;
pub mod dispatcher;
pub mod handler;
pub mod health;
pub mod lifecycle;
pub mod metrics;
pub mod registry;
pub mod shutdown;

pub use config::ServerConfig;
pub use connection::ConnectionHandle;
pub use delivery::DeliveryReport;
pub use dispatcher::Dispatcher;
pub use handler::{AcceptedConnection, ConnectionHandler, DrainHandler};
pub use lifecycle::ServerLifecycle;
pub use registry::ConnectionRegistry;
