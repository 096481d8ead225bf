//! # courier-core
//!
//! Foundation types shared by every Courier crate.
//!
//! - **Client IDs**: [`ClientId`] newtype naming one logical client session
//! - **Messages**: [`OutboundMessage`] sum type with `Text` and `Structured` variants
//! - **Wire schema**: [`RequestProtocol`], the fixed protobuf body of structured messages
//! - **Lifecycle**: [`ServerState`] for the listener state machine
//! - **Errors**: [`CourierError`] and [`TransportError`] via `thiserror`

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod message;
pub mod state;

pub use errors::{CourierError, Result, TransportError};
pub use ids::{ClientId, ConnectionId};
pub use message::{MessageKind, OutboundMessage, RequestProtocol};
pub use state::ServerState;
