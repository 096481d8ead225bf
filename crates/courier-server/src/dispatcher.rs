//! Outbound message dispatch.
//!
//! [`Dispatcher::send`] resolves a client id to its live connection, encodes
//! the message and submits one write. It returns as soon as the write is
//! queued; the outcome arrives later through the [`DeliveryReport`] stream
//! and the delivery log.

use std::sync::Arc;

use courier_core::{ClientId, CourierError, OutboundMessage, Result};
use metrics::counter;
use tokio::sync::broadcast;
use tracing::warn;

use crate::delivery::{Completion, DeliveryReport};
use crate::metrics::{DISPATCH_TOTAL, DISPATCH_UNKNOWN_CLIENT_TOTAL};
use crate::registry::ConnectionRegistry;

const REPORT_CHANNEL_CAPACITY: usize = 1024;

/// Sends messages to registered clients.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
    reports: broadcast::Sender<DeliveryReport>,
}

impl Dispatcher {
    /// Create a dispatcher over `registry`.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        let (reports, _) = broadcast::channel(REPORT_CHANNEL_CAPACITY);
        Self { registry, reports }
    }

    /// Registry this dispatcher reads.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Subscribe to delivery reports for writes submitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<DeliveryReport> {
        self.reports.subscribe()
    }

    /// Send a text payload.
    pub fn send_text(&self, client_id: ClientId, payload: impl Into<String>) -> Result<()> {
        self.send(client_id, OutboundMessage::text(payload))
    }

    /// Send a structured request. `request_id` is truncated to 32 bits.
    pub fn send_structured(
        &self,
        client_id: ClientId,
        request_id: i64,
        body: impl Into<String>,
    ) -> Result<()> {
        self.send(client_id, OutboundMessage::structured(request_id, body))
    }

    /// Submit exactly one write of `message` to `client_id`'s connection.
    ///
    /// Fails with [`CourierError::UnknownClient`] when the client has no
    /// registered connection; nothing is written in that case.
    pub fn send(&self, client_id: ClientId, message: OutboundMessage) -> Result<()> {
        let kind = message.kind();
        let Some(handle) = self.registry.lookup(client_id) else {
            counter!(DISPATCH_UNKNOWN_CLIENT_TOTAL).increment(1);
            warn!(%client_id, %kind, "no connection registered for client");
            return Err(CourierError::UnknownClient { client_id });
        };

        let completion = Completion::new(
            client_id,
            handle.id(),
            kind,
            message.summary(),
            self.reports.clone(),
        );
        counter!(DISPATCH_TOTAL, "kind" => kind.as_str()).increment(1);
        handle.write(message.encode(), completion);
        Ok(())
    }
}
