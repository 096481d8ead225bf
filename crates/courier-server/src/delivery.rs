//! Write-completion reporting.
//!
//! Every write the dispatcher submits carries a [`Completion`]. The
//! connection's writer task resolves it once the frame has been flushed or
//! has failed, on whatever thread that task is running. Resolving emits one
//! log record, bumps the delivery counters, and publishes a
//! [`DeliveryReport`] to broadcast subscribers. Nothing reacts to a failure
//! beyond that: no retry, no requeue.

use courier_core::{ClientId, ConnectionId, MessageKind, TransportError};
use metrics::counter;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::metrics::DELIVERIES_TOTAL;

/// Outcome of one submitted write.
#[derive(Clone, Debug)]
pub struct DeliveryReport {
    /// Destination client.
    pub client_id: ClientId,
    /// Connection the write was queued on.
    pub connection_id: ConnectionId,
    /// Message variant.
    pub kind: MessageKind,
    /// Short description of the message.
    pub summary: String,
    /// Transport result.
    pub outcome: Result<(), TransportError>,
}

impl DeliveryReport {
    /// Whether the frame was written and flushed.
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// One-shot completion token for a single write.
///
/// Resolved exactly once: explicitly through [`Completion::complete`], or
/// as [`TransportError::Dropped`] if it is dropped unresolved.
#[derive(Debug)]
pub struct Completion {
    pending: Option<Pending>,
}

#[derive(Debug)]
struct Pending {
    client_id: ClientId,
    connection_id: ConnectionId,
    kind: MessageKind,
    summary: String,
    reports: broadcast::Sender<DeliveryReport>,
}

impl Completion {
    /// Create a completion that publishes to `reports`.
    pub fn new(
        client_id: ClientId,
        connection_id: ConnectionId,
        kind: MessageKind,
        summary: String,
        reports: broadcast::Sender<DeliveryReport>,
    ) -> Self {
        Self {
            pending: Some(Pending {
                client_id,
                connection_id,
                kind,
                summary,
                reports,
            }),
        }
    }

    /// Resolve with the transport outcome.
    pub fn complete(mut self, outcome: Result<(), TransportError>) {
        if let Some(pending) = self.pending.take() {
            pending.emit(outcome);
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.emit(Err(TransportError::Dropped));
        }
    }
}

impl Pending {
    fn emit(self, outcome: Result<(), TransportError>) {
        let kind = self.kind.as_str();
        match &outcome {
            Ok(()) => {
                counter!(DELIVERIES_TOTAL, "kind" => kind, "outcome" => "success").increment(1);
                info!(
                    client_id = %self.client_id,
                    connection_id = %self.connection_id,
                    kind,
                    summary = %self.summary,
                    "message delivered"
                );
            }
            Err(err) => {
                counter!(DELIVERIES_TOTAL, "kind" => kind, "outcome" => err.reason()).increment(1);
                warn!(
                    client_id = %self.client_id,
                    connection_id = %self.connection_id,
                    kind,
                    summary = %self.summary,
                    error = %err,
                    "message delivery failed"
                );
            }
        }

        // No subscribers is the normal case outside tests and admin tooling.
        let _ = self.reports.send(DeliveryReport {
            client_id: self.client_id,
            connection_id: self.connection_id,
            kind: self.kind,
            summary: self.summary,
            outcome,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_logging::capture_logs;
    use tracing::Level;

    fn make_completion(
        reports: &broadcast::Sender<DeliveryReport>,
    ) -> (Completion, ConnectionId) {
        let connection_id = ConnectionId::next();
        let completion = Completion::new(
            ClientId::new(1001),
            connection_id,
            MessageKind::Text,
            "ping".into(),
            reports.clone(),
        );
        (completion, connection_id)
    }

    #[test]
    fn success_publishes_report_and_logs() {
        let (logs, _guard) = capture_logs();
        let (tx, mut rx) = broadcast::channel(8);
        let (completion, connection_id) = make_completion(&tx);

        completion.complete(Ok(()));

        let report = rx.try_recv().unwrap();
        assert!(report.is_success());
        assert_eq!(report.client_id, ClientId::new(1001));
        assert_eq!(report.connection_id, connection_id);
        assert_eq!(report.summary, "ping");
        assert!(rx.try_recv().is_err());

        let delivered = logs.matching("message delivered", "client_id", "1001");
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].level, Level::INFO);
    }

    #[test]
    fn failure_logs_warning_with_reason() {
        let (logs, _guard) = capture_logs();
        let (tx, mut rx) = broadcast::channel(8);
        let (completion, _) = make_completion(&tx);

        completion.complete(Err(TransportError::Closed));

        let report = rx.try_recv().unwrap();
        assert_eq!(report.outcome, Err(TransportError::Closed));
        assert!(logs.has_event(Level::WARN, "message delivery failed"));
        assert!(!logs.has_event(Level::INFO, "message delivered"));
    }

    #[test]
    fn dropped_completion_reports_once() {
        let (tx, mut rx) = broadcast::channel(8);
        let (completion, _) = make_completion(&tx);

        drop(completion);

        let report = rx.try_recv().unwrap();
        assert_eq!(report.outcome, Err(TransportError::Dropped));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn completed_completion_does_not_report_on_drop() {
        let (tx, mut rx) = broadcast::channel(8);
        let (completion, _) = make_completion(&tx);

        completion.complete(Ok(()));

        assert!(rx.try_recv().unwrap().is_success());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn completing_without_subscribers_is_fine() {
        let (tx, rx) = broadcast::channel(8);
        drop(rx);
        let (completion, _) = make_completion(&tx);
        completion.complete(Ok(()));
    }
}
