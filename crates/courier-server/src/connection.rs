//! Per-connection write path.
//!
//! Each accepted socket gets a bounded queue and a dedicated writer task.
//! [`ConnectionHandle::write`] only enqueues; the [`ConnectionWriter`]
//! writes frames in submission order and resolves each frame's
//! [`Completion`] after the flush.

use std::net::SocketAddr;

use bytes::Bytes;
use courier_core::{ConnectionId, TransportError};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::delivery::Completion;

/// A frame queued for writing, with its completion.
#[derive(Debug)]
pub struct WriteRequest {
    /// Encoded bytes to put on the wire.
    pub frame: Bytes,
    /// Resolved once the frame is flushed or fails.
    pub completion: Completion,
}

/// Cloneable handle to a live connection's write queue.
///
/// Handles are what the registry stores. Writing never blocks the caller.
#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    peer: SocketAddr,
    tx: mpsc::Sender<WriteRequest>,
    capacity: usize,
}

impl ConnectionHandle {
    /// Connection identity.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Remote address.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Queue capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the writer has stopped accepting frames.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Submit a frame.
    ///
    /// If the queue is full or the writer has stopped, `completion` is
    /// resolved immediately with [`TransportError::QueueFull`] or
    /// [`TransportError::Closed`].
    pub fn write(&self, frame: Bytes, completion: Completion) {
        match self.tx.try_send(WriteRequest { frame, completion }) {
            Ok(()) => {}
            Err(TrySendError::Full(request)) => {
                debug!(connection_id = %self.id, capacity = self.capacity, "write queue full");
                request.completion.complete(Err(TransportError::QueueFull {
                    capacity: self.capacity,
                }));
            }
            Err(TrySendError::Closed(request)) => {
                request.completion.complete(Err(TransportError::Closed));
            }
        }
    }
}

/// Create a handle and the receiving end for its writer.
///
/// A `capacity` of zero is raised to one.
pub fn connection_channel(
    peer: SocketAddr,
    capacity: usize,
) -> (ConnectionHandle, mpsc::Receiver<WriteRequest>) {
    let capacity = capacity.max(1);
    let (tx, rx) = mpsc::channel(capacity);
    let handle = ConnectionHandle {
        id: ConnectionId::next(),
        peer,
        tx,
        capacity,
    };
    (handle, rx)
}

/// Drains a connection's write queue into its socket.
pub struct ConnectionWriter<W> {
    connection_id: ConnectionId,
    writer: W,
    rx: mpsc::Receiver<WriteRequest>,
}

impl<W> ConnectionWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Create a writer over `writer` fed by `rx`.
    pub fn new(connection_id: ConnectionId, writer: W, rx: mpsc::Receiver<WriteRequest>) -> Self {
        Self {
            connection_id,
            writer,
            rx,
        }
    }

    /// Run until cancelled, all handles are dropped, or a write fails.
    ///
    /// On cancellation, frames already queued are still written before the
    /// write half is shut down. After an I/O failure the remaining queued
    /// frames resolve as [`TransportError::Closed`].
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    self.flush_queued().await;
                    break;
                }
                request = self.rx.recv() => match request {
                    Some(request) => {
                        if !self.write_one(request).await {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }

        self.rx.close();
        while let Ok(request) = self.rx.try_recv() {
            request.completion.complete(Err(TransportError::Closed));
        }
        if let Err(error) = self.writer.shutdown().await {
            debug!(connection_id = %self.connection_id, %error, "write half shutdown failed");
        }
        debug!(connection_id = %self.connection_id, "connection writer stopped");
    }

    async fn flush_queued(&mut self) {
        self.rx.close();
        while let Ok(request) = self.rx.try_recv() {
            if !self.write_one(request).await {
                return;
            }
        }
    }

    async fn write_one(&mut self, request: WriteRequest) -> bool {
        let WriteRequest { frame, completion } = request;
        let result = async {
            self.writer.write_all(&frame).await?;
            self.writer.flush().await
        }
        .await;

        match result {
            Ok(()) => {
                completion.complete(Ok(()));
                true
            }
            Err(error) => {
                debug!(connection_id = %self.connection_id, %error, "write failed");
                completion.complete(Err(error.into()));
                false
            }
        }
    }
}
