//! Inbound side of an accepted connection.
//!
//! The server owns the outbound write path; everything a client sends is
//! handed to a [`ConnectionHandler`]. The handler is where a handshake
//! identifies the client and binds it in the registry.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::connection::ConnectionHandle;
use crate::registry::ConnectionRegistry;

/// Everything a handler gets for one accepted socket.
#[derive(Debug)]
pub struct AcceptedConnection {
    /// Write handle; register it to make the client addressable.
    pub handle: ConnectionHandle,
    /// Read half of the socket.
    pub reader: OwnedReadHalf,
    /// Remote address.
    pub peer: SocketAddr,
    /// Shared client registry.
    pub registry: Arc<ConnectionRegistry>,
    /// Cancelled when the server is stopping.
    pub shutdown: CancellationToken,
}

/// Drives the inbound half of a connection.
///
/// The connection stays open until `handle` returns. Any registry entry
/// the handler created should be removed before returning, preferably with
/// [`ConnectionRegistry::deregister_if`].
#[async_trait]
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Serve one connection.
    async fn handle(&self, conn: AcceptedConnection);
}

/// Reads and discards inbound bytes until EOF or shutdown.
///
/// Never registers anything; clients accepted under this handler cannot be
/// addressed until some other component binds them.
#[derive(Clone, Copy, Debug, Default)]
pub struct DrainHandler;

#[async_trait]
impl ConnectionHandler for DrainHandler {
    async fn handle(&self, conn: AcceptedConnection) {
        let AcceptedConnection {
            handle,
            mut reader,
            peer,
            shutdown,
            ..
        } = conn;
        let mut buf = [0u8; 4096];
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                read = reader.read(&mut buf) => match read {
                    Ok(0) => {
                        debug!(%peer, connection_id = %handle.id(), "peer closed connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(error) => {
                        debug!(%peer, connection_id = %handle.id(), %error, "read failed");
                        break;
                    }
                },
            }
        }
    }
}
