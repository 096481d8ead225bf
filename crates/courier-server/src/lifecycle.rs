//! Listener lifecycle: bind, accept, and graceful stop.
//!
//! ```text
//! Stopped ──start()──▶ Starting ──bind ok──▶ Running ──stop()──▶ Stopping ──drained──▶ Stopped
//!                          │
//!                          └──bind failed / stop() during bind──▶ Stopped
//! ```
//!
//! The listening socket is created with `SO_REUSEADDR` and `SO_KEEPALIVE`;
//! accepted sockets inherit keepalive from it and also get `TCP_NODELAY`.
//! Each accepted socket gets a writer task and is handed to the configured
//! [`ConnectionHandler`]. All of these run on one [`ShutdownCoordinator`]
//! per start, so `stop()` returns only after every one of them has exited.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use courier_core::{CourierError, Result, ServerState};
use metrics::{counter, gauge};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::connection::{ConnectionWriter, connection_channel};
use crate::dispatcher::Dispatcher;
use crate::handler::{AcceptedConnection, ConnectionHandler};
use crate::metrics::{ACCEPT_ERRORS_TOTAL, CONNECTIONS_ACCEPTED_TOTAL, CONNECTIONS_ACTIVE};
use crate::registry::ConnectionRegistry;
use crate::shutdown::ShutdownCoordinator;

/// Pause after a failed accept so persistent errors (fd exhaustion) do not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

const LISTEN_BACKLOG: u32 = 1024;

/// Owns the listening socket and every task serving it.
pub struct ServerLifecycle {
    config: ServerConfig,
    handler: Arc<dyn ConnectionHandler>,
    registry: Arc<ConnectionRegistry>,
    dispatcher: Dispatcher,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    state: ServerState,
    generation: u64,
    local_addr: Option<SocketAddr>,
    shutdown: Option<ShutdownCoordinator>,
}

impl ServerLifecycle {
    /// Create a stopped server with its own empty registry.
    pub fn new(config: ServerConfig, handler: Arc<dyn ConnectionHandler>) -> Self {
        Self::with_registry(config, ConnectionRegistry::shared(), handler)
    }

    /// Create a stopped server over an existing registry.
    pub fn with_registry(
        config: ServerConfig,
        registry: Arc<ConnectionRegistry>,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Self {
        let dispatcher = Dispatcher::new(Arc::clone(&registry));
        Self {
            config,
            handler,
            registry,
            dispatcher,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Client registry shared with handlers.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// The dispatcher over this server's registry.
    ///
    /// Every call returns a clone of the same dispatcher, so report
    /// subscribers see writes submitted through any of them.
    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServerState {
        self.inner.lock().state
    }

    /// Bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.lock().local_addr
    }

    /// Bind the listener and begin accepting.
    ///
    /// Returns the bound address. Only valid from `Stopped`; a bind failure
    /// returns [`CourierError::Bind`] and leaves the server `Stopped`.
    pub async fn start(&self) -> Result<SocketAddr> {
        let (generation, shutdown) = {
            let mut inner = self.inner.lock();
            if inner.state != ServerState::Stopped {
                return Err(CourierError::InvalidState {
                    state: inner.state,
                    operation: "start",
                });
            }
            inner.state = ServerState::Starting;
            inner.generation += 1;
            let shutdown = ShutdownCoordinator::new();
            inner.shutdown = Some(shutdown.clone());
            (inner.generation, shutdown)
        };

        let port = self.config.port;
        let bound = bind_listener(&self.config.host, port)
            .await
            .and_then(|listener| listener.local_addr().map(|addr| (listener, addr)));
        let (listener, local_addr) = match bound {
            Ok(bound) => bound,
            Err(source) => {
                error!(host = %self.config.host, port, error = %source, "failed to bind listener");
                self.reset_if_current(generation);
                return Err(CourierError::Bind { port, source });
            }
        };

        let mut inner = self.inner.lock();
        if inner.generation != generation || shutdown.is_shutting_down() {
            drop(inner);
            info!(port, "stop requested during bind, closing listener");
            self.reset_if_current(generation);
            return Err(CourierError::StartAborted { port });
        }

        let acceptor = Acceptor {
            listener,
            handler: Arc::clone(&self.handler),
            registry: Arc::clone(&self.registry),
            send_queue_capacity: self.config.send_queue_capacity,
            shutdown: shutdown.clone(),
        };
        let _ = shutdown.tracker().spawn(acceptor.run());
        inner.state = ServerState::Running;
        inner.local_addr = Some(local_addr);
        drop(inner);

        info!(%local_addr, "courier server listening");
        Ok(local_addr)
    }

    /// Stop accepting, close every connection, and wait for all server
    /// tasks to exit.
    ///
    /// A no-op when already `Stopped`. Concurrent calls all return once
    /// the drain completes.
    pub async fn stop(&self) {
        let (generation, shutdown) = {
            let mut inner = self.inner.lock();
            if inner.state == ServerState::Stopped {
                return;
            }
            inner.state = ServerState::Stopping;
            if let Some(shutdown) = &inner.shutdown {
                shutdown.shutdown();
            }
            (inner.generation, inner.shutdown.clone())
        };

        info!("stopping courier server");
        if let Some(shutdown) = shutdown {
            shutdown.drain().await;
        }

        {
            let mut inner = self.inner.lock();
            if inner.generation == generation && inner.state == ServerState::Stopping {
                inner.state = ServerState::Stopped;
                inner.local_addr = None;
                inner.shutdown = None;
            }
        }
        info!("courier server stopped");
    }

    fn reset_if_current(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.generation == generation {
            inner.state = ServerState::Stopped;
            inner.local_addr = None;
            inner.shutdown = None;
        }
    }
}

impl std::fmt::Debug for ServerLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerLifecycle")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("registered", &self.registry.len())
            .finish_non_exhaustive()
    }
}

async fn bind_listener(host: &str, port: u16) -> io::Result<TcpListener> {
    let mut last_error = None;
    for addr in tokio::net::lookup_host((host, port)).await? {
        match listener_socket(addr).and_then(|socket| socket.listen(LISTEN_BACKLOG)) {
            Ok(listener) => return Ok(listener),
            Err(error) => {
                debug!(%addr, %error, "bind attempt failed");
                last_error = Some(error);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("{host} resolved to no addresses"),
        )
    }))
}

fn listener_socket(addr: SocketAddr) -> io::Result<TcpSocket> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.set_keepalive(true)?;
    socket.bind(addr)?;
    Ok(socket)
}

struct Acceptor {
    listener: TcpListener,
    handler: Arc<dyn ConnectionHandler>,
    registry: Arc<ConnectionRegistry>,
    send_queue_capacity: usize,
    shutdown: ShutdownCoordinator,
}

impl Acceptor {
    async fn run(self) {
        let token = self.shutdown.token();
        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.spawn_connection(stream, peer),
                    Err(error) => {
                        counter!(ACCEPT_ERRORS_TOTAL).increment(1);
                        warn!(%error, "accept failed");
                        tokio::select! {
                            () = token.cancelled() => break,
                            () = tokio::time::sleep(ACCEPT_ERROR_BACKOFF) => {}
                        }
                    }
                },
            }
        }
        debug!("acceptor stopped");
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr) {
        if let Err(error) = stream.set_nodelay(true) {
            debug!(%peer, %error, "failed to set TCP_NODELAY");
        }
        counter!(CONNECTIONS_ACCEPTED_TOTAL).increment(1);

        let ctx = ConnectionContext {
            handler: Arc::clone(&self.handler),
            registry: Arc::clone(&self.registry),
            send_queue_capacity: self.send_queue_capacity,
            shutdown: self.shutdown.clone(),
        };
        let _ = self.shutdown.tracker().spawn(ctx.serve(stream, peer));
    }
}

struct ConnectionContext {
    handler: Arc<dyn ConnectionHandler>,
    registry: Arc<ConnectionRegistry>,
    send_queue_capacity: usize,
    shutdown: ShutdownCoordinator,
}

impl ConnectionContext {
    async fn serve(self, stream: TcpStream, peer: SocketAddr) {
        let (reader, writer) = stream.into_split();
        let (handle, rx) = connection_channel(peer, self.send_queue_capacity);
        let connection_id = handle.id();
        gauge!(CONNECTIONS_ACTIVE).increment(1.0);
        debug!(%peer, %connection_id, "connection accepted");

        let close = self.shutdown.token().child_token();
        let writer_task = self
            .shutdown
            .tracker()
            .spawn(ConnectionWriter::new(connection_id, writer, rx).run(close.clone()));

        self.handler
            .handle(AcceptedConnection {
                handle,
                reader,
                peer,
                registry: self.registry,
                shutdown: self.shutdown.token(),
            })
            .await;

        close.cancel();
        if let Err(error) = writer_task.await {
            warn!(%connection_id, %error, "connection writer task failed");
        }
        gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
        debug!(%peer, %connection_id, "connection closed");
    }
}
