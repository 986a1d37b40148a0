// ABOUTME: Main relay server implementation
// ABOUTME: Owns the listener, acceptor and per-client workers; guarantees clean shutdown

use crate::error::Error;
use crate::server::acceptor::run_acceptor;
use crate::server::config::ServerConfig;
use crate::server::registry::ClientRegistry;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Server lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Constructed, socket not bound yet
    Created,
    /// Socket bound and listening, acceptor not yet running
    Initialized,
    /// Accept loop and relays active
    Running,
    /// Shutdown in progress
    Stopping,
    /// Fully stopped; all workers have terminated
    Stopped,
}

/// Voice relay server.
///
/// Owns the listening socket, the client registry and the shutdown signal.
/// One acceptor task plus two worker tasks per client run concurrently;
/// [`RelayServer::stop`] unblocks and joins all of them.
pub struct RelayServer {
    config: Arc<ServerConfig>,
    registry: Arc<ClientRegistry>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    acceptor: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
    state: ServerState,
}

impl RelayServer {
    /// Create a new relay server with default configuration
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Create a new relay server with custom configuration
    pub fn with_config(config: ServerConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            config: Arc::new(config),
            registry: Arc::new(ClientRegistry::new()),
            shutdown_tx,
            shutdown_rx,
            acceptor: None,
            local_addr: None,
            state: ServerState::Created,
        }
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the client registry
    pub fn registry(&self) -> Arc<ClientRegistry> {
        Arc::clone(&self.registry)
    }

    /// Number of currently registered clients
    pub fn client_count(&self) -> usize {
        self.registry.client_count()
    }

    /// Current lifecycle state
    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Address the listener is bound to, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Bind the listening socket and launch the acceptor.
    ///
    /// Returns the bound address (useful with a port-0 config). Binding
    /// failure is fatal; calling `start` on an already-running server is a
    /// no-op returning the existing address.
    pub async fn start(&mut self) -> crate::Result<SocketAddr> {
        if let Some(addr) = self.local_addr {
            log::warn!("start() called twice, server already on {}", addr);
            return Ok(addr);
        }

        let listener = TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(Error::Connect)?;
        let addr = listener.local_addr().map_err(Error::Connect)?;
        self.state = ServerState::Initialized;
        log::info!("{} listening on {}", self.config.name, addr);

        self.acceptor = Some(tokio::spawn(run_acceptor(
            listener,
            self.registry.clone(),
            self.config.clone(),
            self.shutdown_rx.clone(),
        )));
        self.local_addr = Some(addr);
        self.state = ServerState::Running;
        Ok(addr)
    }

    /// Stop the server and wait for every worker to terminate.
    ///
    /// Flips the shutdown signal (unblocking the acceptor's pending accept
    /// and every relay's pending read), closes the registry and every live
    /// connection, then joins the acceptor and all client workers. Safe to
    /// call more than once and safe when relays have already
    /// self-terminated.
    pub async fn stop(&mut self) {
        if self.state == ServerState::Stopped {
            return;
        }
        self.state = ServerState::Stopping;
        log::info!("Stopping server");

        let _ = self.shutdown_tx.send(true);

        // Joining the acceptor first guarantees the listening socket is
        // closed before client teardown begins.
        if let Some(acceptor) = self.acceptor.take() {
            let _ = acceptor.await;
        }

        for worker in self.registry.close_all() {
            let _ = worker.await;
        }

        self.state = ServerState::Stopped;
        log::info!("Server stopped");
    }
}

impl Default for RelayServer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback_config() -> ServerConfig {
        ServerConfig::new("test").bind_addr("127.0.0.1:0".parse().unwrap())
    }

    #[tokio::test]
    async fn start_reports_bound_address() {
        let mut server = RelayServer::with_config(loopback_config());
        let addr = server.start().await.unwrap();

        assert_ne!(addr.port(), 0);
        assert_eq!(server.state(), ServerState::Running);
        server.stop().await;
        assert_eq!(server.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let mut server = RelayServer::with_config(loopback_config());
        server.start().await.unwrap();
        server.stop().await;
        server.stop().await;

        assert_eq!(server.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn stop_without_start_is_safe() {
        let mut server = RelayServer::with_config(loopback_config());
        server.stop().await;

        assert_eq!(server.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn double_start_returns_same_address() {
        let mut server = RelayServer::with_config(loopback_config());
        let first = server.start().await.unwrap();
        let second = server.start().await.unwrap();

        assert_eq!(first, second);
        server.stop().await;
    }

    #[tokio::test]
    async fn bind_failure_is_fatal() {
        let mut holder = RelayServer::with_config(loopback_config());
        let addr = holder.start().await.unwrap();

        let mut server = RelayServer::with_config(ServerConfig::new("clash").bind_addr(addr));
        assert!(server.start().await.is_err());

        holder.stop().await;
    }
}
