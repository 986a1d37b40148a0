// ABOUTME: Connection acceptor
// ABOUTME: Accept loop plus the per-connection identity handshake and registration

use crate::protocol::frame::read_name;
use crate::server::config::ServerConfig;
use crate::server::registry::ClientRegistry;
use crate::server::relay::spawn_client_workers;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};

/// Accept loop: runs until the shutdown signal flips, spawning a
/// short-lived admission task per inbound connection.
///
/// A single failed accept never terminates the loop; accept errors during
/// shutdown are expected (listener teardown) and suppressed.
pub(crate) async fn run_acceptor(
    listener: TcpListener,
    registry: Arc<ClientRegistry>,
    config: Arc<ServerConfig>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => match result {
                Ok((stream, addr)) => {
                    log::debug!("Connection from {}", addr);
                    let registry = registry.clone();
                    let config = config.clone();
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        admit_client(stream, registry, config, shutdown).await;
                    });
                }
                Err(e) => {
                    if *shutdown.borrow() {
                        break;
                    }
                    log::warn!("Accept failed: {}", e);
                }
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    log::info!("Acceptor stopped");
}

/// Handshake-pending state for one freshly accepted connection.
///
/// Reads the peer's display name under a bounded timeout. On success the
/// client is registered and its relay + writer workers spawned; on any
/// failure the connection is dropped without ever being registered.
async fn admit_client(
    mut stream: TcpStream,
    registry: Arc<ClientRegistry>,
    config: Arc<ServerConfig>,
    shutdown: watch::Receiver<bool>,
) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "<unknown>".to_string());

    let name = match tokio::time::timeout(config.handshake_timeout, read_name(&mut stream)).await {
        Ok(Ok(name)) => name,
        Ok(Err(e)) => {
            log::debug!("Handshake from {} failed: {}", peer, e);
            return;
        }
        Err(_) => {
            log::debug!("Handshake from {} timed out", peer);
            return;
        }
    };

    let (tx, rx) = mpsc::channel(config.send_queue_frames);
    let id = match registry.register(name.clone(), tx) {
        Ok(id) => id,
        Err(_) => {
            // Shutdown won the race; the connection is simply dropped.
            log::debug!("Rejecting {} ({}): registry closed", name, peer);
            return;
        }
    };

    log::info!("Client connected: {} (id {}, {})", name, id, peer);

    let (relay, writer) = spawn_client_workers(id, name, stream, rx, registry.clone(), shutdown);
    registry.attach_workers(relay, writer);
}
