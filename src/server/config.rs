// ABOUTME: Server configuration
// ABOUTME: Defines configurable parameters for the relay server

use std::net::SocketAddr;
use std::time::Duration;

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Server name used in logs
    pub name: String,
    /// How long a new connection may take to send its display name
    pub handshake_timeout: Duration,
    /// Per-client outbound queue depth in frames; broadcasts to a client
    /// whose queue is full drop the frame for that client
    pub send_queue_frames: usize,
}

impl ServerConfig {
    /// Create a new server configuration with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the per-client outbound queue depth in frames
    pub fn send_queue_frames(mut self, frames: usize) -> Self {
        self.send_queue_frames = frames;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8888".parse().unwrap(),
            name: "Voxrelay Server".to_string(),
            handshake_timeout: Duration::from_secs(10),
            // ~680ms of audio at 1024 samples per frame, 48kHz
            send_queue_frames: 32,
        }
    }
}
