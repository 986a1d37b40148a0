// ABOUTME: Main library entry point for voxrelay
// ABOUTME: Exports public API for the voice relay server and client

//! # voxrelay
//!
//! Minimal real-time voice-chat relay. Clients capture microphone audio,
//! stream it to a central server as raw little-endian `f32` PCM frames, and
//! the server forwards each client's stream to every other connected client.
//!
//! The wire protocol is deliberately tiny: the first bytes a connection
//! sends are its UTF-8 display name, everything after that is audio. There
//! is no compression, no framing headers, no authentication and no rooms.
//!
//! ## Example: Running a Server
//!
//! ```no_run
//! use voxrelay::server::{RelayServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig::new("My Relay")
//!         .bind_addr("0.0.0.0:8888".parse().unwrap());
//!
//!     let mut server = RelayServer::with_config(config);
//!     server.start().await.unwrap();
//!     tokio::signal::ctrl_c().await.unwrap();
//!     server.stop().await;
//! }
//! ```

#![warn(missing_docs)]

/// Client implementation: audio device wiring and the relay session
pub mod client;
/// Wire protocol: fixed-size PCM frames and the name handshake
pub mod protocol;
/// Server implementation: registry, acceptor, relay workers, lifecycle
pub mod server;

pub use protocol::frame::{AudioFrame, CHANNELS, FRAMES_PER_BUFFER, SAMPLE_RATE};
pub use server::{RelayServer, ServerConfig};

/// Result type for voxrelay operations
pub type Result<T> = std::result::Result<T, error::Error>;

/// Error types for voxrelay
pub mod error {
    use thiserror::Error;

    /// Error types for voxrelay operations
    #[derive(Error, Debug)]
    pub enum Error {
        /// Socket create/bind/listen/connect error; fatal at startup
        #[error("connection error: {0}")]
        Connect(#[source] std::io::Error),

        /// Peer failed to identify itself before streaming audio
        #[error("handshake error: {0}")]
        Handshake(String),

        /// Registration refused because the server is shutting down
        #[error("registry is closed")]
        RegistryClosed,

        /// Audio device error on the client side
        #[error("audio device error: {0}")]
        Audio(String),
    }
}
