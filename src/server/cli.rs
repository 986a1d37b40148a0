// ABOUTME: Shared CLI argument parsing and server builder utilities
// ABOUTME: Maps command-line flags onto ServerConfig for the server binary

use crate::server::ServerConfig;
use clap::Args;
use std::net::SocketAddr;
use std::time::Duration;

/// Common server arguments
///
/// Use with `#[command(flatten)]` in your binary's Args struct:
/// ```ignore
/// #[derive(Parser)]
/// struct MyArgs {
///     #[command(flatten)]
///     server: ServerArgs,
/// }
/// ```
#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Address to bind the server to
    #[arg(short, long, default_value = "0.0.0.0:8888")]
    pub bind: SocketAddr,

    /// Server name
    #[arg(short, long, default_value = "Voxrelay Server")]
    pub name: String,

    /// Handshake timeout in seconds
    #[arg(long, default_value = "10")]
    pub handshake_timeout_secs: u64,

    /// Per-client outbound queue depth in frames
    #[arg(long, default_value = "32")]
    pub queue_frames: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Initialize tracing based on a verbosity flag.
///
/// `RUST_LOG` takes precedence over the flag when set. Shared by both
/// binaries so the client and server log the same way.
pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter = if verbose {
        "voxrelay=debug"
    } else {
        "voxrelay=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

impl ServerArgs {
    /// Initialize tracing based on the verbosity flag
    pub fn init_tracing(&self) {
        init_tracing(self.verbose);
    }

    /// Log startup information
    pub fn log_startup_info(&self) {
        tracing::info!("Voxrelay Server v{}", env!("CARGO_PKG_VERSION"));
        tracing::info!("Bind: {}", self.bind);
    }

    /// Build ServerConfig from these args
    pub fn build_config(&self) -> ServerConfig {
        ServerConfig::new(&self.name)
            .bind_addr(self.bind)
            .handshake_timeout(Duration::from_secs(self.handshake_timeout_secs))
            .send_queue_frames(self.queue_frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let args = ServerArgs {
            bind: "0.0.0.0:8888".parse().unwrap(),
            name: "Test Server".to_string(),
            handshake_timeout_secs: 10,
            queue_frames: 32,
            verbose: false,
        };

        assert_eq!(args.bind.port(), 8888);
        assert_eq!(args.queue_frames, 32);
    }

    #[test]
    fn test_build_config() {
        let args = ServerArgs {
            bind: "127.0.0.1:9000".parse().unwrap(),
            name: "Custom Server".to_string(),
            handshake_timeout_secs: 3,
            queue_frames: 8,
            verbose: false,
        };

        let config = args.build_config();
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.handshake_timeout, Duration::from_secs(3));
        assert_eq!(config.send_queue_frames, 8);
    }
}
