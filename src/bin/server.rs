// ABOUTME: Voxrelay server binary
// ABOUTME: Standalone relay server; press Enter (or Ctrl+C) to stop

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use voxrelay::server::{RelayServer, ServerArgs};

#[derive(Parser, Debug)]
#[command(name = "voxrelay-server")]
#[command(author, version, about = "Voxrelay voice-chat relay server", long_about = None)]
struct Args {
    #[command(flatten)]
    server: ServerArgs,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    args.server.init_tracing();
    args.server.log_startup_info();

    let config = args.server.build_config();
    let mut server = RelayServer::with_config(config);
    server.start().await?;

    // Periodically report connected clients
    let registry = server.registry();
    let report_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(5));
        loop {
            interval.tick().await;
            let count = registry.client_count();
            if count > 0 {
                tracing::info!("Connected clients: {}", count);
                for name in registry.client_names() {
                    tracing::info!("  - {}", name);
                }
            }
        }
    });

    println!("Voice relay running. Press Enter to stop...");
    tokio::select! {
        _ = wait_for_enter() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal");
        }
    }

    report_task.abort();
    server.stop().await;
    println!("Server stopped");
    Ok(())
}

async fn wait_for_enter() {
    let mut line = String::new();
    let _ = BufReader::new(tokio::io::stdin()).read_line(&mut line).await;
}
