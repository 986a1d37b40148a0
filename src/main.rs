// ABOUTME: Voxrelay client binary
// ABOUTME: Captures the microphone, streams to a relay server, plays back everyone else

use clap::Parser;
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use voxrelay::client::{open_capture_stream, open_playback_stream, AudioConfig, VoiceSession};
use voxrelay::server::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "voxrelay")]
#[command(author, version, about = "Voxrelay voice-chat client", long_about = None)]
struct Args {
    /// Relay server address
    #[arg(short, long, default_value = "127.0.0.1:8888")]
    server: SocketAddr,

    /// Display name; prompted for when omitted
    #[arg(short, long)]
    name: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn prompt_for_name() -> String {
    use std::io::Write;

    print!("Enter your username: ");
    let _ = std::io::stdout().flush();
    let mut name = String::new();
    let _ = std::io::stdin().read_line(&mut name);
    name.trim().to_string()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let name = match args.name {
        Some(name) => name,
        None => prompt_for_name(),
    };
    if name.is_empty() {
        eprintln!("A display name is required");
        std::process::exit(1);
    }

    let audio_config = AudioConfig::default();
    let (_capture_stream, capture_rx) = open_capture_stream(&audio_config)?;
    let (_playback_stream, playback_tx) = open_playback_stream(&audio_config)?;

    let session = VoiceSession::connect(args.server, &name).await?;
    println!("Connected to {} as {}", args.server, name);
    println!("Voice chat started. Press Enter to disconnect...");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut session_fut = std::pin::pin!(session.run(capture_rx, playback_tx, shutdown_rx));

    let mut stopped_by_user = false;
    tokio::select! {
        _ = &mut session_fut => {}
        _ = wait_for_enter() => {
            let _ = shutdown_tx.send(true);
            stopped_by_user = true;
        }
    }

    if stopped_by_user {
        // Let the session drain and close cleanly
        session_fut.await;
        println!("Voice chat stopped");
    } else {
        println!("Disconnected from server");
    }

    Ok(())
}

async fn wait_for_enter() {
    let mut line = String::new();
    let _ = BufReader::new(tokio::io::stdin()).read_line(&mut line).await;
}
