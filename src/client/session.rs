// ABOUTME: Client network session
// ABOUTME: Connects, identifies, then pumps frames uplink and downlink concurrently

use crate::error::Error;
use crate::protocol::frame::{read_frame, write_frame, write_name, AudioFrame};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};

/// An established session with a relay server.
///
/// Created by [`VoiceSession::connect`], which performs the name
/// handshake; [`VoiceSession::run`] then pumps frames both ways until the
/// server goes away or shutdown is requested.
pub struct VoiceSession {
    stream: TcpStream,
    name: String,
}

impl VoiceSession {
    /// Connect to the server and send the display name as the first bytes
    /// on the wire.
    pub async fn connect(server: SocketAddr, name: &str) -> crate::Result<Self> {
        let mut stream = TcpStream::connect(server).await.map_err(Error::Connect)?;
        write_name(&mut stream, name).await?;
        log::info!("Connected to {} as {}", server, name.trim());
        Ok(Self {
            stream,
            name: name.trim().to_string(),
        })
    }

    /// The display name this session identified with
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pump frames until the connection ends or shutdown flips.
    ///
    /// Uplink moves captured frames from `capture_rx` onto the socket;
    /// downlink moves received frames into `playback_tx`, dropping frames
    /// when the playback queue is full rather than stalling the read loop.
    pub async fn run(
        self,
        mut capture_rx: mpsc::Receiver<AudioFrame>,
        playback_tx: mpsc::Sender<AudioFrame>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let (mut read_half, mut write_half) = self.stream.into_split();

        let uplink = tokio::spawn(async move {
            while let Some(frame) = capture_rx.recv().await {
                if let Err(e) = write_frame(&mut write_half, &frame).await {
                    log::warn!("Uplink write failed: {}", e);
                    break;
                }
            }
        });

        loop {
            tokio::select! {
                result = read_frame(&mut read_half) => match result {
                    Ok(Some(frame)) => {
                        if playback_tx.try_send(frame).is_err() {
                            log::debug!("Playback queue full, frame dropped");
                        }
                    }
                    Ok(None) => {
                        log::info!("Server closed the connection");
                        break;
                    }
                    Err(e) => {
                        log::warn!("Downlink read error: {}", e);
                        break;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        uplink.abort();
        let _ = uplink.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::read_name;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connect_sends_name_first() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_name(&mut socket).await.unwrap()
        });

        let session = VoiceSession::connect(addr, "mic-check").await.unwrap();
        assert_eq!(session.name(), "mic-check");
        assert_eq!(accept.await.unwrap(), "mic-check");
    }

    #[tokio::test]
    async fn run_exits_when_shutdown_sender_is_dropped() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            // Hold the connection open so the downlink read blocks
            std::future::pending::<()>().await;
        });

        let session = VoiceSession::connect(addr, "drifter").await.unwrap();
        let (_capture_tx, capture_rx) = mpsc::channel(4);
        let (playback_tx, _playback_rx) = mpsc::channel(4);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(session.run(capture_rx, playback_tx, shutdown_rx));

        drop(shutdown_tx);
        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("session kept running after the shutdown sender went away")
            .unwrap();

        server.abort();
    }

    #[tokio::test]
    async fn connect_to_nothing_fails() {
        // Port 1 on loopback is virtually never listening
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        assert!(matches!(
            VoiceSession::connect(addr, "nobody").await,
            Err(Error::Connect(_))
        ));
    }
}
