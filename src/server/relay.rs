// ABOUTME: Per-client relay workers
// ABOUTME: Receive loop broadcasting frames to peers, and the writer task draining the outbound queue

use crate::protocol::frame::{read_frame, write_frame, AudioFrame};
use crate::server::registry::{ClientId, ClientRegistry};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Split a registered client's connection and spawn its two workers:
/// the relay (receive loop) and the writer (outbound queue drain).
pub(crate) fn spawn_client_workers(
    id: ClientId,
    name: String,
    stream: TcpStream,
    rx: mpsc::Receiver<AudioFrame>,
    registry: Arc<ClientRegistry>,
    shutdown: watch::Receiver<bool>,
) -> (JoinHandle<()>, JoinHandle<()>) {
    let (read_half, write_half) = stream.into_split();
    let writer = tokio::spawn(run_writer(id, write_half, rx, shutdown.clone()));
    let relay = tokio::spawn(run_relay(id, name, read_half, registry, shutdown));
    (relay, writer)
}

/// Drain the client's outbound queue onto its socket.
///
/// Exits when the queue's last sender is dropped (unregistration or
/// shutdown), on the first failed write, or on server shutdown — even
/// mid-write, so a stalled recipient cannot delay stop. Dropping the
/// write half then closes the connection, so a recipient that cannot
/// accept frames converges to a plain disconnect.
pub(crate) async fn run_writer<W>(
    id: ClientId,
    mut write_half: W,
    mut rx: mpsc::Receiver<AudioFrame>,
    mut shutdown: watch::Receiver<bool>,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let frame = tokio::select! {
            maybe_frame = rx.recv() => match maybe_frame {
                Some(frame) => frame,
                None => break,
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        };

        tokio::select! {
            result = write_frame(&mut write_half, &frame) => {
                if let Err(e) = result {
                    log::debug!("Client {} write failed, closing connection: {}", id, e);
                    break;
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

/// Receive loop for one client: read one frame at a time and fan it out to
/// every other registered client.
///
/// Delivery is best-effort per recipient: a full queue drops the frame for
/// that recipient only, a closed queue means the recipient is on its way
/// out. Neither aborts delivery to the rest nor this loop.
///
/// Exits on orderly close, read error or server shutdown. Unregistering
/// its own entry on the way out is the sole removal path, so removal
/// happens only after this loop has stopped reading.
pub(crate) async fn run_relay<R>(
    id: ClientId,
    name: String,
    mut read_half: R,
    registry: Arc<ClientRegistry>,
    mut shutdown: watch::Receiver<bool>,
) where
    R: AsyncRead + Unpin,
{
    loop {
        tokio::select! {
            result = read_frame(&mut read_half) => match result {
                Ok(Some(frame)) => broadcast(id, frame, &registry),
                Ok(None) => {
                    log::info!("Client {} ({}) disconnected", id, name);
                    break;
                }
                Err(e) => {
                    log::warn!("Client {} ({}) read error: {}", id, name, e);
                    break;
                }
            },
            changed = shutdown.changed() => {
                // A dropped sender means the server itself is gone
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    registry.unregister(id);
}

/// Send one frame to every registered client except the sender.
fn broadcast(sender: ClientId, frame: AudioFrame, registry: &ClientRegistry) {
    for (id, tx) in registry.snapshot() {
        if id == sender {
            continue;
        }
        match tx.try_send(frame.clone()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::debug!("Client {} outbound queue full, frame dropped", id);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                // Recipient is mid-teardown; its entry disappears shortly.
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::{FRAME_BYTES, SAMPLES_PER_FRAME};

    fn frame_of(value: f32) -> AudioFrame {
        vec![value; SAMPLES_PER_FRAME].into()
    }

    #[tokio::test]
    async fn broadcast_skips_the_sender() {
        let registry = ClientRegistry::new();
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        let a = registry.register("a".to_string(), tx_a).unwrap();
        registry.register("b".to_string(), tx_b).unwrap();

        broadcast(a, frame_of(0.5), &registry);

        assert!(rx_a.try_recv().is_err());
        let got = rx_b.try_recv().unwrap();
        assert_eq!(got[0], 0.5);
    }

    #[tokio::test]
    async fn full_queue_drops_frame_for_that_recipient_only() {
        let registry = ClientRegistry::new();
        let (tx_a, _rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(1);
        let (tx_c, mut rx_c) = mpsc::channel(4);
        let a = registry.register("a".to_string(), tx_a).unwrap();
        registry.register("b".to_string(), tx_b).unwrap();
        registry.register("c".to_string(), tx_c).unwrap();

        // Fill b's queue, then broadcast twice more
        broadcast(a, frame_of(1.0), &registry);
        broadcast(a, frame_of(2.0), &registry);
        broadcast(a, frame_of(3.0), &registry);

        // b only got the first frame
        assert_eq!(rx_b.try_recv().unwrap()[0], 1.0);
        assert!(rx_b.try_recv().is_err());

        // c got all three, in order
        assert_eq!(rx_c.try_recv().unwrap()[0], 1.0);
        assert_eq!(rx_c.try_recv().unwrap()[0], 2.0);
        assert_eq!(rx_c.try_recv().unwrap()[0], 3.0);
    }

    #[tokio::test]
    async fn relay_unregisters_itself_on_orderly_close() {
        let registry = Arc::new(ClientRegistry::new());
        let (tx, _rx) = mpsc::channel(4);
        let id = registry.register("a".to_string(), tx).unwrap();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let (peer, reader) = tokio::io::duplex(FRAME_BYTES);
        drop(peer); // immediate orderly close

        run_relay(id, "a".to_string(), reader, registry.clone(), shutdown_rx).await;

        assert_eq!(registry.client_count(), 0);
    }

    #[tokio::test]
    async fn relay_exits_on_shutdown_signal() {
        let registry = Arc::new(ClientRegistry::new());
        let (tx, _rx) = mpsc::channel(4);
        let id = registry.register("a".to_string(), tx).unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Peer held open: the read blocks until the signal arrives
        let (_peer, reader) = tokio::io::duplex(FRAME_BYTES);
        let handle = tokio::spawn(run_relay(
            id,
            "a".to_string(),
            reader,
            registry.clone(),
            shutdown_rx,
        ));

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("relay did not stop on shutdown")
            .unwrap();

        assert_eq!(registry.client_count(), 0);
    }

    #[tokio::test]
    async fn writer_stops_after_senders_drop() {
        let (tx, rx) = mpsc::channel::<AudioFrame>(4);
        let (mut peer, writer_half) = tokio::io::duplex(FRAME_BYTES * 4);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(run_writer(1, writer_half, rx, shutdown_rx));

        tx.send(frame_of(0.25)).await.unwrap();
        drop(tx);

        handle.await.unwrap();

        // The queued frame made it onto the wire before the writer stopped
        let frame = read_frame(&mut peer).await.unwrap().unwrap();
        assert_eq!(frame[0], 0.25);
        // And the writer's half is now closed
        assert!(read_frame(&mut peer).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn relay_exits_when_shutdown_sender_is_dropped() {
        let registry = Arc::new(ClientRegistry::new());
        let (tx, _rx) = mpsc::channel(4);
        let id = registry.register("a".to_string(), tx).unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Peer held open: the read never completes on its own
        let (_peer, reader) = tokio::io::duplex(FRAME_BYTES);
        let handle = tokio::spawn(run_relay(
            id,
            "a".to_string(),
            reader,
            registry.clone(),
            shutdown_rx,
        ));

        drop(shutdown_tx);
        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("relay kept running after the shutdown sender went away")
            .unwrap();

        assert_eq!(registry.client_count(), 0);
    }

    #[tokio::test]
    async fn writer_exits_when_shutdown_sender_is_dropped() {
        let (_tx, rx) = mpsc::channel::<AudioFrame>(4);
        let (_peer, writer_half) = tokio::io::duplex(FRAME_BYTES);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(run_writer(1, writer_half, rx, shutdown_rx));

        drop(shutdown_tx);
        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("writer kept running after the shutdown sender went away")
            .unwrap();
    }

    #[tokio::test]
    async fn writer_exits_on_shutdown_while_blocked_mid_write() {
        let (tx, rx) = mpsc::channel::<AudioFrame>(4);
        // Buffer far smaller than one frame: the write stalls until the
        // peer reads, and the peer never reads.
        let (_peer, writer_half) = tokio::io::duplex(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(run_writer(1, writer_half, rx, shutdown_rx));
        tx.send(frame_of(0.5)).await.unwrap();

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("writer stayed blocked on a stalled peer through shutdown")
            .unwrap();
    }
}
