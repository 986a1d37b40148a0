// ABOUTME: Client connection registry
// ABOUTME: Thread-safe map of connected clients keyed by opaque client id

use crate::error::Error;
use crate::protocol::frame::AudioFrame;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Opaque client identifier, assigned at registration.
///
/// Ids are monotonically increasing and never reused within one server
/// lifetime, so a stale id can never alias a newer connection.
pub type ClientId = u64;

/// A registered client connection
pub struct ClientEntry {
    /// Human-readable display name from the handshake (not unique)
    pub name: String,
    /// Bounded outbound frame queue, drained by the client's writer task
    tx: mpsc::Sender<AudioFrame>,
}

struct RegistryInner {
    clients: HashMap<ClientId, ClientEntry>,
    next_id: ClientId,
    closed: bool,
}

/// Registry of all live client connections.
///
/// The single shared mutable structure in the server. All mutations happen
/// under the write lock; broadcast fan-out reads a snapshot of cloned
/// senders so no network write ever happens with the lock held.
///
/// Worker join handles are tracked separately from the entries: a relay
/// removes its own entry on exit, and its tasks must stay joinable by
/// shutdown regardless.
pub struct ClientRegistry {
    inner: RwLock<RegistryInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ClientRegistry {
    /// Create an empty, open registry
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                clients: HashMap::new(),
                next_id: 1,
                closed: false,
            }),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Register a new client, returning its id.
    ///
    /// Fails only with [`Error::RegistryClosed`] once shutdown has begun.
    pub fn register(&self, name: String, tx: mpsc::Sender<AudioFrame>) -> crate::Result<ClientId> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(Error::RegistryClosed);
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.clients.insert(id, ClientEntry { name, tx });
        log::info!("Client {} registered, total clients: {}", id, inner.clients.len());
        Ok(id)
    }

    /// Record a client's spawned worker handles so shutdown can join them.
    ///
    /// Already-finished handles are reaped on each call, keeping the list
    /// bounded under connection churn.
    pub fn attach_workers(&self, relay: JoinHandle<()>, writer: JoinHandle<()>) {
        let mut workers = self.workers.lock();
        workers.retain(|handle| !handle.is_finished());
        workers.push(relay);
        workers.push(writer);
    }

    /// Remove a client. Idempotent: unknown or already-removed ids are a
    /// no-op, not an error.
    pub fn unregister(&self, id: ClientId) -> Option<ClientEntry> {
        let mut inner = self.inner.write();
        let entry = inner.clients.remove(&id);
        if let Some(ref e) = entry {
            log::info!(
                "Client {} ({}) removed, total clients: {}",
                id,
                e.name,
                inner.clients.len()
            );
        }
        entry
    }

    /// Consistent view of all live clients for broadcast iteration.
    ///
    /// Returns cloned senders; callers fan out without touching the lock.
    pub fn snapshot(&self) -> Vec<(ClientId, mpsc::Sender<AudioFrame>)> {
        let inner = self.inner.read();
        inner
            .clients
            .iter()
            .map(|(&id, entry)| (id, entry.tx.clone()))
            .collect()
    }

    /// Number of registered clients
    pub fn client_count(&self) -> usize {
        self.inner.read().clients.len()
    }

    /// Display names of all registered clients
    pub fn client_names(&self) -> Vec<String> {
        let inner = self.inner.read();
        inner.clients.values().map(|e| e.name.clone()).collect()
    }

    /// Whether shutdown has closed the registry
    pub fn is_closed(&self) -> bool {
        self.inner.read().closed
    }

    /// Close the registry: reject further registrations, drop every live
    /// entry (dropping a sender ends that client's writer task, which
    /// closes the connection) and hand back the worker handles so the
    /// caller can await full termination.
    pub fn close_all(&self) -> Vec<JoinHandle<()>> {
        let mut inner = self.inner.write();
        inner.closed = true;
        inner.clients.clear();
        drop(inner);

        let workers: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        if !workers.is_empty() {
            log::info!("Registry closed, waiting on {} worker tasks", workers.len());
        }
        workers
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}
