//! The authoritative set of live connections.
//!
//! Sessions register themselves here after the handshake and everything else
//! sees connections only through this map. The one internal lock is held for
//! map operations alone; anything that writes to a peer first takes a
//! [`Registry::snapshot`] and works outside the lock.

use std::{
    collections::BTreeMap,
    io,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::Mutex,
};
use tokio_util::sync::CancellationToken;

use crate::protocol;

/// Identifier of one connection, unique for the process lifetime.
pub type ConnId = u64;

/// Write half of a connection's transport, shareable across tasks. Boxed so
/// tests can register in-memory transports where sessions register TCP
/// halves.
pub type SharedWriter = Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>;

/// One registered participant: the display name from the handshake plus the
/// two handles other tasks may touch, the shared write half and the session's
/// cancellation token. The read half stays exclusively with the session task.
#[derive(Clone)]
pub struct Peer {
    pub id: ConnId,
    pub name: String,
    writer: SharedWriter,
    cancel: CancellationToken,
}

impl Peer {
    pub fn new(
        id: ConnId,
        name: impl Into<String>,
        writer: SharedWriter,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            writer,
            cancel,
        }
    }

    /// Writes one framed line to this peer. The caller decides what a
    /// failure means; broadcast discards them.
    pub async fn send_line(&self, text: &str) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        protocol::write_line(&mut *writer, text).await
    }

    /// Half-closes the transport so the peer sees EOF after everything
    /// already written to it.
    pub async fn close_transport(&self) {
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }

    /// Wakes the owning session out of its read so it runs its normal
    /// teardown.
    pub fn force_disconnect(&self) {
        self.cancel.cancel();
    }
}

pub struct Registry {
    peers: Mutex<BTreeMap<ConnId, Peer>>,
    next_id: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            peers: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Hands out the next connection id. Ids are never reused, so ascending
    /// id order doubles as arrival order.
    pub fn issue_id(&self) -> ConnId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Makes a peer visible to broadcasts and kicks.
    pub async fn register(&self, peer: Peer) {
        self.peers.lock().await.insert(peer.id, peer);
    }

    /// Removes a peer, returning its display name. An id that is already
    /// gone returns `None` and changes nothing; a kick and the session's own
    /// teardown race for this call, and exactly one of them wins.
    pub async fn unregister(&self, id: ConnId) -> Option<String> {
        self.peers.lock().await.remove(&id).map(|peer| peer.name)
    }

    /// First peer carrying `name`, in ascending-id order. With duplicate
    /// names the longest-connected holder is the match.
    pub async fn find_by_name(&self, name: &str) -> Option<Peer> {
        self.peers
            .lock()
            .await
            .values()
            .find(|peer| peer.name == name)
            .cloned()
    }

    /// Point-in-time copy of every peer, in ascending-id order, for
    /// iteration without the lock.
    pub async fn snapshot(&self) -> Vec<Peer> {
        self.peers.lock().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.peers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.peers.lock().await.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
