//! The relay core: shared state for the broadcast path, and the accept loop
//! that turns incoming connections into session tasks.

use std::{future::Future, net::SocketAddr, sync::Arc};

use anyhow::Result;
use tokio::{
    net::{TcpListener, TcpStream},
    select,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, warn};

use crate::{
    journal::{minute_stamp, Journal},
    protocol,
    registry::{ConnId, Registry},
    session,
};

/// Everything sessions share: the connection registry, the event journal and
/// the broadcast path over them.
pub struct RelayState {
    pub registry: Registry,
    pub journal: Journal,
}

impl RelayState {
    pub fn new(journal: Journal) -> Self {
        Self {
            registry: Registry::new(),
            journal,
        }
    }

    /// Best-effort delivery of one already-formatted line to every peer in a
    /// fresh snapshot, except `exclude`. The registry lock is released before
    /// the first write. A peer that fails to take the line keeps its registry
    /// entry; its own session notices the dead transport and tears it down.
    pub async fn broadcast(&self, line: &str, exclude: Option<ConnId>) {
        let peers = self.registry.snapshot().await;
        for peer in peers {
            if Some(peer.id) == exclude {
                continue;
            }
            if let Err(error) = peer.send_line(line).await {
                debug!(peer = peer.id, ?error, "failed to deliver a line");
            }
        }
    }

    /// Journals an event and broadcasts its stamped form. Every join, chat
    /// message, departure and kick goes through here, so the journal and the
    /// wire always carry the same text.
    pub async fn announce(&self, text: &str, exclude: Option<ConnId>) {
        self.journal.log(text).await;
        let line = format!("{} {text}", minute_stamp());
        self.broadcast(&line, exclude).await;
    }
}

/// Owns the listener and the session tasks spawned from it.
pub struct Relay {
    listener: TcpListener,
    state: Arc<RelayState>,
}

impl Relay {
    pub fn new(listener: TcpListener, journal: Journal) -> Self {
        Self {
            listener,
            state: Arc::new(RelayState::new(journal)),
        }
    }

    /// Address the listener actually bound, for when port 0 asked the OS to
    /// pick one.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until `shutdown` resolves, then cancels every
    /// live session and waits for each to finish its teardown before
    /// returning.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let Relay { listener, state } = self;
        let port = listener.local_addr()?.port();
        state.journal.log(&protocol::server_started(port)).await;

        let stop = CancellationToken::new();
        let sessions = TaskTracker::new();
        tokio::pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => {
                    accept_connection(accepted, &state, &stop, &sessions).await;
                }
            }
        }

        stop.cancel();
        sessions.close();
        sessions.wait().await;
        Ok(())
    }

    /// [`Relay::run_until`] wired to ctrl-c.
    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                warn!(?error, "failed to listen for ctrl-c");
            }
        })
        .await
    }
}

async fn accept_connection(
    accepted: std::io::Result<(TcpStream, SocketAddr)>,
    state: &Arc<RelayState>,
    stop: &CancellationToken,
    sessions: &TaskTracker,
) {
    match accepted {
        Ok((stream, peer_addr)) => {
            state
                .journal
                .log(&protocol::connection_from(peer_addr.ip()))
                .await;
            let state = Arc::clone(state);
            let cancel = stop.child_token();
            sessions.spawn(session::run(stream, peer_addr, state, cancel));
        }
        Err(error) => {
            // One failed accept is journaled and survived; the listener
            // itself is still good.
            warn!(?error, "failed to accept a connection");
            state.journal.log(protocol::ACCEPT_FAILED).await;
        }
    }
}
