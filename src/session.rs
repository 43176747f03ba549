//! One session per connection: handshake, receive loop, teardown.

use std::{net::SocketAddr, sync::Arc};

use tokio::{
    io::{AsyncBufRead, AsyncWriteExt, BufReader},
    net::TcpStream,
    select,
    sync::Mutex,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    commands::{self, Directive},
    protocol,
    registry::{ConnId, Peer, SharedWriter},
    relay::RelayState,
};

/// Runs one connection until it closes, errors, gets kicked or the relay
/// shuts down. The first line is the display name; every further line is a
/// command or chat. A participant that became visible produces exactly one
/// departure announcement, except when a kick already claimed its registry
/// entry and spoke for it.
pub async fn run(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: Arc<RelayState>,
    cancel: CancellationToken,
) {
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let writer: SharedWriter = Arc::new(Mutex::new(Box::new(write_half)));

    let Some(name) = handshake(&mut reader, &cancel).await else {
        // Gone before the name arrived: never registered, never announced.
        close_writer(&writer).await;
        debug!(peer = %peer_addr, "connection closed before the handshake");
        return;
    };

    let id = state.registry.issue_id();
    let peer = Peer::new(id, name.clone(), Arc::clone(&writer), cancel.clone());
    state.registry.register(peer).await;
    state.announce(&protocol::joined(&name), None).await;

    receive_loop(&state, &mut reader, &cancel, &name, id).await;

    // A kick unregisters first and announces itself; only the winner of this
    // removal speaks.
    if let Some(name) = state.registry.unregister(id).await {
        state.announce(&protocol::left(&name), None).await;
    }
    close_writer(&writer).await;
    debug!(peer = %peer_addr, "session finished");
}

/// One read for the display name, raced against cancellation. The name is
/// taken verbatim; there is no uniqueness or charset check. `None` means the
/// connection went away, or the relay is stopping, before the peer became
/// visible.
async fn handshake<R>(reader: &mut R, cancel: &CancellationToken) -> Option<String>
where
    R: AsyncBufRead + Unpin,
{
    select! {
        _ = cancel.cancelled() => None,
        line = protocol::read_line(reader) => match line {
            Ok(name) => name,
            Err(error) => {
                debug!(?error, "handshake read failed");
                None
            }
        },
    }
}

async fn receive_loop<R>(
    state: &RelayState,
    reader: &mut R,
    cancel: &CancellationToken,
    name: &str,
    id: ConnId,
) where
    R: AsyncBufRead + Unpin,
{
    loop {
        select! {
            _ = cancel.cancelled() => break,
            line = protocol::read_line(reader) => match line {
                Ok(Some(line)) => dispatch(state, name, id, &line).await,
                Ok(None) => break,
                Err(error) => {
                    // A failed read is an ordinary disconnect.
                    debug!(peer = id, ?error, "read failed, closing the session");
                    break;
                }
            },
        }
    }
}

async fn dispatch(state: &RelayState, name: &str, id: ConnId, line: &str) {
    match commands::route(line) {
        Directive::Kick { target } => commands::kick(state, target).await,
        Directive::Chat(text) => {
            // The sender never hears their own message back.
            state.announce(&protocol::chat(name, text), Some(id)).await;
        }
    }
}

async fn close_writer(writer: &SharedWriter) {
    let mut writer = writer.lock().await;
    let _ = writer.shutdown().await;
}
