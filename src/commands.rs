//! Command handling. The protocol has exactly one command, `/kick <name>`;
//! every other line is chat.

use tracing::debug;

use crate::{protocol, relay::RelayState};

const KICK_PREFIX: &str = "/kick ";

/// What to do with one received line.
#[derive(Debug, PartialEq, Eq)]
pub enum Directive<'a> {
    /// Forcibly disconnect the named participant.
    Kick { target: &'a str },
    /// Relay the line as chat, slash-prefixed or not.
    Chat(&'a str),
}

/// The recognized form is the literal `"/kick "` prefix with a non-empty
/// remainder; the remainder is the target name verbatim, inner spaces and
/// all. Anything else falls through to chat.
pub fn route(line: &str) -> Directive<'_> {
    match line.strip_prefix(KICK_PREFIX) {
        Some(target) if !target.is_empty() => Directive::Kick { target },
        _ => Directive::Chat(line),
    }
}

/// Disconnects the earliest-arrived holder of `target`: a direct notice, a
/// closed transport, a cancelled session, then one announcement to the
/// journal and everyone remaining. A name nobody holds is a silent no-op, so
/// kicking the same name twice does everything exactly once.
pub async fn kick(state: &RelayState, target: &str) {
    let Some(peer) = state.registry.find_by_name(target).await else {
        debug!(name = target, "kick target not registered, ignoring");
        return;
    };
    // Removing the registry entry is the claim that decides races: of a
    // concurrent kick and the session's own teardown, whichever unregisters
    // first gets to announce.
    if state.registry.unregister(peer.id).await.is_none() {
        debug!(name = target, "kick target already tearing down, ignoring");
        return;
    }

    if let Err(error) = peer.send_line(protocol::KICKED_NOTICE).await {
        debug!(peer = peer.id, ?error, "kicked peer missed the final notice");
    }
    peer.close_transport().await;
    peer.force_disconnect();

    state.announce(&protocol::kicked(target), None).await;
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use tokio::{
        io::{BufReader, DuplexStream},
        sync::Mutex,
        time::timeout,
    };
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::{
        journal::Journal,
        registry::{Peer, SharedWriter},
    };

    #[test]
    fn only_the_exact_kick_form_is_a_command() {
        assert_eq!(route("/kick Боб"), Directive::Kick { target: "Боб" });
        assert_eq!(
            route("/kick Боб Смирнов"),
            Directive::Kick {
                target: "Боб Смирнов"
            }
        );
        assert_eq!(route("/kick"), Directive::Chat("/kick"));
        assert_eq!(route("/kick "), Directive::Chat("/kick "));
        assert_eq!(route("/kickБоб"), Directive::Chat("/kickБоб"));
        assert_eq!(route("/ban Боб"), Directive::Chat("/ban Боб"));
        assert_eq!(route("привет"), Directive::Chat("привет"));
        assert_eq!(route(""), Directive::Chat(""));
    }

    async fn state_with_journal(dir: &tempfile::TempDir) -> RelayState {
        let journal = Journal::open(dir.path().join("chat.log"))
            .await
            .expect("open journal");
        RelayState::new(journal)
    }

    /// Registers a fake peer and returns the far end of its transport plus a
    /// clone of its cancellation token.
    async fn register_fake_peer(
        state: &RelayState,
        name: &str,
    ) -> (DuplexStream, CancellationToken) {
        let (near, far) = tokio::io::duplex(1024);
        let writer: SharedWriter = Arc::new(Mutex::new(Box::new(near)));
        let cancel = CancellationToken::new();
        let peer = Peer::new(state.registry.issue_id(), name, writer, cancel.clone());
        state.registry.register(peer).await;
        (far, cancel)
    }

    #[tokio::test]
    async fn kick_removes_notifies_and_announces() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state_with_journal(&dir).await;
        let (bob_far, bob_cancel) = register_fake_peer(&state, "Боб").await;
        let (alice_far, _alice_cancel) = register_fake_peer(&state, "Алиса").await;

        kick(&state, "Боб").await;

        assert!(state.registry.find_by_name("Боб").await.is_none());
        assert_eq!(state.registry.len().await, 1);
        assert!(bob_cancel.is_cancelled());

        // Bob got the unstamped direct notice, then EOF.
        let mut bob_reader = BufReader::new(bob_far);
        let notice = protocol::read_line(&mut bob_reader)
            .await
            .expect("read notice")
            .expect("a notice");
        assert_eq!(notice, "Вы были исключены из чата");
        assert_eq!(protocol::read_line(&mut bob_reader).await.expect("read"), None);

        // Everyone else got the stamped announcement, and only that.
        let mut alice_reader = BufReader::new(alice_far);
        let seen = protocol::read_line(&mut alice_reader)
            .await
            .expect("read")
            .expect("a line");
        assert!(seen.ends_with("Боб был исключен из чата"), "got '{seen}'");
        assert!(seen.starts_with('['), "missing stamp: {seen}");
    }

    #[tokio::test]
    async fn kicking_an_absent_name_changes_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let journal_path = dir.path().join("chat.log");
        let state = RelayState::new(Journal::open(&journal_path).await.expect("open journal"));
        let (alice_far, alice_cancel) = register_fake_peer(&state, "Алиса").await;

        kick(&state, "Боб").await;

        assert_eq!(state.registry.len().await, 1);
        assert!(!alice_cancel.is_cancelled());

        // Nothing reached the remaining peer and nothing was journaled.
        let mut alice_reader = BufReader::new(alice_far);
        let quiet = timeout(
            Duration::from_millis(100),
            protocol::read_line(&mut alice_reader),
        )
        .await;
        assert!(quiet.is_err(), "expected no delivery");
        let contents = tokio::fs::read_to_string(&journal_path)
            .await
            .expect("read journal");
        assert!(contents.is_empty());
    }

    #[tokio::test]
    async fn repeated_kicks_announce_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let journal_path = dir.path().join("chat.log");
        let state = RelayState::new(Journal::open(&journal_path).await.expect("open journal"));
        let (_bob_far, _bob_cancel) = register_fake_peer(&state, "Боб").await;

        kick(&state, "Боб").await;
        kick(&state, "Боб").await;

        let contents = tokio::fs::read_to_string(&journal_path)
            .await
            .expect("read journal");
        let announcements = contents
            .lines()
            .filter(|line| line.ends_with("Боб был исключен из чата"))
            .count();
        assert_eq!(announcements, 1);
    }
}
