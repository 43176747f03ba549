//! TCP text broadcast relay with one moderation command.
//!
//! One process accepts TCP connections, ties each to a display name taken
//! from the connection's first line, and relays every further line to all
//! other participants, stamped with the wall-clock minute. `/kick <name>`
//! forcibly disconnects a participant. Every event also lands in an
//! append-only journal file, mirrored to stdout.
//!
//! Each module owns one concern:
//!
//! - [`cli`] is the command-line surface for the server and client modes.
//! - [`relay`] binds the listener, spawns one session task per connection
//!   and carries the state the broadcast path runs over.
//! - [`registry`] is the authoritative set of live connections; everything
//!   else sees connections only through its snapshots.
//! - [`session`] runs one connection from handshake to teardown.
//! - [`commands`] recognizes the kick form and executes it.
//! - [`journal`] stamps event lines and appends them to the journal file.
//! - [`protocol`] holds the newline framing and the wording of every line.
//! - [`client`] is the interactive terminal participant.
//!
//! Integration tests in `tests/` drive a relay over real sockets; the e2e
//! test drives the compiled binary through its actual stdin and stdout.

pub mod cli;
pub mod client;
pub mod commands;
pub mod journal;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod session;
