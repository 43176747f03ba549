//! Newline-delimited framing and the wording of every line the relay emits.
//!
//! One message is one line. TCP gives a byte stream, so a single read may
//! carry half a message or several; [`read_line`] buffers until a terminator
//! arrives and hands back exactly one message per call.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

const LINE_ENDINGS: &[char] = &['\n', '\r'];

/// Notice written directly to a participant right before a kick closes
/// their connection. Unstamped, unlike broadcast lines.
pub const KICKED_NOTICE: &str = "Вы были исключены из чата";

/// Journal text for a failed accept.
pub const ACCEPT_FAILED: &str = "Ошибка принятия подключения";

pub fn joined(name: &str) -> String {
    format!("{name} присоединился к чату")
}

pub fn left(name: &str) -> String {
    format!("{name} покинул чат")
}

pub fn kicked(name: &str) -> String {
    format!("{name} был исключен из чата")
}

pub fn chat(name: &str, text: &str) -> String {
    format!("{name}: {text}")
}

pub fn server_started(port: u16) -> String {
    format!("Сервер запущен на порту {port}")
}

pub fn connection_from(addr: impl std::fmt::Display) -> String {
    format!("Новое подключение с IP: {addr}")
}

/// Reads one message. Returns `None` once the peer has closed the
/// connection. The line terminator is stripped; an empty line is still a
/// message and comes back as an empty string.
pub async fn read_line<R>(reader: &mut R) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let bytes_read = reader.read_line(&mut line).await?;
    if bytes_read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(LINE_ENDINGS).to_string()))
}

/// Writes `text` with its terminator and flushes, so the message is on the
/// wire before the call returns.
pub async fn write_line<W>(writer: &mut W, text: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut encoded = text.as_bytes().to_vec();
    encoded.push(b'\n');
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}
