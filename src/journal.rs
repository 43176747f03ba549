//! Append-only event journal, mirrored to stdout.

use std::{io, path::Path};

use chrono::Local;
use tokio::{
    fs::{File, OpenOptions},
    io::AsyncWriteExt,
    sync::Mutex,
};
use tracing::warn;

/// Current wall-clock minute as `"[HH:MM]"`. Every journal line and every
/// broadcast line carries this stamp.
pub fn minute_stamp() -> String {
    format!("[{}]", Local::now().format("%H:%M"))
}

/// Event journal. One lock serializes writers so concurrent sessions never
/// interleave partial lines; the file is flushed after each line, so the
/// journal reflects every completed log call even if the process dies.
pub struct Journal {
    sink: Mutex<File>,
}

impl Journal {
    /// Opens the journal file in append mode, creating it if missing.
    /// Earlier runs' lines are kept.
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self {
            sink: Mutex::new(file),
        })
    }

    /// Stamps `text` and writes the line to stdout and the journal file.
    /// A failing sink is reported through tracing and otherwise ignored;
    /// losing a journal line never takes the relay down.
    pub async fn log(&self, text: &str) {
        let line = format!("{} {text}\n", minute_stamp());
        let mut file = self.sink.lock().await;

        let mut stdout = tokio::io::stdout();
        let _ = stdout.write_all(line.as_bytes()).await;
        let _ = stdout.flush().await;

        if let Err(error) = file.write_all(line.as_bytes()).await {
            warn!(?error, "failed to append to the journal file");
            return;
        }
        if let Err(error) = file.flush().await {
            warn!(?error, "failed to flush the journal file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_is_minute_resolution() {
        let stamp = minute_stamp();
        assert_eq!(stamp.len(), "[HH:MM]".len());
        assert!(stamp.starts_with('['));
        assert!(stamp.ends_with(']'));
        assert_eq!(stamp.as_bytes()[3], b':');
    }

    #[tokio::test]
    async fn lines_are_stamped_and_appended_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("chat.log");
        let journal = Journal::open(&path).await.expect("open journal");

        journal.log("Алиса присоединился к чату").await;
        journal.log("Алиса: привет").await;

        let contents = tokio::fs::read_to_string(&path).await.expect("read journal");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("Алиса присоединился к чату"));
        assert!(lines[1].ends_with("Алиса: привет"));
        for line in lines {
            assert!(line.starts_with('['), "missing stamp: {line}");
            assert_eq!(line.as_bytes()[7], b' ');
        }
    }

    #[tokio::test]
    async fn reopening_appends_after_earlier_runs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("chat.log");

        {
            let journal = Journal::open(&path).await.expect("open journal");
            journal.log("Сервер запущен на порту 1234").await;
        }
        let journal = Journal::open(&path).await.expect("reopen journal");
        journal.log("Алиса присоединился к чату").await;

        let contents = tokio::fs::read_to_string(&path).await.expect("read journal");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Сервер запущен"));
        assert!(lines[1].contains("Алиса"));
    }
}
