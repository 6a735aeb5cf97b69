//! The server's game-log file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use peril_protocol::GameLog;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Appends game logs to a file, one line per log.
#[derive(Debug, Clone)]
pub struct GameLogWriter {
    path: PathBuf,
    delay: Duration,
}

impl GameLogWriter {
    /// Creates a writer for `path`. Each write first waits `delay`.
    pub fn new(path: impl Into<PathBuf>, delay: Duration) -> Self {
        Self {
            path: path.into(),
            delay,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `log` as `<time> <username>: <message>`, creating the file
    /// if needed.
    pub async fn write(&self, log: &GameLog) -> std::io::Result<()> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{log}\n").as_bytes()).await?;
        file.flush().await?;

        tracing::debug!(path = %self.path.display(), username = %log.username, "game log written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peril_protocol::GameLog;

    #[tokio::test]
    async fn test_write_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let writer = GameLogWriter::new(dir.path().join("game.log"), Duration::ZERO);

        writer.write(&GameLog::now("alice", "first")).await.unwrap();
        writer.write(&GameLog::now("bob", "second")).await.unwrap();

        let text = std::fs::read_to_string(writer.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("alice: first"));
        assert!(lines[1].ends_with("bob: second"));
    }

    #[tokio::test]
    async fn test_write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let writer = GameLogWriter::new(dir.path().join("nope").join("game.log"), Duration::ZERO);
        assert!(writer.write(&GameLog::now("alice", "x")).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_waits_for_delay() {
        let dir = tempfile::tempdir().unwrap();
        let writer = GameLogWriter::new(dir.path().join("game.log"), Duration::from_secs(2));

        let start = tokio::time::Instant::now();
        writer.write(&GameLog::now("alice", "slow")).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
