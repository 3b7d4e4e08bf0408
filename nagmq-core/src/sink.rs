//! Fichier de commandes Nagios/Icinga (souvent une FIFO `nagios.cmd`).
//!
//! Ouvert une fois au démarrage, en append, gardé ouvert toute la vie du process.
//! Une ligne = une commande externe terminée par `\n`.

use crate::error::SinkError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[async_trait]
pub trait CommandSink: Send {
    async fn open(&mut self) -> Result<(), SinkError>;

    /// Ajoute une ligne (le `\n` est ajouté par le sink)
    async fn append(&mut self, line: &str) -> Result<(), SinkError>;

    async fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

pub struct FileSink {
    path: PathBuf,
    file: Option<File>,
}

impl FileSink {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CommandSink for FileSink {
    async fn open(&mut self) -> Result<(), SinkError> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .await
            .map_err(|source| SinkError::Open {
                path: self.path.display().to_string(),
                source,
            })?;
        debug!("Opened command file {}", self.path.display());
        self.file = Some(file);
        Ok(())
    }

    async fn append(&mut self, line: &str) -> Result<(), SinkError> {
        let file = self.file.as_mut().ok_or(SinkError::NotOpen)?;
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        // une seule écriture par commande : pas d'entrelacement dans la FIFO
        file.write_all(&buf).await.map_err(SinkError::Write)?;
        file.flush().await.map_err(SinkError::Write)
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        match self.file.as_mut() {
            Some(file) => file.flush().await.map_err(SinkError::Write),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nagios.cmd");
        let mut sink = FileSink::new(&path);
        sink.open().await.unwrap();
        sink.append("[1700000000] PROCESS_HOST_CHECK_RESULT;db01;0;ok").await.unwrap();
        sink.append("[1700000001] PROCESS_HOST_CHECK_RESULT;db02;1;down").await.unwrap();
        sink.flush().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "[1700000000] PROCESS_HOST_CHECK_RESULT;db01;0;ok\n[1700000001] PROCESS_HOST_CHECK_RESULT;db02;1;down\n"
        );
    }

    #[tokio::test]
    async fn test_append_before_open() {
        let mut sink = FileSink::new("/nonexistent/nagios.cmd");
        assert!(matches!(sink.append("x").await, Err(SinkError::NotOpen)));
        assert!(matches!(sink.open().await, Err(SinkError::Open { .. })));
    }
}
