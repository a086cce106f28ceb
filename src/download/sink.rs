//! Append-only file sink for assembled media bytes.
//!
//! Appends are applied strictly in call order; each `append` performs a
//! complete write before returning, so a failed append leaves the file
//! at the prefix produced by the last successful call.

use std::path::PathBuf;

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::DownloadError;

/// Owns a local path and writes bytes to it in arrival order.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: File,
    bytes_written: u64,
}

impl FileSink {
    /// Opens the sink, truncating any existing file when `truncate` is
    /// set and appending to it otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Storage`] when the file cannot be opened
    /// or its current length cannot be read.
    pub async fn open(path: impl Into<PathBuf>, truncate: bool) -> Result<Self, DownloadError> {
        let path = path.into();
        let file = if truncate {
            File::create(&path).await
        } else {
            OpenOptions::new().create(true).append(true).open(&path).await
        }
        .map_err(|e| DownloadError::storage(&path, e))?;

        let bytes_written = if truncate {
            0
        } else {
            file.metadata()
                .await
                .map_err(|e| DownloadError::storage(&path, e))?
                .len()
        };

        debug!(path = %path.display(), truncate, bytes_written, "opened file sink");
        Ok(Self {
            path,
            file,
            bytes_written,
        })
    }

    /// Appends one chunk.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Storage`] on write failure; the file then
    /// holds exactly the bytes of all prior successful appends.
    pub async fn append(&mut self, chunk: &[u8]) -> Result<(), DownloadError> {
        self.file
            .write_all(chunk)
            .await
            .map_err(|e| DownloadError::storage(&self.path, e))?;
        self.bytes_written += chunk.len() as u64;
        Ok(())
    }

    /// Bytes written through this sink since it was opened (plus the
    /// pre-existing length when opened in append mode).
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Flushes and syncs the file, consuming the sink.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Storage`] when flushing or syncing fails.
    pub async fn finish(mut self) -> Result<u64, DownloadError> {
        self.file
            .flush()
            .await
            .map_err(|e| DownloadError::storage(&self.path, e))?;
        self.file
            .sync_all()
            .await
            .map_err(|e| DownloadError::storage(&self.path, e))?;
        debug!(path = %self.path.display(), bytes = self.bytes_written, "finished file sink");
        Ok(self.bytes_written)
    }
}
