//! Per-track timestamp log files.
//!
//! Every track gets one `{name}.txt` under the log directory. The first
//! entry writes the track name as a header line, later entries append one
//! `HH:MM:SS` stamp per line.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("could not create log directory {}: {source}", dir.display())]
    CreateDir {
        dir: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {}: {source}", path.display())]
    Append {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Sink for resolved timestamps. The file writer below is the real one;
/// tests substitute their own.
pub trait LogWriter {
    async fn append_entry(&self, name: &str, stamp: &str) -> Result<(), WriteError>;
}

/// Writes timestamp logs under a fixed directory, creating it on demand.
pub struct FileLogWriter {
    dir: PathBuf,
}

impl FileLogWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn entry_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.txt"))
    }

    async fn write_body(path: &Path, name: &str, stamp: &str) -> std::io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .await?;
        // An empty file is a fresh log and gets the name header first.
        let body = if file.metadata().await?.len() == 0 {
            format!("{name}\n{stamp}\n")
        } else {
            format!("{stamp}\n")
        };
        file.write_all(body.as_bytes()).await?;
        file.flush().await
    }
}

impl LogWriter for FileLogWriter {
    async fn append_entry(&self, name: &str, stamp: &str) -> Result<(), WriteError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| WriteError::CreateDir {
                dir: self.dir.clone(),
                source,
            })?;
        let path = self.entry_path(name);
        Self::write_body(&path, name, stamp)
            .await
            .map_err(|source| WriteError::Append {
                path: path.clone(),
                source,
            })?;
        tracing::debug!(path = %path.display(), stamp, "appended log entry");
        Ok(())
    }
}
