#![forbid(unsafe_code)]

//! Persistent list of [`Connection`]s kept as one JSON array on disk.
//!
//! Reads are best effort: [`ConnectionStore::list`] treats a missing or
//! unreadable file as an empty list, while [`ConnectionStore::load`] reports
//! which of the two it was. Every mutation is a full read-modify-write of the
//! file, serialized by a per-store writer lock, and the new content replaces
//! the old one through a rename so readers never see a partial write.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use shared::Connection;
use tempfile::NamedTempFile;
use thiserror::Error;

pub const STORE_FILE_NAME: &str = "connections.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection file {0} does not exist")]
    NotFound(PathBuf),
    #[error("connection file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to read connection file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to encode connection list: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to write connection file {path}: {source}")]
    WriteFailed { path: PathBuf, source: io::Error },
}

/// Location of the store when none is configured: a `remote-ctrl` folder in
/// the user's data directory.
pub fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("remote-ctrl")
        .join(STORE_FILE_NAME)
}

pub struct ConnectionStore {
    path: PathBuf,
    writer: Mutex<()>,
}

impl ConnectionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and decodes the stored list, preserving its order.
    pub fn load(&self) -> Result<Vec<Connection>, StoreError> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(self.path.clone()));
            }
            Err(err) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source: err,
                });
            }
        };

        serde_json::from_slice(&data).map_err(|err| StoreError::Corrupt {
            path: self.path.clone(),
            source: err,
        })
    }

    /// Stored list, or an empty one if the file is missing or can't be decoded.
    pub fn list(&self) -> Vec<Connection> {
        match self.load() {
            Ok(connections) => connections,
            Err(err @ StoreError::NotFound(_)) => {
                log::debug!("connection_store: {}, using an empty list", err);
                Vec::new()
            }
            Err(err @ StoreError::Corrupt { .. }) => {
                log::warn!("connection_store: {}, using an empty list", err);
                Vec::new()
            }
            Err(err) => {
                log::error!("connection_store: {}, using an empty list", err);
                Vec::new()
            }
        }
    }

    /// Appends `connection` to the end of the stored list.
    pub fn save(&self, connection: Connection) -> Result<(), StoreError> {
        self.update(move |connections| {
            connections.push(connection);
            true
        })
        .map(|_| ())
    }

    /// Removes the first stored connection equal to `connection`. Returns
    /// whether anything was removed; the file is left untouched otherwise.
    pub fn delete(&self, connection: &Connection) -> Result<bool, StoreError> {
        self.update(|connections| {
            match connections.iter().position(|stored| stored == connection) {
                Some(index) => {
                    connections.remove(index);
                    true
                }
                None => false,
            }
        })
    }

    /// Applies `updater` to the current list and writes the result back if
    /// the updater reports a change.
    fn update<F>(&self, updater: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut Vec<Connection>) -> bool,
    {
        let _guard = self.writer.lock().unwrap_or_else(|err| err.into_inner());

        let mut connections = self.list();

        if !updater(&mut connections) {
            return Ok(false);
        }

        if let Err(err) = self.write(&connections) {
            log::error!("connection_store: {}", err);
            return Err(err);
        }

        Ok(true)
    }

    fn write(&self, connections: &[Connection]) -> Result<(), StoreError> {
        let data = serde_json::to_vec(connections).map_err(StoreError::Encode)?;

        let write_failed = |err: io::Error| StoreError::WriteFailed {
            path: self.path.clone(),
            source: err,
        };

        let directory = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        std::fs::create_dir_all(directory).map_err(write_failed)?;

        let mut file = NamedTempFile::new_in(directory).map_err(write_failed)?;
        file.write_all(&data).map_err(write_failed)?;
        file.as_file().sync_all().map_err(write_failed)?;
        file.persist(&self.path)
            .map_err(|err| write_failed(err.error))?;

        log::debug!(
            "connection_store: Wrote {} connection(s) to {}",
            connections.len(),
            self.path.display()
        );

        Ok(())
    }
}
