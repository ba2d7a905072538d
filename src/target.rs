// src/target.rs
//
// SPDX-License-Identifier: Apache-2.0 OR MIT
// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>

//! Destination file handle shared by both generation modes.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, StompError};

/// A destination file: where it lives, how large it must become, and the open
/// handle the active generation operation owns.
///
/// The handle closes when the target is dropped, so every exit path of an
/// operation that owns a `FileTarget` releases the file.
#[derive(Debug)]
pub struct FileTarget {
    path: PathBuf,
    size: u64,
    file: File,
}

impl FileTarget {
    /// Create (or truncate) `path` for writing.
    ///
    /// Fails with [`StompError::SinkOpenFailed`] before any byte is produced.
    pub fn create(path: impl Into<PathBuf>, size: u64) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|source| StompError::SinkOpenFailed { path: path.clone(), source })?;

        debug!(path = %path.display(), size, "opened destination");
        Ok(Self { path, size, file })
    }

    /// Wrap an already open, writable handle.
    pub fn from_file(path: impl Into<PathBuf>, size: u64, file: File) -> Self {
        Self { path: path.into(), size, file }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Requested size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    /// Length currently reported for the open handle.
    pub fn observed_len(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_truncates_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stomp0.dat");
        std::fs::write(&path, b"leftover").unwrap();

        let target = FileTarget::create(&path, 16).unwrap();
        assert_eq!(target.observed_len().unwrap(), 0);
        assert_eq!(target.size(), 16);
        assert_eq!(target.path(), path.as_path());
    }

    #[test]
    fn test_create_in_missing_dir_is_sink_open_failed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("stomp0.dat");

        let err = FileTarget::create(&path, 1).unwrap_err();
        match err {
            StompError::SinkOpenFailed { path: p, .. } => assert_eq!(p, path),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
