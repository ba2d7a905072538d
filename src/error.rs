// src/error.rs
//
// SPDX-License-Identifier: Apache-2.0 OR MIT
// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>

//! Error taxonomy for the file-generation engine.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by allocation, streaming fill and the orchestration helpers.
///
/// Nothing in the engine retries; every variant reaches the immediate caller.
#[derive(Error, Debug)]
pub enum StompError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to set length of {} to {size} bytes: {source}", .path.display())]
    AllocationFailed {
        path: PathBuf,
        size: u64,
        #[source]
        source: io::Error,
    },

    /// The length call reported success but the size observed afterwards differs.
    #[error("size mismatch on {}: expected {expected} bytes, found {actual}", .path.display())]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("cannot open {} for writing: {source}", .path.display())]
    SinkOpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A chunk write or flush failed; `bytes_written` counts whole committed chunks.
    #[error("write failed after {bytes_written} bytes: {source}")]
    WriteFailed {
        bytes_written: u64,
        #[source]
        source: io::Error,
    },
}

impl StompError {
    /// Bytes known to be committed when the error was raised, if meaningful.
    pub fn bytes_written(&self) -> Option<u64> {
        match self {
            StompError::WriteFailed { bytes_written, .. } => Some(*bytes_written),
            _ => None,
        }
    }
}

impl From<String> for StompError {
    fn from(s: String) -> Self {
        StompError::InvalidInput(s)
    }
}

impl From<&str> for StompError {
    fn from(s: &str) -> Self {
        StompError::InvalidInput(s.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StompError>;
