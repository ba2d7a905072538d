// src/naming.rs
//
// SPDX-License-Identifier: Apache-2.0 OR MIT
// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>

//! Collision-avoiding output names: `stomp0.dat`, `stomp1.dat`, ...
//!
//! A candidate is taken only when a regular file already exists at that path.
//! Anything else (nothing, a directory) counts as free. The check and the later
//! create are not atomic; two processes racing on one directory can pick the
//! same name.

use std::path::{Path, PathBuf};
use tracing::trace;

use crate::constants::{FILE_BASE_NAME, FILE_EXTENSION};

/// File name for index `n`
pub fn file_name(n: u64) -> String {
    format!("{}{}.{}", FILE_BASE_NAME, n, FILE_EXTENSION)
}

fn is_taken(path: &Path) -> bool {
    path.is_file()
}

/// First `dir/stomp{n}.dat`, `n >= 0`, that is not an existing regular file.
///
/// Calling this again without creating the file returns the same path.
pub fn next_available_name(dir: &Path) -> PathBuf {
    next_from(dir, 0).1
}

/// `count` distinct free names in ascending index order, for batches whose
/// files are created after all names are chosen.
pub fn available_names(dir: &Path, count: usize) -> Vec<PathBuf> {
    let mut names = Vec::with_capacity(count);
    let mut start = 0u64;
    while names.len() < count {
        let (n, path) = next_from(dir, start);
        names.push(path);
        start = n + 1;
    }
    names
}

fn next_from(dir: &Path, start: u64) -> (u64, PathBuf) {
    let mut n = start;
    loop {
        let candidate = dir.join(file_name(n));
        if !is_taken(&candidate) {
            trace!(path = %candidate.display(), "free output name");
            return (n, candidate);
        }
        n += 1;
    }
}
