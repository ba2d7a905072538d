// src/allocate.rs
//
// SPDX-License-Identifier: Apache-2.0 OR MIT
// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>

//! Zero-fill allocation by fast logical-size extension
//!
//! A zero-filled file is produced by moving the file's end-of-data to the
//! requested offset instead of writing every byte. How that happens depends on
//! the platform and filesystem, so the mechanism sits behind the
//! [`FastAllocate`] capability with one backend per strategy:
//!
//! - [`SparseExtend`]: `set_len` (ftruncate / SetEndOfFile). Constant time on
//!   any filesystem with hole support; the region reads back as zeros.
//! - [`Preallocate`]: Linux `fallocate(2)` reserves real zeroed blocks, then
//!   `set_len` fixes the length. Falls back to `set_len` when the filesystem
//!   does not implement fallocate, and on every other platform.
//! - [`WriteLastByte`]: seek to `size - 1` and write a single zero byte. The
//!   portable fallback for platforms where extending the length is refused.
//!
//! Whatever the backend, [`SparseAllocator`] restores the prior length when a
//! step fails, so a failed call never leaves an intermediate size behind.

use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use tracing::{debug, info, warn};

use crate::config::AllocStrategy;
use crate::error::{Result, StompError};
use crate::target::FileTarget;

/// Capability: set a file's logical length to `size` without writing its content.
pub trait FastAllocate: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Extend (or shrink) `file` to exactly `size` bytes.
    fn extend(&self, file: &File, size: u64) -> io::Result<()>;
}

/// `set_len` backend; leaves holes on filesystems that support them.
#[derive(Debug, Default, Clone, Copy)]
pub struct SparseExtend;

impl FastAllocate for SparseExtend {
    fn name(&self) -> &'static str {
        "sparse"
    }

    fn extend(&self, file: &File, size: u64) -> io::Result<()> {
        file.set_len(size)
    }
}

/// Reserve real blocks before fixing the length.
#[derive(Debug, Default, Clone, Copy)]
pub struct Preallocate;

impl FastAllocate for Preallocate {
    fn name(&self) -> &'static str {
        "preallocate"
    }

    fn extend(&self, file: &File, size: u64) -> io::Result<()> {
        reserve_blocks(file, size)?;
        file.set_len(size)
    }
}

#[cfg(target_os = "linux")]
fn reserve_blocks(file: &File, size: u64) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    if size == 0 {
        return Ok(());
    }

    let len = libc::off_t::try_from(size)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    // mode 0: allocate and extend, reads of the new range return zeros
    let result = unsafe { libc::fallocate(file.as_raw_fd(), 0, 0, len) };
    if result == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::EOPNOTSUPP) | Some(libc::ENOSYS) => {
            debug!("fallocate unsupported here ({}), relying on set_len", err);
            Ok(())
        }
        _ => Err(err),
    }
}

#[cfg(not(target_os = "linux"))]
fn reserve_blocks(_file: &File, _size: u64) -> io::Result<()> {
    Ok(())
}

/// Seek-and-write-one-byte fallback.
#[derive(Debug, Default, Clone, Copy)]
pub struct WriteLastByte;

impl FastAllocate for WriteLastByte {
    fn name(&self) -> &'static str {
        "write-last-byte"
    }

    fn extend(&self, file: &File, size: u64) -> io::Result<()> {
        if size > 0 {
            let mut handle = file;
            handle.seek(SeekFrom::Start(size - 1))?;
            handle.write_all(&[0u8])?;
            handle.flush()?;
        }
        // Also shrinks a handle that was longer than the request
        file.set_len(size)
    }
}

/// Backend for a strategy. `Auto` resolves to [`SparseExtend`].
pub fn backend_for(strategy: AllocStrategy) -> Box<dyn FastAllocate> {
    match strategy {
        AllocStrategy::Auto | AllocStrategy::Sparse => Box::new(SparseExtend),
        AllocStrategy::Preallocate => Box::new(Preallocate),
        AllocStrategy::WriteLastByte => Box::new(WriteLastByte),
    }
}

/// Creates zero-filled files of an exact size in time roughly independent of that size.
pub struct SparseAllocator {
    backend: Box<dyn FastAllocate>,
}

impl SparseAllocator {
    pub fn new(strategy: AllocStrategy) -> Self {
        Self::with_backend(backend_for(strategy))
    }

    /// Use a custom backend (platform extensions, fault injection in tests)
    pub fn with_backend(backend: Box<dyn FastAllocate>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Set the target's length to its requested size.
    ///
    /// On failure the prior length is restored before
    /// [`StompError::AllocationFailed`] is returned.
    pub fn allocate(&self, target: &FileTarget) -> Result<()> {
        let file = target.file();
        let size = target.size();
        let prior = file.metadata().map(|m| m.len()).ok();

        debug!(
            path = %target.path().display(),
            size,
            backend = self.backend.name(),
            "extending file"
        );

        if let Err(source) = self.backend.extend(file, size) {
            if let Some(prior) = prior {
                if let Err(e) = file.set_len(prior) {
                    warn!(
                        path = %target.path().display(),
                        prior,
                        "could not restore length after failed allocation: {}",
                        e
                    );
                }
            }
            return Err(StompError::AllocationFailed {
                path: target.path().to_path_buf(),
                size,
                source,
            });
        }

        Ok(())
    }

    /// [`allocate`](Self::allocate), then re-read the size and treat it as authoritative.
    ///
    /// Returns the observed length, or [`StompError::SizeMismatch`] when the
    /// length call reported success but the file ended up a different size.
    pub fn allocate_verified(&self, target: &FileTarget) -> Result<u64> {
        self.allocate(target)?;

        let actual = target.observed_len().map_err(|source| StompError::AllocationFailed {
            path: target.path().to_path_buf(),
            size: target.size(),
            source,
        })?;

        if actual != target.size() {
            return Err(StompError::SizeMismatch {
                path: target.path().to_path_buf(),
                expected: target.size(),
                actual,
            });
        }

        info!(
            path = %target.path().display(),
            size = actual,
            backend = self.backend.name(),
            "zero-fill allocation complete"
        );
        Ok(actual)
    }
}

impl Default for SparseAllocator {
    fn default() -> Self {
        Self::new(AllocStrategy::Auto)
    }
}
