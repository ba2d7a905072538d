// src/page_cache.rs
//
// SPDX-License-Identifier: Apache-2.0 OR MIT
// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>
//
//! Page cache control via posix_fadvise() on Linux
//!
//! Streaming hundreds of GiB through the page cache evicts everything else on
//! the machine. These hints tell the kernel the output is written once,
//! sequentially, and that committed ranges will not be read back.

use std::fs::File;

/// Hint that `file` will be written sequentially from start to end.
///
/// # Platform Support
/// - Linux: Uses posix_fadvise(POSIX_FADV_SEQUENTIAL)
/// - Other platforms: No-op (returns Ok)
pub fn advise_sequential(file: &File) -> std::io::Result<()> {
    #[cfg(target_os = "linux")]
    {
        use libc::{posix_fadvise, POSIX_FADV_SEQUENTIAL};
        use std::os::unix::io::AsRawFd;

        // offset=0, len=0 means whole file
        let result = unsafe { posix_fadvise(file.as_raw_fd(), 0, 0, POSIX_FADV_SEQUENTIAL) };
        if result != 0 {
            return Err(std::io::Error::from_raw_os_error(result));
        }
    }

    #[cfg(not(target_os = "linux"))]
    {
        let _ = file;
    }

    Ok(())
}

/// Drop cached pages for a committed region of `file`.
///
/// Only clean pages are dropped, so call this after the region has been
/// flushed (and ideally synced); dirty pages are left for writeback.
pub fn drop_cache_region(file: &File, offset: u64, length: u64) -> std::io::Result<()> {
    #[cfg(target_os = "linux")]
    {
        use libc::{posix_fadvise, POSIX_FADV_DONTNEED};
        use std::os::unix::io::AsRawFd;

        let to_off = |v: u64| {
            libc::off_t::try_from(v)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
        };
        let result = unsafe {
            posix_fadvise(file.as_raw_fd(), to_off(offset)?, to_off(length)?, POSIX_FADV_DONTNEED)
        };
        if result != 0 {
            return Err(std::io::Error::from_raw_os_error(result));
        }
    }

    #[cfg(not(target_os = "linux"))]
    {
        let _ = (file, offset, length);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_advise_sequential() {
        let file = NamedTempFile::new().unwrap();
        assert!(advise_sequential(file.as_file()).is_ok());
    }

    #[test]
    fn test_drop_cache_region_after_write() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[7u8; 8192]).unwrap();
        file.as_file().sync_data().unwrap();

        assert!(drop_cache_region(file.as_file(), 0, 8192).is_ok());

        // Dropping cache never changes content
        let data = std::fs::read(file.path()).unwrap();
        assert_eq!(data, vec![7u8; 8192]);
    }
}
