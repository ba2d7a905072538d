// src/constants.rs
//
// SPDX-License-Identifier: Apache-2.0 OR MIT
// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>
//
// Centralized constants for stomp to avoid hardcoded values throughout the codebase

/// Bytes per size unit accepted from the user (1 GiB = 2^30 bytes)
pub const BYTES_PER_UNIT: u64 = 1 << 30;

/// Bytes per MiB, used for chunk-size flags
pub const BYTES_PER_MIB: u64 = 1 << 20;

/// Default chunk size for random-fill streaming (1 GiB)
///
/// One chunk is the unit of generate-then-write: memory use is bounded to this
/// many bytes (two chunks when the pipelined strategy is selected).
pub const DEFAULT_CHUNK_SIZE: usize = BYTES_PER_UNIT as usize;

/// Internal block size for parallel random generation (1 MiB)
///
/// Each block is seeded from `(seed, block_index)`, so output does not depend
/// on how a stream is split into chunks.
pub const DGEN_BLOCK_SIZE: usize = 1024 * 1024;

/// A chunk must span at least this many blocks before generation goes parallel
pub const PARALLEL_BLOCK_THRESHOLD: usize = 2;

/// Base name of generated files (`stomp0.dat`, `stomp1.dat`, ...)
pub const FILE_BASE_NAME: &str = "stomp";

/// Extension of generated files
pub const FILE_EXTENSION: &str = "dat";

/// Banner printed by the interactive size prompt
pub const SIZE_PROMPT: &str = "Enter file size in GB: ";
