// src/config.rs
//
// SPDX-License-Identifier: Apache-2.0 OR MIT
// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>

use clap::ValueEnum;

use crate::constants::{BYTES_PER_UNIT, DEFAULT_CHUNK_SIZE};
use crate::error::{Result, StompError};

/// Valid generation modes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerationMode {
    /// Extend the file's logical length; content reads as zeros
    ZeroFill,
    /// Stream pseudo-random bytes to disk chunk by chunk
    RandomFill,
}

/// How the zero-fill allocator sets a file's length.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum AllocStrategy {
    /// Pick the fastest portable backend (currently `Sparse`)
    #[default]
    Auto,
    /// Truncate/extend the length, leaving holes where the filesystem supports them
    Sparse,
    /// Reserve real blocks (fallocate on Linux), then fix the length
    Preallocate,
    /// Seek to the last byte and write a single zero
    WriteLastByte,
}

/// How random-fill overlaps generation and I/O.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum FillStrategy {
    /// Generate, write, flush, repeat on the calling thread
    #[default]
    Sequential,
    /// Generate chunk N+1 on a helper thread while chunk N is written
    Pipelined,
}

/// Which pseudo-random generator backs random-fill.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// Xoshiro256++ over 1 MiB blocks, parallel within a chunk
    #[default]
    Xoshiro,
    /// ChaCha8 keystream, single-threaded
    Chacha,
}

/// One generation task. Immutable once built; consumed by exactly one component.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub mode:        GenerationMode,
    pub size:        u64,          // bytes
    pub chunk_size:  usize,        // random-fill only

    // ---- zero-fill knobs ----
    pub alloc:       AllocStrategy,

    // ---- random-fill knobs ----
    pub seed:        Option<u64>,  // None => derive from the clock at dispatch
    pub source:      SourceKind,
    pub fill:        FillStrategy,
    pub sync_chunks: bool,         // sync_data() after every chunk
    pub drop_cache:  bool,         // posix_fadvise(DONTNEED) committed chunks
}

impl GenerationRequest {
    /// Zero-fill request for `size` bytes with the default allocation strategy.
    pub fn zero_fill(size: u64) -> Self {
        Self {
            mode: GenerationMode::ZeroFill,
            size,
            chunk_size: DEFAULT_CHUNK_SIZE,
            alloc: AllocStrategy::default(),
            seed: None,
            source: SourceKind::default(),
            fill: FillStrategy::default(),
            sync_chunks: false,
            drop_cache: false,
        }
    }

    /// Random-fill request for `size` bytes streamed in `chunk_size` chunks.
    pub fn random_fill(size: u64, chunk_size: usize) -> Self {
        Self {
            mode: GenerationMode::RandomFill,
            chunk_size,
            ..Self::zero_fill(size)
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_alloc(mut self, alloc: AllocStrategy) -> Self {
        self.alloc = alloc;
        self
    }

    pub fn with_source(mut self, source: SourceKind) -> Self {
        self.source = source;
        self
    }

    pub fn with_fill(mut self, fill: FillStrategy) -> Self {
        self.fill = fill;
        self
    }

    pub fn with_sync_chunks(mut self, sync: bool) -> Self {
        self.sync_chunks = sync;
        self
    }

    pub fn with_drop_cache(mut self, drop_cache: bool) -> Self {
        self.drop_cache = drop_cache;
        self
    }
}

/// Convert a count of whole units (GiB) to bytes, rejecting overflow.
pub fn units_to_bytes(units: u64) -> Result<u64> {
    units.checked_mul(BYTES_PER_UNIT).ok_or_else(|| {
        StompError::InvalidInput(format!("{} GB does not fit in a 64-bit byte count", units))
    })
}
