// src/data_gen.rs
//
// SPDX-License-Identifier: Apache-2.0 OR MIT
// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>

//! Pseudo-random byte sources for random-fill
//!
//! The fill loop only needs "put the next N bytes of the stream into this
//! buffer", expressed by [`ByteSource`]. Seeding is a separate capability,
//! [`SeedSource`], so callers can derive the seed from the clock while tests pin
//! it to a constant.
//!
//! # Sources
//! - [`XoshiroSource`] (default): the stream is cut into fixed 1 MiB blocks and
//!   block `i` is produced by a Xoshiro256++ generator keyed by `(seed, i)`.
//!   Blocks are independent, so a large chunk is filled in parallel with
//!   rayon, and the bytes at a given stream offset never depend on chunk size
//!   or thread count.
//! - [`ChaChaSource`]: a single ChaCha8 keystream, sequential.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::SourceKind;
use crate::constants::{DGEN_BLOCK_SIZE, PARALLEL_BLOCK_THRESHOLD};

/// Capability: produce the next `buf.len()` bytes of a pseudo-random stream.
pub trait ByteSource {
    /// Short generator name for logs
    fn name(&self) -> &'static str;

    /// Overwrite all of `buf` with the next bytes of the stream.
    fn fill_bytes(&mut self, buf: &mut [u8]);
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn fill_bytes(&mut self, buf: &mut [u8]) {
        (**self).fill_bytes(buf)
    }
}

/// Capability: provide the seed a source is initialized with.
pub trait SeedSource {
    fn seed(&self) -> u64;
}

/// Seed derived from wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClockSeed;

impl SeedSource for ClockSeed {
    fn seed(&self) -> u64 {
        generate_clock_seed()
    }
}

/// A constant seed, for reproducible output.
#[derive(Debug, Clone, Copy)]
pub struct FixedSeed(pub u64);

impl SeedSource for FixedSeed {
    fn seed(&self) -> u64 {
        self.0
    }
}

/// Time-derived seed material, spread over all 64 bits
pub fn generate_clock_seed() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();

    splitmix64((nanos as u64) ^ ((nanos >> 64) as u64))
}

#[inline]
fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Per-block key. Mixing keeps streams of nearby seeds from sharing blocks.
#[inline]
fn block_key(seed: u64, block_idx: u64) -> u64 {
    splitmix64(seed ^ splitmix64(block_idx))
}

fn fill_block(out: &mut [u8], block_idx: u64, seed: u64) {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(block_key(seed, block_idx));
    rng.fill_bytes(out);
}

/// Block-parallel Xoshiro256++ stream
pub struct XoshiroSource {
    seed: u64,
    position: u64,                           // stream offset of the next byte
    block_size: usize,
    thread_pool: Option<rayon::ThreadPool>,  // created once, reused for every chunk
}

impl XoshiroSource {
    /// Source using all available cores.
    pub fn new(seed: u64) -> Self {
        Self::with_threads(seed, num_cpus::get())
    }

    /// Source limited to `max_threads` generator threads (1 = sequential).
    pub fn with_threads(seed: u64, max_threads: usize) -> Self {
        let thread_pool = if max_threads > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(max_threads)
                .thread_name(|i| format!("stomp-gen-{}", i))
                .build()
            {
                Ok(pool) => {
                    tracing::debug!("XoshiroSource using {} generator threads", max_threads);
                    Some(pool)
                }
                Err(e) => {
                    tracing::warn!("Failed to create thread pool: {}, falling back to sequential", e);
                    None
                }
            }
        } else {
            None
        };

        Self {
            seed,
            position: 0,
            block_size: DGEN_BLOCK_SIZE,
            thread_pool,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Stream offset of the next byte to be produced
    pub fn position(&self) -> u64 {
        self.position
    }

    fn fill_sequential(&self, buf: &mut [u8]) {
        let block_size = self.block_size as u64;
        let mut offset = 0usize;
        let mut pos = self.position;
        let mut scratch: Option<Vec<u8>> = None;

        while offset < buf.len() {
            let block_idx = pos / block_size;
            let in_block = (pos % block_size) as usize;
            let take = (self.block_size - in_block).min(buf.len() - offset);

            if in_block == 0 && take == self.block_size {
                fill_block(&mut buf[offset..offset + take], block_idx, self.seed);
            } else {
                let tmp = scratch.get_or_insert_with(|| vec![0u8; self.block_size]);
                fill_block(tmp, block_idx, self.seed);
                buf[offset..offset + take].copy_from_slice(&tmp[in_block..in_block + take]);
            }

            offset += take;
            pos += take as u64;
        }
    }

    fn fill_parallel(&self, pool: &rayon::ThreadPool, buf: &mut [u8]) {
        let block_size = self.block_size;
        let seed = self.seed;
        let in_block = (self.position % block_size as u64) as usize;
        let first_block = self.position / block_size as u64;

        // Align to block boundaries: the head covers the rest of a partially
        // consumed block, the tail is handled per slice below.
        let head_len = if in_block == 0 { 0 } else { (block_size - in_block).min(buf.len()) };
        let (head, body) = buf.split_at_mut(head_len);

        if !head.is_empty() {
            let mut tmp = vec![0u8; block_size];
            fill_block(&mut tmp, first_block, seed);
            head.copy_from_slice(&tmp[in_block..in_block + head.len()]);
        }

        let body_first = if head_len > 0 { first_block + 1 } else { first_block };
        pool.install(|| {
            body.par_chunks_mut(block_size)
                .enumerate()
                .for_each(|(i, out)| {
                    let block_idx = body_first + i as u64;
                    if out.len() == block_size {
                        fill_block(out, block_idx, seed);
                    } else {
                        let mut tmp = vec![0u8; block_size];
                        fill_block(&mut tmp, block_idx, seed);
                        out.copy_from_slice(&tmp[..out.len()]);
                    }
                });
        });
    }
}

impl ByteSource for XoshiroSource {
    fn name(&self) -> &'static str {
        "xoshiro256++"
    }

    fn fill_bytes(&mut self, buf: &mut [u8]) {
        if buf.is_empty() {
            return;
        }

        let blocks = buf.len().div_ceil(self.block_size);
        match &self.thread_pool {
            Some(pool) if blocks >= PARALLEL_BLOCK_THRESHOLD => self.fill_parallel(pool, buf),
            _ => self.fill_sequential(buf),
        }

        tracing::trace!(
            "XoshiroSource: filled {} bytes at stream offset {}",
            buf.len(),
            self.position
        );
        self.position += buf.len() as u64;
    }
}

/// Sequential ChaCha8 keystream.
///
/// Output is reproducible for the same seed and the same sequence of buffer
/// lengths; lengths that are not multiples of 4 drop the unused tail of a word.
pub struct ChaChaSource {
    rng: ChaCha8Rng,
}

impl ChaChaSource {
    pub fn new(seed: u64) -> Self {
        Self { rng: ChaCha8Rng::seed_from_u64(seed) }
    }
}

impl ByteSource for ChaChaSource {
    fn name(&self) -> &'static str {
        "chacha8"
    }

    fn fill_bytes(&mut self, buf: &mut [u8]) {
        self.rng.fill_bytes(buf);
    }
}

/// Build the source selected by `kind`, seeded once from `seeds`.
pub fn source_for(kind: SourceKind, seeds: &dyn SeedSource) -> Box<dyn ByteSource + Send> {
    let seed = seeds.seed();
    tracing::debug!("Seeding {:?} source with {}", kind, seed);
    match kind {
        SourceKind::Xoshiro => Box::new(XoshiroSource::new(seed)),
        SourceKind::Chacha => Box::new(ChaChaSource::new(seed)),
    }
}
