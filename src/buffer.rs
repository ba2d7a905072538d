// src/buffer.rs
//
// SPDX-License-Identifier: Apache-2.0 OR MIT
// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>

/// Reusable staging buffer for one chunk of output.
///
/// Allocated once per fill request at the chunk size and reused for every
/// chunk; a short final chunk uses a prefix of it.
#[derive(Debug)]
pub struct ChunkBuffer {
    data: Vec<u8>,
}

impl ChunkBuffer {
    pub fn new(capacity: usize) -> Self {
        Self { data: vec![0u8; capacity] }
    }

    /// Full capacity in bytes
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// First `len` bytes, for filling. `len` is clamped to the capacity.
    pub fn as_mut_slice(&mut self, len: usize) -> &mut [u8] {
        let len = len.min(self.data.len());
        &mut self.data[..len]
    }

    /// First `len` bytes, for writing. `len` is clamped to the capacity.
    pub fn as_slice(&self, len: usize) -> &[u8] {
        let len = len.min(self.data.len());
        &self.data[..len]
    }
}
