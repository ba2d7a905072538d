// src/fill.rs
//
// SPDX-License-Identifier: Apache-2.0 OR MIT
// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>

//! Chunked random-fill streaming
//!
//! A random-fill writes `total_bytes` of pseudo-random data into a sink one
//! chunk at a time: fill the reusable buffer, `write_all`, `flush`, signal
//! progress, repeat. A chunk is never generated before the previous one has
//! been written and flushed, so a failed or cancelled fill always leaves a
//! prefix of whole chunks behind.
//!
//! Two strategies share those guarantees:
//! - `Sequential`: everything on the calling thread.
//! - `Pipelined`: a scoped generator thread fills the next buffer while the
//!   calling thread writes the current one. Two buffers circulate through a
//!   bounded channel, so memory stays at two chunks.

use std::fs::File;
use std::io::{self, Write};
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::buffer::ChunkBuffer;
use crate::config::FillStrategy;
use crate::constants::DEFAULT_CHUNK_SIZE;
use crate::data_gen::ByteSource;
use crate::error::{Result, StompError};
use crate::page_cache;
use crate::progress::{ChunkCompleted, FillProgress, NoProgress};

/// How a fill ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillStatus {
    Completed,
    /// Stopped at a chunk boundary because the cancellation token fired
    Cancelled,
}

/// Result of a fill that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillOutcome {
    pub bytes_written: u64,
    pub chunks_written: u64,
    pub status: FillStatus,
    pub elapsed: Duration,
}

impl FillOutcome {
    pub fn is_complete(&self) -> bool {
        self.status == FillStatus::Completed
    }
}

/// Fill loop settings.
#[derive(Debug, Clone)]
pub struct FillConfig {
    pub chunk_size: usize,
    pub strategy: FillStrategy,
    /// Checked before each chunk; never interrupts a chunk in flight
    pub cancel: CancellationToken,
}

impl Default for FillConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            strategy: FillStrategy::default(),
            cancel: CancellationToken::new(),
        }
    }
}

impl FillConfig {
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size, ..Default::default() }
    }

    pub fn with_strategy(mut self, strategy: FillStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Stream `total_bytes` from `source` into `sink` in `chunk_size` chunks,
/// sequentially and without progress reporting.
pub fn fill<W, S>(sink: &mut W, total_bytes: u64, chunk_size: usize, source: &mut S) -> Result<FillOutcome>
where
    W: Write + ?Sized,
    S: ByteSource + Send + ?Sized,
{
    fill_with(sink, total_bytes, source, &FillConfig::new(chunk_size), &mut NoProgress)
}

/// Stream `total_bytes` from `source` into `sink` as configured.
///
/// The final chunk is short when `total_bytes` is not a multiple of the chunk
/// size. `progress` receives exactly one `chunk_completed` per chunk that was
/// written and flushed.
///
/// # Errors
/// - [`StompError::InvalidInput`] for a zero chunk size
/// - [`StompError::WriteFailed`] on the first failed write or flush, carrying
///   the bytes of the chunks committed before it
pub fn fill_with<W, S, P>(
    sink: &mut W,
    total_bytes: u64,
    source: &mut S,
    config: &FillConfig,
    progress: &mut P,
) -> Result<FillOutcome>
where
    W: Write + ?Sized,
    S: ByteSource + Send + ?Sized,
    P: FillProgress + ?Sized,
{
    if config.chunk_size == 0 {
        return Err(StompError::InvalidInput("chunk size must be greater than zero".into()));
    }

    let plan = ChunkPlan::new(total_bytes, config.chunk_size);
    debug!(
        total_bytes,
        chunk_size = config.chunk_size,
        chunks = plan.total_chunks,
        strategy = ?config.strategy,
        source = source.name(),
        "starting random fill"
    );

    progress.start(total_bytes, plan.total_chunks);
    let started = Instant::now();

    let result = match config.strategy {
        FillStrategy::Sequential => fill_sequential(sink, source, &plan, &config.cancel, progress),
        FillStrategy::Pipelined => fill_pipelined(sink, source, &plan, &config.cancel, progress),
    };

    let elapsed = started.elapsed();
    let (bytes_written, chunks_written, status) = match result {
        Ok(counts) => counts,
        Err(e) => {
            progress.fail(e.bytes_written().unwrap_or(0), elapsed);
            return Err(e);
        }
    };
    progress.finish(bytes_written, elapsed);

    match status {
        FillStatus::Completed => info!(bytes_written, chunks_written, ?elapsed, "random fill complete"),
        FillStatus::Cancelled => warn!(bytes_written, chunks_written, "random fill cancelled"),
    }

    Ok(FillOutcome { bytes_written, chunks_written, status, elapsed })
}

/// Chunk boundaries of one fill.
struct ChunkPlan {
    total_bytes: u64,
    chunk_size: u64,
    total_chunks: u64,
}

impl ChunkPlan {
    fn new(total_bytes: u64, chunk_size: usize) -> Self {
        let chunk_size = chunk_size as u64;
        Self {
            total_bytes,
            chunk_size,
            total_chunks: total_bytes.div_ceil(chunk_size),
        }
    }

    /// Length of the chunk starting at `offset`
    fn chunk_len(&self, offset: u64) -> usize {
        // bounded by chunk_size, which came from a usize
        (self.total_bytes - offset).min(self.chunk_size) as usize
    }

    /// Never larger than the file, so small fills do not pay for a full chunk
    fn buffer_capacity(&self) -> usize {
        self.chunk_size.min(self.total_bytes) as usize
    }

    fn completed(&self, index: u64, chunk_bytes: usize, bytes_written: u64) -> ChunkCompleted {
        ChunkCompleted {
            index,
            chunk_bytes: chunk_bytes as u64,
            bytes_written,
            total_bytes: self.total_bytes,
            total_chunks: self.total_chunks,
        }
    }
}

/// Write and flush one chunk; `committed` is the byte count before it.
fn commit<W: Write + ?Sized>(sink: &mut W, chunk: &[u8], committed: u64) -> Result<()> {
    sink.write_all(chunk)
        .and_then(|_| sink.flush())
        .map_err(|source| StompError::WriteFailed { bytes_written: committed, source })
}

fn fill_sequential<W, S, P>(
    sink: &mut W,
    source: &mut S,
    plan: &ChunkPlan,
    cancel: &CancellationToken,
    progress: &mut P,
) -> Result<(u64, u64, FillStatus)>
where
    W: Write + ?Sized,
    S: ByteSource + ?Sized,
    P: FillProgress + ?Sized,
{
    let mut buffer = ChunkBuffer::new(plan.buffer_capacity());
    let mut written = 0u64;

    for index in 0..plan.total_chunks {
        if cancel.is_cancelled() {
            return Ok((written, index, FillStatus::Cancelled));
        }

        let len = plan.chunk_len(written);
        source.fill_bytes(buffer.as_mut_slice(len));
        commit(sink, buffer.as_slice(len), written)?;
        written += len as u64;

        trace!(chunk = index, bytes_written = written, "chunk committed");
        progress.chunk_completed(&plan.completed(index, len, written));
    }

    Ok((written, plan.total_chunks, FillStatus::Completed))
}

fn fill_pipelined<W, S, P>(
    sink: &mut W,
    source: &mut S,
    plan: &ChunkPlan,
    cancel: &CancellationToken,
    progress: &mut P,
) -> Result<(u64, u64, FillStatus)>
where
    W: Write + ?Sized,
    S: ByteSource + Send + ?Sized,
    P: FillProgress + ?Sized,
{
    if plan.total_chunks == 0 {
        return Ok((0, 0, FillStatus::Completed));
    }

    std::thread::scope(|scope| {
        let (full_tx, full_rx) = mpsc::sync_channel::<(ChunkBuffer, usize)>(1);
        let (empty_tx, empty_rx) = mpsc::channel::<ChunkBuffer>();

        for _ in 0..2 {
            let _ = empty_tx.send(ChunkBuffer::new(plan.buffer_capacity()));
        }

        let generator_cancel = cancel.clone();
        scope.spawn(move || {
            let mut generated = 0u64;
            while generated < plan.total_bytes {
                if generator_cancel.is_cancelled() {
                    break;
                }
                // Writer gone: it failed or finished
                let Ok(mut buffer) = empty_rx.recv() else { break };

                let len = plan.chunk_len(generated);
                source.fill_bytes(buffer.as_mut_slice(len));
                generated += len as u64;

                if full_tx.send((buffer, len)).is_err() {
                    break;
                }
            }
        });

        let mut written = 0u64;
        for index in 0..plan.total_chunks {
            if cancel.is_cancelled() {
                return Ok((written, index, FillStatus::Cancelled));
            }

            let (buffer, len) = match full_rx.recv() {
                Ok(next) => next,
                Err(_) if cancel.is_cancelled() => {
                    return Ok((written, index, FillStatus::Cancelled));
                }
                Err(_) => {
                    return Err(StompError::WriteFailed {
                        bytes_written: written,
                        source: io::Error::other("chunk generator stopped early"),
                    });
                }
            };

            commit(sink, buffer.as_slice(len), written)?;
            written += len as u64;

            trace!(chunk = index, bytes_written = written, "chunk committed");
            progress.chunk_completed(&plan.completed(index, len, written));

            let _ = empty_tx.send(buffer);
        }

        Ok((written, plan.total_chunks, FillStatus::Completed))
    })
}

/// `Write` adapter over a destination file.
///
/// Each `flush` marks a chunk boundary: it optionally forces the data to
/// stable storage and drops the newly committed range from the page cache.
pub struct FileSink<'a> {
    file: &'a File,
    sync_chunks: bool,
    drop_cache: bool,
    committed: u64,
    pending: u64,
}

impl<'a> FileSink<'a> {
    pub fn new(file: &'a File) -> Self {
        Self {
            file,
            sync_chunks: false,
            drop_cache: false,
            committed: 0,
            pending: 0,
        }
    }

    /// `sync_data()` on every flush
    pub fn with_sync_chunks(mut self, sync: bool) -> Self {
        self.sync_chunks = sync;
        self
    }

    /// Drop committed chunks from the page cache
    pub fn with_drop_cache(mut self, drop_cache: bool) -> Self {
        if drop_cache {
            if let Err(e) = page_cache::advise_sequential(self.file) {
                debug!("posix_fadvise(SEQUENTIAL) failed: {}", e);
            }
        }
        self.drop_cache = drop_cache;
        self
    }

    /// Bytes covered by a completed flush
    pub fn committed(&self) -> u64 {
        self.committed
    }
}

impl Write for FileSink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.file.write(buf)?;
        self.pending += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()?;
        if self.sync_chunks || self.drop_cache {
            // DONTNEED skips dirty pages, so drop-cache implies a sync
            self.file.sync_data()?;
        }
        if self.drop_cache && self.pending > 0 {
            if let Err(e) = page_cache::drop_cache_region(self.file, self.committed, self.pending) {
                debug!(offset = self.committed, len = self.pending, "posix_fadvise(DONTNEED) failed: {}", e);
            }
        }
        self.committed += self.pending;
        self.pending = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_gen::XoshiroSource;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Counts up from 0, one byte at a time, so chunk boundaries are visible in output.
    struct Counter(u8);

    impl ByteSource for Counter {
        fn name(&self) -> &'static str {
            "counter"
        }

        fn fill_bytes(&mut self, buf: &mut [u8]) {
            for b in buf.iter_mut() {
                *b = self.0;
                self.0 = self.0.wrapping_add(1);
            }
        }
    }

    /// Accepts whole chunks until the `fail_on`-th (1-based) write call.
    struct FailingWriter {
        data: Vec<u8>,
        writes: usize,
        fail_on: usize,
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.writes += 1;
            if self.writes == self.fail_on {
                return Err(io::Error::new(io::ErrorKind::StorageFull, "no space left"));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct FailingFlush;

    impl Write for FailingFlush {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::other("flush failed"))
        }
    }

    #[derive(Default)]
    struct Recorder {
        chunks: Vec<ChunkCompleted>,
        finished: Option<u64>,
    }

    impl FillProgress for Recorder {
        fn chunk_completed(&mut self, chunk: &ChunkCompleted) {
            self.chunks.push(*chunk);
        }

        fn finish(&mut self, bytes_written: u64, _elapsed: Duration) {
            self.finished = Some(bytes_written);
        }
    }

    /// Cancels after a number of chunks.
    struct CancelAfter {
        token: CancellationToken,
        after: u64,
        seen: u64,
    }

    impl FillProgress for CancelAfter {
        fn chunk_completed(&mut self, _chunk: &ChunkCompleted) {
            self.seen += 1;
            if self.seen == self.after {
                self.token.cancel();
            }
        }
    }

    #[test]
    fn test_exact_multiple_writes_every_chunk() {
        let mut out = Vec::new();
        let mut recorder = Recorder::default();
        let outcome = fill_with(&mut out, 64, &mut Counter(0), &FillConfig::new(16), &mut recorder).unwrap();

        assert_eq!(outcome.bytes_written, 64);
        assert_eq!(outcome.chunks_written, 4);
        assert!(outcome.is_complete());
        assert_eq!(out.len(), 64);
        assert_eq!(out, (0u8..64).collect::<Vec<_>>());
        assert_eq!(recorder.chunks.len(), 4);
        assert_eq!(recorder.finished, Some(64));
    }

    #[test]
    fn test_partial_last_chunk() {
        let mut out = Vec::new();
        let mut recorder = Recorder::default();
        let outcome = fill_with(&mut out, 40, &mut Counter(0), &FillConfig::new(16), &mut recorder).unwrap();

        assert_eq!(outcome.bytes_written, 40);
        assert_eq!(outcome.chunks_written, 3);
        assert_eq!(out.len(), 40);

        let sizes: Vec<u64> = recorder.chunks.iter().map(|c| c.chunk_bytes).collect();
        assert_eq!(sizes, vec![16, 16, 8]);
        assert_eq!(recorder.chunks.last().unwrap().bytes_written, 40);
        assert!(recorder.chunks.iter().all(|c| c.total_chunks == 3));
    }

    #[test]
    fn test_total_smaller_than_chunk() {
        let mut out = Vec::new();
        let outcome = fill(&mut out, 5, 1 << 20, &mut Counter(0)).unwrap();
        assert_eq!(outcome.chunks_written, 1);
        assert_eq!(out, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_zero_total_writes_nothing() {
        for strategy in [FillStrategy::Sequential, FillStrategy::Pipelined] {
            let mut out = Vec::new();
            let mut recorder = Recorder::default();
            let config = FillConfig::new(16).with_strategy(strategy);
            let outcome = fill_with(&mut out, 0, &mut Counter(0), &config, &mut recorder).unwrap();

            assert_eq!(outcome.bytes_written, 0);
            assert_eq!(outcome.chunks_written, 0);
            assert!(outcome.is_complete());
            assert!(out.is_empty());
            assert!(recorder.chunks.is_empty());
        }
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let mut out = Vec::new();
        let err = fill(&mut out, 10, 0, &mut Counter(0)).unwrap_err();
        assert!(matches!(err, StompError::InvalidInput(_)));
        assert!(out.is_empty());
    }

    #[test]
    fn test_failure_keeps_only_whole_prior_chunks() {
        for strategy in [FillStrategy::Sequential, FillStrategy::Pipelined] {
            // 5 chunks, third write fails
            let mut sink = FailingWriter { data: Vec::new(), writes: 0, fail_on: 3 };
            let mut recorder = Recorder::default();
            let config = FillConfig::new(10).with_strategy(strategy);

            let err = fill_with(&mut sink, 50, &mut Counter(0), &config, &mut recorder).unwrap_err();

            assert_eq!(err.bytes_written(), Some(20), "strategy {:?}", strategy);
            assert_eq!(sink.data.len(), 20);
            assert_eq!(sink.data, (0u8..20).collect::<Vec<_>>());
            assert_eq!(recorder.chunks.len(), 2);
            // the observer is closed out with the committed count
            assert_eq!(recorder.finished, Some(20));
        }
    }

    #[test]
    fn test_flush_failure_is_write_failed() {
        let err = fill(&mut FailingFlush, 30, 10, &mut Counter(0)).unwrap_err();
        match err {
            StompError::WriteFailed { bytes_written, source } => {
                assert_eq!(bytes_written, 0);
                assert_eq!(source.to_string(), "flush failed");
            }
            other => panic!("expected WriteFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_write_flush_progress_order() {
        let log = Rc::new(RefCell::new(Vec::new()));

        struct LoggingSink(Rc<RefCell<Vec<&'static str>>>);
        impl Write for LoggingSink {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.borrow_mut().push("write");
                Ok(buf.len())
            }
            fn flush(&mut self) -> io::Result<()> {
                self.0.borrow_mut().push("flush");
                Ok(())
            }
        }

        struct LoggingProgress(Rc<RefCell<Vec<&'static str>>>);
        impl FillProgress for LoggingProgress {
            fn chunk_completed(&mut self, _chunk: &ChunkCompleted) {
                self.0.borrow_mut().push("progress");
            }
        }

        let mut sink = LoggingSink(Rc::clone(&log));
        let mut progress = LoggingProgress(Rc::clone(&log));
        fill_with(&mut sink, 20, &mut Counter(0), &FillConfig::new(10), &mut progress).unwrap();

        assert_eq!(
            *log.borrow(),
            vec!["write", "flush", "progress", "write", "flush", "progress"]
        );
    }

    #[test]
    fn test_cancel_stops_at_chunk_boundary() {
        for strategy in [FillStrategy::Sequential, FillStrategy::Pipelined] {
            let token = CancellationToken::new();
            let config = FillConfig::new(8).with_strategy(strategy).with_cancel(token.clone());
            let mut progress = CancelAfter { token, after: 2, seen: 0 };
            let mut out = Vec::new();

            let outcome = fill_with(&mut out, 80, &mut Counter(0), &config, &mut progress).unwrap();

            assert_eq!(outcome.status, FillStatus::Cancelled, "strategy {:?}", strategy);
            assert_eq!(outcome.chunks_written, 2);
            assert_eq!(outcome.bytes_written, 16);
            assert_eq!(out.len(), 16);
        }
    }

    #[test]
    fn test_cancelled_before_start_writes_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let config = FillConfig::new(8).with_cancel(token);
        let mut out = Vec::new();

        let outcome = fill_with(&mut out, 80, &mut Counter(0), &config, &mut NoProgress).unwrap();
        assert_eq!(outcome.status, FillStatus::Cancelled);
        assert_eq!(outcome.bytes_written, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_pipelined_matches_sequential() {
        let total = 3 * 1024 * 1024 + 12345;
        let chunk = 1024 * 1024;

        let mut sequential = Vec::new();
        fill(&mut sequential, total, chunk, &mut XoshiroSource::with_threads(42, 2)).unwrap();

        let mut pipelined = Vec::new();
        let config = FillConfig::new(chunk).with_strategy(FillStrategy::Pipelined);
        let outcome = fill_with(
            &mut pipelined,
            total,
            &mut XoshiroSource::with_threads(42, 2),
            &config,
            &mut NoProgress,
        )
        .unwrap();

        assert_eq!(outcome.chunks_written, 4);
        assert_eq!(pipelined.len() as u64, total);
        assert!(sequential == pipelined);
    }

    #[test]
    fn test_file_sink_commits_each_flush() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sink.dat");
        let file = File::create(&path).unwrap();

        let mut sink = FileSink::new(&file).with_sync_chunks(true).with_drop_cache(true);
        let outcome = fill(&mut sink, 3 * 4096 + 100, 4096, &mut Counter(7)).unwrap();

        assert_eq!(outcome.bytes_written, 3 * 4096 + 100);
        assert_eq!(sink.committed(), 3 * 4096 + 100);
        drop(file);

        let data = std::fs::read(&path).unwrap();
        assert_eq!(data.len(), 3 * 4096 + 100);
        assert_eq!(data[0], 7);
        assert_eq!(data[4096], 7u8.wrapping_add((4096 % 256) as u8));
    }
}
