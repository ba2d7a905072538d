// src/engine.rs
//
// SPDX-License-Identifier: Apache-2.0 OR MIT
// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>

//! Request dispatch: open the destination, run the selected generator, then
//! check the final on-disk size before reporting success.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::allocate::SparseAllocator;
use crate::config::{GenerationMode, GenerationRequest};
use crate::data_gen::{source_for, ClockSeed, FixedSeed, SeedSource};
use crate::error::{Result, StompError};
use crate::fill::{fill_with, FileSink, FillConfig, FillOutcome, FillStatus};
use crate::naming::{available_names, next_available_name};
use crate::progress::FillProgress;
use crate::target::FileTarget;

/// What one finished request produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationReport {
    pub path: PathBuf,
    pub mode: GenerationMode,
    /// Requested size in bytes
    pub requested: u64,
    /// Size observed on disk when the request finished
    pub actual: u64,
    pub elapsed: Duration,
    pub status: FillStatus,
    /// Seed used for random-fill, so a run can be reproduced
    pub seed: Option<u64>,
}

impl GenerationReport {
    pub fn is_complete(&self) -> bool {
        self.status == FillStatus::Completed
    }
}

/// Create `path` and fill it as `request` describes.
///
/// A zero-fill ignores `progress` and `cancel`; it is a single length change.
/// A completed request is only reported when the on-disk size equals the
/// requested size; otherwise [`StompError::SizeMismatch`] is returned.
pub fn generate<P>(
    path: &Path,
    request: &GenerationRequest,
    progress: &mut P,
    cancel: &CancellationToken,
) -> Result<GenerationReport>
where
    P: FillProgress + ?Sized,
{
    if request.mode == GenerationMode::RandomFill && request.chunk_size == 0 {
        return Err(StompError::InvalidInput("chunk size must be greater than zero".into()));
    }

    let started = Instant::now();
    let target = FileTarget::create(path, request.size)?;

    let (status, seed, actual) = match request.mode {
        GenerationMode::ZeroFill => {
            let actual = SparseAllocator::new(request.alloc).allocate_verified(&target)?;
            (FillStatus::Completed, None, actual)
        }
        GenerationMode::RandomFill => {
            let seed = request.seed.unwrap_or_else(|| ClockSeed.seed());
            let mut sink = FileSink::new(target.file())
                .with_sync_chunks(request.sync_chunks)
                .with_drop_cache(request.drop_cache);

            let outcome = fill_target(&target, &mut sink, request, seed, progress, cancel)?;
            let actual = target.observed_len().map_err(|source| StompError::WriteFailed {
                bytes_written: outcome.bytes_written,
                source,
            })?;
            (outcome.status, Some(seed), actual)
        }
    };

    if status == FillStatus::Completed && actual != request.size {
        return Err(StompError::SizeMismatch {
            path: path.to_path_buf(),
            expected: request.size,
            actual,
        });
    }

    // release the handle before reporting
    drop(target);

    let report = GenerationReport {
        path: path.to_path_buf(),
        mode: request.mode,
        requested: request.size,
        actual,
        elapsed: started.elapsed(),
        status,
        seed,
    };
    info!(
        path = %report.path.display(),
        mode = ?report.mode,
        bytes = report.actual,
        elapsed = ?report.elapsed,
        status = ?report.status,
        "generation finished"
    );
    Ok(report)
}

/// Random-fill `target` through `sink`, a writer over the target's handle.
///
/// A write that fails part way through a chunk can leave some of that chunk on
/// disk (ENOSPC, EFBIG, quota). The file is cut back to the committed chunks
/// before the error is returned, so its length matches `bytes_written`.
fn fill_target<W, P>(
    target: &FileTarget,
    sink: &mut W,
    request: &GenerationRequest,
    seed: u64,
    progress: &mut P,
    cancel: &CancellationToken,
) -> Result<FillOutcome>
where
    W: Write + ?Sized,
    P: FillProgress + ?Sized,
{
    let mut source = source_for(request.source, &FixedSeed(seed));
    let config = FillConfig::new(request.chunk_size)
        .with_strategy(request.fill)
        .with_cancel(cancel.clone());

    fill_with(sink, request.size, &mut source, &config, progress).inspect_err(|e| {
        if let Some(committed) = e.bytes_written() {
            truncate_to_committed(target, committed);
        }
    })
}

fn truncate_to_committed(target: &FileTarget, committed: u64) {
    match target.file().set_len(committed) {
        Ok(()) => debug!(path = %target.path().display(), committed, "dropped partial chunk"),
        Err(e) => warn!(
            path = %target.path().display(),
            committed,
            "could not drop partial chunk after failed write: {}",
            e
        ),
    }
}

/// [`generate`] into the next free `stomp{n}.dat` in `dir`.
pub fn generate_next<P>(
    dir: &Path,
    request: &GenerationRequest,
    progress: &mut P,
    cancel: &CancellationToken,
) -> Result<GenerationReport>
where
    P: FillProgress + ?Sized,
{
    let path = next_available_name(dir);
    generate(&path, request, progress, cancel)
}

/// Generate `count` files in `dir`, one after another.
///
/// Stops at the first failure and returns it; files completed before it stay
/// on disk. A cancelled file ends the batch and is the last report returned.
pub fn generate_many<P>(
    dir: &Path,
    count: usize,
    request: &GenerationRequest,
    progress: &mut P,
    cancel: &CancellationToken,
) -> Result<Vec<GenerationReport>>
where
    P: FillProgress + ?Sized,
{
    let mut reports = Vec::with_capacity(count);
    for (i, path) in available_names(dir, count).into_iter().enumerate() {
        if cancel.is_cancelled() {
            debug!(remaining = count - i, "batch cancelled before next file");
            break;
        }
        let report = generate(&path, request, progress, cancel)?;
        let done = report.is_complete();
        reports.push(report);
        if !done {
            break;
        }
    }
    Ok(reports)
}
