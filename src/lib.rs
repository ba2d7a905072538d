// src/lib.rs
//
// SPDX-License-Identifier: Apache-2.0 OR MIT
// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>
//
// Crate root: module tree plus the public re-exports the CLI and tests use.

//! # stomp
//!
//! Create very large files quickly, either zero-filled by extending the
//! logical length (no data written) or filled with pseudo-random bytes
//! streamed to disk in large chunks.
//!
//! ```no_run
//! use stomp::{generate_next, GenerationRequest, NoProgress};
//! use tokio_util::sync::CancellationToken;
//!
//! # fn main() -> stomp::Result<()> {
//! let request = GenerationRequest::random_fill(4 << 30, 1 << 30).with_seed(7);
//! let report = generate_next(".".as_ref(), &request, &mut NoProgress, &CancellationToken::new())?;
//! println!("wrote {} bytes to {}", report.actual, report.path.display());
//! # Ok(())
//! # }
//! ```

pub mod constants;
pub mod error;
pub mod config;
pub mod target;
pub mod allocate;
pub mod data_gen;
pub mod buffer;
pub mod progress;
pub mod page_cache;
pub mod fill;
pub mod naming;
pub mod input;
pub mod engine;

// ===== Re-exports =====
pub use error::{Result, StompError};
pub use config::{
    units_to_bytes,
    AllocStrategy,
    FillStrategy,
    GenerationMode,
    GenerationRequest,
    SourceKind,
};
pub use target::FileTarget;
pub use allocate::{FastAllocate, SparseAllocator};
pub use data_gen::{source_for, ByteSource, ChaChaSource, ClockSeed, FixedSeed, SeedSource, XoshiroSource};
pub use progress::{BarProgress, ChunkCompleted, DotProgress, FillProgress, NoProgress};
pub use fill::{fill, fill_with, FileSink, FillConfig, FillOutcome, FillStatus};
pub use naming::{available_names, next_available_name};
pub use input::{parse_number, read_file_size, read_number};
pub use engine::{generate, generate_many, generate_next, GenerationReport};
