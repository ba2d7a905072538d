// src/bin/cli.rs
//
// SPDX-License-Identifier: Apache-2.0 OR MIT
// SPDX-FileCopyrightText: 2025 Russ Fellows <russ.fellows@gmail.com>
//
//! CLI supporting `zero` and `random`.
//!
//! Examples:
//! ```bash
//! stomp zero   --size 100                     # one 100 GiB zero-filled file
//! stomp zero   --size 4 --count 10 -j 4       # ten 4 GiB files, four at a time
//! stomp random --size 8                       # 8 GiB of pseudo-random bytes
//! stomp random --size 8 --seed 42 --pipelined --progress dots
//! stomp random                                # prompts for the size
//! ```

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use futures_util::stream::{FuturesUnordered, StreamExt};
use indicatif::MultiProgress;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use stomp::constants::{BYTES_PER_MIB, BYTES_PER_UNIT};
use stomp::{
    available_names, generate, read_file_size, units_to_bytes, AllocStrategy, BarProgress, DotProgress,
    FillProgress, FillStatus, FillStrategy, GenerationMode, GenerationReport, GenerationRequest,
    NoProgress, SourceKind,
};

/// Macro to safely print with broken pipe handling
macro_rules! safe_println {
    ($($arg:tt)*) => {
        match writeln!(io::stdout(), $($arg)*) {
            Ok(_) => {},
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                // Gracefully exit on broken pipe (e.g., when piped to head/tail)
                std::process::exit(0);
            }
            Err(e) => return Err(e.into())
        }
    };
}

// -- Commands

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[arg(short = 'v',
        long,
        action = ArgAction::Count,
        help = "Increase log verbosity: -v = Info, -vv = Debug",
    )]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create zero-filled files by extending their length; no data is written.
    Zero {
        /// File size in GB (2^30 bytes). Prompted for when omitted.
        #[arg(short = 's', long)]
        size: Option<u64>,

        /// Number of files to create.
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,

        /// Directory the stompN.dat files are created in.
        #[arg(short = 'd', long, env = "STOMP_DIR", default_value = ".")]
        dir: PathBuf,

        /// How the file length is set.
        #[arg(long, value_enum, default_value_t = AllocStrategy::Auto)]
        strategy: AllocStrategy,

        /// Files created concurrently.
        #[arg(short = 'j', long = "jobs", default_value_t = 1)]
        jobs: usize,
    },

    /// Create files of pseudo-random bytes, streamed to disk in chunks.
    Random {
        /// File size in GB (2^30 bytes). Prompted for when omitted.
        #[arg(short = 's', long)]
        size: Option<u64>,

        /// Number of files to create.
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,

        /// Directory the stompN.dat files are created in.
        #[arg(short = 'd', long, env = "STOMP_DIR", default_value = ".")]
        dir: PathBuf,

        /// Chunk size in MiB; one chunk is generated, written and flushed at a time.
        #[arg(long = "chunk-mib", env = "STOMP_CHUNK_MIB", default_value_t = 1024)]
        chunk_mib: u64,

        /// Seed for the generator. Derived from the clock when omitted.
        #[arg(long, env = "STOMP_SEED")]
        seed: Option<u64>,

        /// Pseudo-random generator.
        #[arg(long, value_enum, default_value_t = SourceKind::Xoshiro)]
        source: SourceKind,

        /// Generate the next chunk while the current one is written (two chunk buffers).
        #[arg(long)]
        pipelined: bool,

        /// sync_data() after every chunk.
        #[arg(long)]
        sync: bool,

        /// Drop written chunks from the page cache (Linux).
        #[arg(long = "drop-cache")]
        drop_cache: bool,

        /// Progress display.
        #[arg(long, value_enum, default_value_t = ProgressMode::Bar)]
        progress: ProgressMode,

        /// Files created concurrently.
        #[arg(short = 'j', long = "jobs", default_value_t = 1)]
        jobs: usize,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ProgressMode {
    /// indicatif progress bar per file
    Bar,
    /// One `.` per chunk
    Dots,
    None,
}

/// Main CLI function
#[tokio::main]
async fn main() -> Result<()> {
    // Loads any variables from .env file that are not already set
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",        // no -v: WARN level
        1 => "info",        // -v: INFO level
        _ => "debug",       // -vv or more: DEBUG level
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    match cli.cmd {
        Command::Zero { size, count, dir, strategy, jobs } => {
            let units = resolve_size(size, "Create large zero-filled files.")?;
            let request = GenerationRequest::zero_fill(units_to_bytes(units)?).with_alloc(strategy);
            run_batch(&dir, count, request, jobs, ProgressMode::None, cancel).await?;
        }

        Command::Random {
            size,
            count,
            dir,
            chunk_mib,
            seed,
            source,
            pipelined,
            sync,
            drop_cache,
            progress,
            jobs,
        } => {
            let units = resolve_size(size, "Create a large file of pseudo-random bytes.")?;
            let mut request = GenerationRequest::random_fill(units_to_bytes(units)?, chunk_bytes(chunk_mib)?)
                .with_source(source)
                .with_sync_chunks(sync)
                .with_drop_cache(drop_cache);
            if pipelined {
                request = request.with_fill(FillStrategy::Pipelined);
            }
            if let Some(seed) = seed {
                request = request.with_seed(seed);
            }
            run_batch(&dir, count, request, jobs, progress, cancel).await?;
        }
    }

    Ok(())
}

/// First Ctrl-C cancels at the next chunk boundary; the partial file is kept.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current chunk");
            cancel.cancel();
        }
    });
}

/// Size in whole GB from the flag, or from the interactive prompt.
fn resolve_size(size: Option<u64>, banner: &str) -> Result<u64> {
    match size {
        Some(0) => bail!("--size must be at least 1 GB"),
        Some(units) => Ok(units),
        None => {
            println!("{}", banner);
            let stdin = io::stdin();
            let units = read_file_size(&mut stdin.lock(), &mut io::stdout())
                .context("no file size entered")?;
            Ok(units)
        }
    }
}

fn chunk_bytes(chunk_mib: u64) -> Result<usize> {
    if chunk_mib == 0 {
        bail!("--chunk-mib must be at least 1");
    }
    let bytes = chunk_mib
        .checked_mul(BYTES_PER_MIB)
        .with_context(|| format!("chunk of {} MiB is too large", chunk_mib))?;
    usize::try_from(bytes).with_context(|| format!("chunk of {} MiB does not fit in memory", chunk_mib))
}

fn make_progress(mode: ProgressMode, multi: &MultiProgress, path: &Path) -> Box<dyn FillProgress + Send> {
    match mode {
        ProgressMode::Bar => {
            let label = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            Box::new(BarProgress::with_multi(multi, &label))
        }
        ProgressMode::Dots => Box::new(DotProgress::stdout()),
        ProgressMode::None => Box::new(NoProgress),
    }
}

/// Generate `count` files in `dir`, at most `jobs` at a time.
///
/// The first failure cancels the files not yet finished and is returned after
/// the in-flight ones have stopped.
async fn run_batch(
    dir: &Path,
    count: usize,
    request: GenerationRequest,
    jobs: usize,
    progress: ProgressMode,
    cancel: CancellationToken,
) -> Result<()> {
    if count == 0 {
        bail!("--count must be at least 1");
    }

    let names = available_names(dir, count);
    let effective_jobs = jobs.clamp(1, count);
    info!(
        "Creating {} file(s) of {} bytes in {} with {} job(s)",
        count,
        request.size,
        dir.display(),
        effective_jobs
    );

    let request = Arc::new(request);
    let multi = MultiProgress::new();
    let t0 = Instant::now();

    let sem = Arc::new(tokio::sync::Semaphore::new(effective_jobs));
    let mut futs = FuturesUnordered::new();

    for path in names {
        let sem = sem.clone();
        let request = request.clone();
        let cancel = cancel.clone();
        let multi = multi.clone();

        futs.push(tokio::spawn(async move {
            let _permit = sem.acquire_owned().await?;
            if cancel.is_cancelled() {
                debug!(path = %path.display(), "skipped, batch cancelled");
                return Ok::<Option<GenerationReport>, anyhow::Error>(None);
            }

            let report = tokio::task::spawn_blocking(move || {
                let mut progress = make_progress(progress, &multi, &path);
                generate(&path, &request, &mut progress, &cancel)
                    .with_context(|| format!("failed to create {}", path.display()))
            })
            .await??;
            Ok(Some(report))
        }));
    }

    let mut reports = Vec::with_capacity(count);
    let mut first_error = None;
    while let Some(result) = futs.next().await {
        match result.map_err(anyhow::Error::from).and_then(|r| r) {
            Ok(Some(report)) => reports.push(report),
            Ok(None) => {}
            Err(e) => {
                if first_error.is_none() {
                    cancel.cancel();
                    first_error = Some(e);
                }
            }
        }
    }

    reports.sort_by(|a, b| a.path.cmp(&b.path));
    for report in &reports {
        print_report(report)?;
    }

    if let Some(e) = first_error {
        return Err(e);
    }

    let total: u64 = reports.iter().map(|r| r.actual).sum();
    info!("Created {} file(s), {} bytes in {}", reports.len(), total, format_elapsed(t0.elapsed()));

    if reports.len() < count || reports.iter().any(|r| r.status == FillStatus::Cancelled) {
        bail!("interrupted: {} of {} file(s) completed", reports.iter().filter(|r| r.is_complete()).count(), count);
    }
    Ok(())
}

fn print_report(report: &GenerationReport) -> Result<()> {
    let secs = report.elapsed.as_secs_f64();
    let mib = report.actual as f64 / BYTES_PER_MIB as f64;
    let throughput = if secs > 0.0 { mib / secs } else { 0.0 };
    let gib = report.actual as f64 / BYTES_PER_UNIT as f64;

    let mode = match report.mode {
        GenerationMode::ZeroFill => "zero-filled",
        GenerationMode::RandomFill => "random-filled",
    };
    let status = match report.status {
        FillStatus::Completed => "",
        FillStatus::Cancelled => " (cancelled, partial file kept)",
    };

    match report.seed {
        Some(seed) => safe_println!(
            "{}: {} {:.2} GB in {} ({:.2} MiB/s, seed {}){}",
            report.path.display(), mode, gib, format_elapsed(report.elapsed), throughput, seed, status
        ),
        None => safe_println!(
            "{}: {} {:.2} GB in {}{}",
            report.path.display(), mode, gib, format_elapsed(report.elapsed), status
        ),
    }
    Ok(())
}

fn format_elapsed(elapsed: Duration) -> humantime::FormattedDuration {
    // millisecond resolution is plenty for a human
    humantime::format_duration(Duration::from_millis(elapsed.as_millis() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_random_flags() {
        let cli = Cli::try_parse_from([
            "stomp", "-vv", "random", "--size", "2", "--chunk-mib", "64", "--seed", "9",
            "--source", "chacha", "--pipelined", "--progress", "dots", "-j", "2",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.cmd {
            Command::Random { size, chunk_mib, seed, source, pipelined, progress, jobs, .. } => {
                assert_eq!(size, Some(2));
                assert_eq!(chunk_mib, 64);
                assert_eq!(seed, Some(9));
                assert_eq!(source, SourceKind::Chacha);
                assert!(pipelined);
                assert_eq!(progress, ProgressMode::Dots);
                assert_eq!(jobs, 2);
            }
            Command::Zero { .. } => panic!("parsed as zero"),
        }
    }

    #[test]
    fn test_cli_parses_zero_strategy() {
        let cli = Cli::try_parse_from(["stomp", "zero", "-s", "3", "--strategy", "write-last-byte", "-n", "4"]).unwrap();
        match cli.cmd {
            Command::Zero { size, strategy, count, .. } => {
                assert_eq!(size, Some(3));
                assert_eq!(strategy, AllocStrategy::WriteLastByte);
                assert_eq!(count, 4);
            }
            Command::Random { .. } => panic!("parsed as random"),
        }
    }

    #[test]
    fn test_zero_size_flag_rejected() {
        assert!(resolve_size(Some(0), "").is_err());
        assert_eq!(resolve_size(Some(5), "").unwrap(), 5);
    }

    #[test]
    fn test_chunk_bytes() {
        assert_eq!(chunk_bytes(1).unwrap(), 1 << 20);
        assert!(chunk_bytes(0).is_err());
        assert!(chunk_bytes(u64::MAX).is_err());
    }

    #[tokio::test]
    async fn test_run_batch_zero_fill() {
        let dir = tempfile::tempdir().unwrap();
        let request = GenerationRequest::zero_fill(8192);
        run_batch(dir.path(), 3, request, 2, ProgressMode::None, CancellationToken::new())
            .await
            .unwrap();

        for n in 0..3 {
            let path = dir.path().join(format!("stomp{}.dat", n));
            assert_eq!(std::fs::metadata(&path).unwrap().len(), 8192);
        }
    }

    #[tokio::test]
    async fn test_run_batch_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let request = GenerationRequest::random_fill(100, 10);
        let err = run_batch(&missing, 1, request, 1, ProgressMode::None, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to create"));
    }
}
