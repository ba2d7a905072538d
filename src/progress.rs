use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::io::Write;
use std::time::Duration;

/// One completed (written and flushed) chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkCompleted {
    /// Zero-based chunk index
    pub index: u64,
    /// Bytes in this chunk (the last chunk may be short)
    pub chunk_bytes: u64,
    /// Bytes committed so far, including this chunk
    pub bytes_written: u64,
    pub total_bytes: u64,
    pub total_chunks: u64,
}

/// Observer for random-fill progress. One `chunk_completed` call per committed chunk.
pub trait FillProgress {
    fn start(&mut self, _total_bytes: u64, _total_chunks: u64) {}

    fn chunk_completed(&mut self, chunk: &ChunkCompleted);

    fn finish(&mut self, _bytes_written: u64, _elapsed: Duration) {}

    /// The fill stopped on an error; `bytes_written` counts the committed chunks.
    fn fail(&mut self, bytes_written: u64, elapsed: Duration) {
        self.finish(bytes_written, elapsed)
    }
}

impl<P: FillProgress + ?Sized> FillProgress for &mut P {
    fn start(&mut self, total_bytes: u64, total_chunks: u64) {
        (**self).start(total_bytes, total_chunks)
    }

    fn chunk_completed(&mut self, chunk: &ChunkCompleted) {
        (**self).chunk_completed(chunk)
    }

    fn finish(&mut self, bytes_written: u64, elapsed: Duration) {
        (**self).finish(bytes_written, elapsed)
    }

    fn fail(&mut self, bytes_written: u64, elapsed: Duration) {
        (**self).fail(bytes_written, elapsed)
    }
}

impl<P: FillProgress + ?Sized> FillProgress for Box<P> {
    fn start(&mut self, total_bytes: u64, total_chunks: u64) {
        (**self).start(total_bytes, total_chunks)
    }

    fn chunk_completed(&mut self, chunk: &ChunkCompleted) {
        (**self).chunk_completed(chunk)
    }

    fn finish(&mut self, bytes_written: u64, elapsed: Duration) {
        (**self).finish(bytes_written, elapsed)
    }

    fn fail(&mut self, bytes_written: u64, elapsed: Duration) {
        (**self).fail(bytes_written, elapsed)
    }
}

/// Discards progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl FillProgress for NoProgress {
    fn chunk_completed(&mut self, _chunk: &ChunkCompleted) {}
}

/// Prints one `.` per chunk and a newline at the end.
pub struct DotProgress<W: Write> {
    out: W,
}

impl DotProgress<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: std::io::stdout() }
    }
}

impl<W: Write> DotProgress<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> FillProgress for DotProgress<W> {
    fn chunk_completed(&mut self, _chunk: &ChunkCompleted) {
        // Progress output is best effort; a closed stdout must not fail the fill
        let _ = self.out.write_all(b".");
        let _ = self.out.flush();
    }

    fn finish(&mut self, _bytes_written: u64, _elapsed: Duration) {
        let _ = self.out.write_all(b"\n");
        let _ = self.out.flush();
    }
}

/// Creates a progress bar for fill operations with warp-style formatting
pub struct BarProgress {
    label: String,
    progress_bar: ProgressBar,
}

impl BarProgress {
    /// Standalone bar for one file
    pub fn new(label: &str) -> Self {
        Self::with_bar(label, ProgressBar::new(0))
    }

    /// Bar attached to a shared `MultiProgress`, one per concurrently generated file
    pub fn with_multi(multi: &MultiProgress, label: &str) -> Self {
        Self::with_bar(label, multi.add(ProgressBar::new(0)))
    }

    fn with_bar(label: &str, pb: ProgressBar) -> Self {
        let style = ProgressStyle::default_bar()
            .template(&format!(
                "{}: {{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, ETA: {{eta}}) {{msg}}",
                label
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ");
        pb.set_style(style);

        Self {
            label: label.to_string(),
            progress_bar: pb,
        }
    }

    pub fn bar(&self) -> &ProgressBar {
        &self.progress_bar
    }
}

impl FillProgress for BarProgress {
    fn start(&mut self, total_bytes: u64, total_chunks: u64) {
        self.progress_bar.set_length(total_bytes);
        self.progress_bar.set_message(format!("0/{} chunks", total_chunks));
    }

    fn chunk_completed(&mut self, chunk: &ChunkCompleted) {
        self.progress_bar.set_position(chunk.bytes_written);
        self.progress_bar
            .set_message(format!("{}/{} chunks", chunk.index + 1, chunk.total_chunks));
    }

    fn finish(&mut self, bytes_written: u64, elapsed: Duration) {
        let mib = bytes_written as f64 / 1_048_576.0;
        let secs = elapsed.as_secs_f64();
        let throughput = if secs > 0.0 { mib / secs } else { 0.0 };

        self.progress_bar.finish_with_message(format!(
            "{} complete! {:.2} MiB in {:.2}s ({:.2} MiB/s)",
            self.label, mib, secs, throughput
        ));
    }

    fn fail(&mut self, bytes_written: u64, _elapsed: Duration) {
        self.progress_bar.abandon_with_message(format!(
            "{} failed after {:.2} MiB",
            self.label,
            bytes_written as f64 / 1_048_576.0
        ));
    }
}
