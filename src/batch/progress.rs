//! Read-progress reporting for file batches

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Called as an input file is read: `(input, bytes_read, total_bytes)`.
///
/// Concurrent workers call it from their own threads.
pub type ProgressFn = Arc<dyn Fn(&Path, u64, u64) + Send + Sync>;

/// Reader that reports cumulative bytes to a [`ProgressFn`]
pub(crate) struct ProgressReader<R> {
    inner: R,
    input: PathBuf,
    read: u64,
    total: u64,
    progress: Option<ProgressFn>,
}

impl<R: Read> ProgressReader<R> {
    pub(crate) fn new(inner: R, input: &Path, total: u64, progress: Option<ProgressFn>) -> Self {
        if let Some(progress) = &progress {
            progress(input, 0, total);
        }
        ProgressReader {
            inner,
            input: input.to_path_buf(),
            read: 0,
            total,
            progress,
        }
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.read += n as u64;
            if let Some(progress) = &self.progress {
                progress(&self.input, self.read, self.total.max(self.read));
            }
        }
        Ok(n)
    }
}
