//! Human-readable record of a reconstruction run.
//!
//! The log is an explicit sink handed down to every stage that reports
//! progress, so that the numerical code has no hidden I/O. It implements
//! `std::io::Write`: use `writeln!(log, ...)?`.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{ReconstructionError, Result};

pub struct FullLog {
    sink: Box<dyn Write + Send>,
    path: Option<PathBuf>,
}

impl FullLog {

    /// Create (truncate) the log file at `path`
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| ReconstructionError::io(path, e))?;
        Ok(Self { sink: Box::new(BufWriter::new(file)), path: Some(path.to_path_buf()) })
    }

    /// A log which discards everything
    pub fn sink() -> Self {
        Self::to_writer(io::sink())
    }

    pub fn to_writer(writer: impl Write + Send + 'static) -> Self {
        Self { sink: Box::new(writer), path: None }
    }

    pub fn path(&self) -> Option<&Path> { self.path.as_deref() }

    /// Write a separator line followed by `title`
    pub fn section(&mut self, title: &str) -> io::Result<()> {
        writeln!(self.sink, "\n--------------------------------")?;
        writeln!(self.sink, "{title}")
    }
}

impl Write for FullLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> { self.sink.write(buf) }
    fn flush(&mut self) -> io::Result<()> { self.sink.flush() }
}

impl Drop for FullLog {
    fn drop(&mut self) {
        let _ = self.sink.flush();
    }
}
