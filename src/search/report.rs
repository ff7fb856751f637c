//! Output sink for match reports.
//!
//! Reports are written whole (header plus engine output) so a report is never split by
//! anything else written to the same sink.

use crate::error::{Result, ZsiftError};
use colored::Colorize;
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;

/// Writes highlighted match reports to a sink
pub struct Reporter {
    out: Box<dyn Write + Send>,
    color: bool,
}

impl Reporter {
    pub fn new(out: Box<dyn Write + Send>, color: bool) -> Self {
        Self { out, color }
    }

    /// Report to standard output
    pub fn stdout(color: bool) -> Self {
        Self::new(Box::new(std::io::stdout()), color)
    }

    /// Report into an in-memory buffer the caller can inspect
    pub fn buffered() -> (Self, SharedBuffer) {
        let buffer = SharedBuffer::default();
        (Self::new(Box::new(buffer.clone()), false), buffer)
    }

    /// Header line naming the source of a report.
    ///
    /// With color on, escape codes are still subject to `colored`'s process-wide control,
    /// which the binary sets once at startup.
    pub fn header(&self, label: &str) -> String {
        let text = format!("Results for {}:", label);
        if self.color {
            text.bold().magenta().to_string()
        } else {
            text
        }
    }

    /// Print one match report
    pub fn report_match(&mut self, label: &str, output: &[u8]) -> Result<()> {
        let mut report = self.header(label).into_bytes();
        report.push(b'\n');
        report.extend_from_slice(output);
        if !output.ends_with(b"\n") {
            report.push(b'\n');
        }

        self.out
            .write_all(&report)
            .and_then(|_| self.out.flush())
            .map_err(|e| ZsiftError::file_error("Failed to write match report", e))
    }
}

/// Cloneable in-memory sink
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock()).into_owned()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.lock().is_empty()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.bytes.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
