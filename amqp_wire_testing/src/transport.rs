//! In-memory transport replaying scripted input.

use std::{
    collections::VecDeque,
    io::{self, Read, Write},
};

use rstest::fixture;

/// Blocking stream that yields queued chunks and captures writes.
///
/// Each chunk is delivered by separate reads, so chunk boundaries model the
/// boundaries of socket reads. [`ScriptedTransport::with_read_limit`] further
/// caps every read to exercise reassembly across arbitrary splits. An empty
/// chunk, or the end of the script, reads as an orderly close.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    inbound: VecDeque<Vec<u8>>,
    read_limit: Option<usize>,
    written: Vec<u8>,
    reads: usize,
    fail_writes: bool,
}

impl ScriptedTransport {
    /// Create a transport with an empty script.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Deliver at most `limit` bytes per read.
    #[must_use]
    pub fn with_read_limit(mut self, limit: usize) -> Self {
        self.read_limit = Some(limit.max(1));
        self
    }

    /// Queue `chunk` for delivery after everything already queued.
    pub fn push(&mut self, chunk: impl Into<Vec<u8>>) -> &mut Self {
        self.inbound.push_back(chunk.into());
        self
    }

    /// Make every subsequent write fail with `BrokenPipe`.
    pub fn fail_writes(&mut self) { self.fail_writes = true; }

    /// Bytes written so far.
    #[must_use]
    pub fn written(&self) -> &[u8] { &self.written }

    /// Take the bytes written so far, leaving the capture empty.
    pub fn take_written(&mut self) -> Vec<u8> { std::mem::take(&mut self.written) }

    /// Number of non-empty reads served.
    #[must_use]
    pub fn reads(&self) -> usize { self.reads }

    /// Returns true once every scripted byte has been read.
    #[must_use]
    pub fn is_drained(&self) -> bool { self.inbound.is_empty() }
}

impl Read for ScriptedTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(mut chunk) = self.inbound.pop_front() else {
            return Ok(0);
        };
        let limit = self.read_limit.unwrap_or(usize::MAX);
        let len = chunk.len().min(buf.len()).min(limit);
        buf[..len].copy_from_slice(&chunk[..len]);
        if len < chunk.len() {
            chunk.drain(..len);
            self.inbound.push_front(chunk);
        }
        if len > 0 {
            self.reads += 1;
        }
        Ok(len)
    }
}

impl Write for ScriptedTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fail_writes {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

/// Fixture providing an empty [`ScriptedTransport`].
#[fixture]
#[allow(
    unused_braces,
    reason = "rustc false positive for single line rstest fixtures"
)]
pub fn scripted() -> ScriptedTransport { ScriptedTransport::new() }
