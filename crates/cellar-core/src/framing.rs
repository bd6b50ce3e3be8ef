//! Newline framing over byte streams.
//!
//! The IRC connection and the wizard protocol are both line oriented. Reads
//! arrive in arbitrary chunks, so a line can straddle two reads: `LineBuffer`
//! keeps the unterminated tail until the rest of it shows up.

use anyhow::{Context, Result};
use std::collections::VecDeque;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

/// Longest line kept; anything past it up to the next `\n` is dropped.
pub const DEFAULT_MAX_LINE: usize = 8 * 1024;

const READ_CHUNK: usize = 4096;

/// Line terminator appended by writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    CrLf,
    Lf,
}

impl Terminator {
    fn as_bytes(self) -> &'static [u8] {
        match self {
            Self::CrLf => b"\r\n",
            Self::Lf => b"\n",
        }
    }
}

/// Accumulates raw chunks and yields complete lines.
///
/// Lines are split on `\n`; a single trailing `\r` is stripped. Invalid UTF-8
/// is decoded lossily.
#[derive(Debug)]
pub struct LineBuffer {
    pending: Vec<u8>,
    ready: VecDeque<String>,
    max_line: usize,
    discarding: bool,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE)
    }
}

impl LineBuffer {
    pub fn new(max_line: usize) -> Self {
        Self {
            pending: Vec::new(),
            ready: VecDeque::new(),
            max_line: max_line.max(1),
            discarding: false,
        }
    }

    pub fn push(&mut self, mut chunk: &[u8]) {
        while !chunk.is_empty() {
            if let Some(idx) = chunk.iter().position(|&b| b == b'\n') {
                self.extend(&chunk[..idx]);
                self.finish_line();
                chunk = &chunk[idx + 1..];
            } else {
                self.extend(chunk);
                break;
            }
        }
    }

    pub fn next_line(&mut self) -> Option<String> {
        self.ready.pop_front()
    }

    /// Whether bytes of an unterminated line are being held.
    pub fn has_partial(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Flush the unterminated tail as a line. Used at end of stream.
    pub fn take_partial(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        self.finish_line();
        self.ready.pop_back()
    }

    fn extend(&mut self, bytes: &[u8]) {
        if self.discarding {
            return;
        }
        let room = self.max_line.saturating_sub(self.pending.len());
        if bytes.len() > room {
            self.pending.extend_from_slice(&bytes[..room]);
            self.discarding = true;
        } else {
            self.pending.extend_from_slice(bytes);
        }
    }

    fn finish_line(&mut self) {
        self.discarding = false;
        let mut line = std::mem::take(&mut self.pending);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        self.ready
            .push_back(String::from_utf8_lossy(&line).into_owned());
    }
}

/// Read half of a line-framed stream.
///
/// `read_line` is cancel safe: a timed-out read loses no buffered bytes.
#[derive(Debug)]
pub struct LineReader<R> {
    inner: R,
    buffer: LineBuffer,
    chunk: Vec<u8>,
    eof: bool,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_buffer(inner, LineBuffer::default())
    }

    fn with_buffer(inner: R, buffer: LineBuffer) -> Self {
        Self {
            inner,
            buffer,
            chunk: vec![0; READ_CHUNK],
            eof: false,
        }
    }

    /// Next complete line, or `None` once the peer has closed and nothing
    /// is left. A final unterminated fragment is returned as a line.
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(line) = self.buffer.next_line() {
                return Ok(Some(line));
            }
            if self.eof {
                return Ok(self.buffer.take_partial());
            }
            let n = self
                .inner
                .read(&mut self.chunk)
                .await
                .context("failed to read from socket")?;
            if n == 0 {
                self.eof = true;
            } else {
                self.buffer.push(&self.chunk[..n]);
            }
        }
    }
}

/// Write half of a line-framed stream.
#[derive(Debug)]
pub struct LineWriter<W> {
    inner: W,
    terminator: Terminator,
}

impl<W: AsyncWrite + Unpin> LineWriter<W> {
    pub fn new(inner: W, terminator: Terminator) -> Self {
        Self { inner, terminator }
    }

    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        self.inner
            .write_all(line.as_bytes())
            .await
            .context("failed to write line")?;
        self.inner
            .write_all(self.terminator.as_bytes())
            .await
            .context("failed to write line terminator")?;
        self.inner.flush().await.context("failed to flush line")?;
        Ok(())
    }

    /// Write bytes without a terminator.
    pub async fn write_raw(&mut self, data: &str) -> Result<()> {
        self.inner
            .write_all(data.as_bytes())
            .await
            .context("failed to write data")?;
        self.inner.flush().await.context("failed to flush data")?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner
            .shutdown()
            .await
            .context("failed to shut down socket")
    }
}

/// A blocking-read stream wrapped with newline framing.
#[derive(Debug)]
pub struct LineFramed<S> {
    reader: LineReader<S>,
    terminator: Terminator,
}

impl<S> LineFramed<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, terminator: Terminator) -> Self {
        Self::with_max_line(stream, terminator, DEFAULT_MAX_LINE)
    }

    pub fn with_max_line(stream: S, terminator: Terminator, max_line: usize) -> Self {
        Self {
            reader: LineReader::with_buffer(stream, LineBuffer::new(max_line)),
            terminator,
        }
    }

    pub async fn read_line(&mut self) -> Result<Option<String>> {
        self.reader.read_line().await
    }

    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        let mut writer = LineWriter::new(&mut self.reader.inner, self.terminator);
        writer.write_line(line).await
    }

    pub async fn write_raw(&mut self, data: &str) -> Result<()> {
        let mut writer = LineWriter::new(&mut self.reader.inner, self.terminator);
        writer.write_raw(data).await
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        let mut writer = LineWriter::new(&mut self.reader.inner, self.terminator);
        writer.shutdown().await
    }

    /// Split into independently owned halves. Buffered input carries over
    /// to the reader.
    pub fn split(self) -> (LineReader<ReadHalf<S>>, LineWriter<WriteHalf<S>>) {
        let LineReader {
            inner,
            buffer,
            chunk,
            eof,
        } = self.reader;
        let (read_half, write_half) = tokio::io::split(inner);
        (
            LineReader {
                inner: read_half,
                buffer,
                chunk,
                eof,
            },
            LineWriter::new(write_half, self.terminator),
        )
    }
}
