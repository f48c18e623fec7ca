//! Blocking stream adapters: [`FrameWriter`] compresses into any `Write`,
//! [`FrameReader`] decompresses from any `Read`.
//!
//! The buffer bookkeeping lives in `WriteState` / `ReadState` so the async
//! adapters in `async_stream` run exactly the same control flow; only the
//! calls into the underlying sink or source differ.

use std::io::{self, Read, Write};
use std::mem;

use tracing::trace;

use crate::config::STREAM_BUFFER_SIZE;
use crate::decoder::{Decoder, OperationStatus};
use crate::encoder::Encoder;
use crate::error::Error;
use crate::frame::types::{FrameError, FrameOptions};
use crate::pool::BufferPool;

// ─────────────────────────────────────────────────────────────────────────────
// Shared write-side state
// ─────────────────────────────────────────────────────────────────────────────

/// Encoder plus one pooled output buffer, grown on demand.
pub(crate) struct WriteState {
    encoder: Encoder,
    buffer: Vec<u8>,
}

impl WriteState {
    pub(crate) fn new(encoder: Encoder) -> Self {
        Self {
            encoder,
            buffer: Vec::new(),
        }
    }

    fn reserve(&mut self, len: usize) {
        if self.buffer.len() < len {
            let old = mem::replace(&mut self.buffer, BufferPool::shared().rent(len));
            BufferPool::shared().release(old);
        }
    }

    /// The output buffer; each call below returns a prefix of it.
    pub(crate) fn output(&self) -> &[u8] {
        &self.buffer
    }

    /// Compress `src`; the returned slice is what must reach the sink.
    pub(crate) fn compress(&mut self, src: &[u8]) -> io::Result<&[u8]> {
        let needed = self.encoder.max_compressed_length(
            src.len(),
            !self.encoder.is_header_written(),
            false,
        );
        self.reserve(needed);
        let n = self.encoder.compress(src, &mut self.buffer)?;
        Ok(&self.buffer[..n])
    }

    pub(crate) fn flush(&mut self) -> io::Result<&[u8]> {
        self.reserve(self.encoder.max_flush_length());
        let n = self.encoder.flush(&mut self.buffer)?;
        Ok(&self.buffer[..n])
    }

    /// Close the frame. Emits header and footer together if nothing was written.
    pub(crate) fn close(&mut self) -> io::Result<&[u8]> {
        let needed =
            self.encoder
                .max_compressed_length(0, !self.encoder.is_header_written(), true);
        self.reserve(needed);
        let n = self.encoder.close(&mut self.buffer)?;
        Ok(&self.buffer[..n])
    }
}

impl Drop for WriteState {
    fn drop(&mut self) {
        BufferPool::shared().release(mem::take(&mut self.buffer));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared read-side state
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) enum ReadStep {
    /// Hand this many bytes to the caller.
    Return(usize),
    /// The decoder needs more input; fill `refill_slot` and `commit`.
    Refill,
}

/// Decoder plus the unconsumed input window `buffer[offset..offset + count]`.
pub(crate) struct ReadState {
    decoder: Decoder,
    buffer: Vec<u8>,
    offset: usize,
    count: usize,
}

impl ReadState {
    pub(crate) fn new(decoder: Decoder) -> Self {
        Self {
            decoder,
            buffer: BufferPool::shared().rent(STREAM_BUFFER_SIZE),
            offset: 0,
            count: 0,
        }
    }

    pub(crate) fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    /// Decode from the window into `dst[*produced..]` until there is something
    /// to return or the window runs dry.
    pub(crate) fn advance(&mut self, dst: &mut [u8], produced: &mut usize) -> io::Result<ReadStep> {
        loop {
            if self.decoder.last_status() == Some(OperationStatus::Done) {
                self.decoder.reset()?;
            }
            let window = &self.buffer[self.offset..self.offset + self.count];
            let step = self.decoder.decompress(window, &mut dst[*produced..])?;
            self.offset += step.consumed;
            self.count -= step.consumed;
            *produced += step.written;

            match step.status {
                OperationStatus::InvalidData => {
                    let code = self.decoder.last_error().unwrap_or(FrameError::Generic);
                    return Err(Error::MalformedStream(code).into());
                }
                OperationStatus::DestinationTooSmall => return Ok(ReadStep::Return(*produced)),
                OperationStatus::Done => {
                    if *produced == dst.len() {
                        return Ok(ReadStep::Return(*produced));
                    }
                }
                OperationStatus::NeedMoreData => {
                    // Hand back what is decoded before blocking on the source.
                    if *produced > 0 {
                        return Ok(ReadStep::Return(*produced));
                    }
                    return Ok(ReadStep::Refill);
                }
            }
        }
    }

    /// Free space after the window, compacting it to the front only when the
    /// tail is full.
    pub(crate) fn refill_slot(&mut self) -> &mut [u8] {
        if self.count == 0 {
            self.offset = 0;
        } else if self.offset + self.count == self.buffer.len() {
            self.buffer.copy_within(self.offset..self.offset + self.count, 0);
            self.offset = 0;
        }
        if self.count == self.buffer.len() {
            let grown = self.buffer.len().max(STREAM_BUFFER_SIZE) * 2;
            self.buffer.resize(grown, 0);
        }
        let start = self.offset + self.count;
        &mut self.buffer[start..]
    }

    pub(crate) fn commit(&mut self, n: usize) {
        self.count += n;
        trace!(bytes = n, buffered = self.count, "stream reader refilled");
    }

    /// The source reported end of stream.
    pub(crate) fn at_eof(&self, produced: usize) -> io::Result<usize> {
        if produced > 0 {
            return Ok(produced);
        }
        if self.decoder.is_mid_frame() || self.count > 0 {
            return Err(Error::TruncatedStream.into());
        }
        Ok(0)
    }
}

impl Drop for ReadState {
    fn drop(&mut self) {
        BufferPool::shared().release(mem::take(&mut self.buffer));
    }
}

fn finished_error() -> io::Error {
    io::Error::other("frame writer already finished")
}

/// One `read` call, retried on `Interrupted`.
fn read_some<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FrameWriter
// ─────────────────────────────────────────────────────────────────────────────

/// Compresses everything written to it into one frame on `W`.
///
/// Call [`finish`](FrameWriter::finish) to close the frame and get the sink
/// back. Dropping an unfinished writer closes the frame on a best-effort basis
/// and ignores errors.
pub struct FrameWriter<W: Write> {
    inner: Option<W>,
    state: WriteState,
    finished: bool,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(inner: W, options: FrameOptions) -> Self {
        Self::with_encoder(inner, Encoder::new(options))
    }

    /// Use a preconfigured encoder (dictionary, codec, header suppression).
    pub fn with_encoder(inner: W, encoder: Encoder) -> Self {
        Self {
            inner: Some(inner),
            state: WriteState::new(encoder),
            finished: false,
        }
    }

    /// The sink, unless the writer has been finished.
    pub fn get_ref(&self) -> Option<&W> {
        self.inner.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut W> {
        self.inner.as_mut()
    }

    /// Close the current frame without giving up the sink. Idempotent until
    /// more data is written.
    pub fn try_finish(&mut self) -> io::Result<()> {
        if self.finished {
            return Ok(());
        }
        let inner = self.inner.as_mut().ok_or_else(finished_error)?;
        let out = self.state.close()?;
        inner.write_all(out)?;
        inner.flush()?;
        self.finished = true;
        Ok(())
    }

    /// Close the frame and return the sink.
    pub fn finish(mut self) -> io::Result<W> {
        self.try_finish()?;
        self.inner.take().ok_or_else(finished_error)
    }
}

impl<W: Write> Write for FrameWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let inner = self.inner.as_mut().ok_or_else(finished_error)?;
        let out = self.state.compress(buf)?;
        if !out.is_empty() {
            inner.write_all(out)?;
        }
        self.finished = false;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let inner = self.inner.as_mut().ok_or_else(finished_error)?;
        let out = self.state.flush()?;
        if !out.is_empty() {
            inner.write_all(out)?;
        }
        inner.flush()
    }
}

impl<W: Write> Drop for FrameWriter<W> {
    fn drop(&mut self) {
        if self.inner.is_some() && !self.finished {
            let _ = self.try_finish();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FrameReader
// ─────────────────────────────────────────────────────────────────────────────

/// Decompresses a stream of concatenated frames from `R`.
///
/// Skippable frames are ignored. Input that ends inside a frame yields the
/// bytes decoded so far and then an `UnexpectedEof` error.
pub struct FrameReader<R: Read> {
    inner: R,
    state: ReadState,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_decoder(inner, Decoder::new())
    }

    /// Use a preconfigured decoder (dictionary, codec).
    pub fn with_decoder(inner: R, decoder: Decoder) -> Self {
        Self {
            inner,
            state: ReadState::new(decoder),
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn decoder(&self) -> &Decoder {
        self.state.decoder()
    }
}

impl<R: Read> Read for FrameReader<R> {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        if dst.is_empty() {
            return Ok(0);
        }
        let mut produced = 0;
        loop {
            match self.state.advance(dst, &mut produced)? {
                ReadStep::Return(n) => return Ok(n),
                ReadStep::Refill => {
                    let slot = self.state.refill_slot();
                    let n = read_some(&mut self.inner, slot)?;
                    if n == 0 {
                        return self.state.at_eof(produced);
                    }
                    self.state.commit(n);
                }
            }
        }
    }
}
