//! Tokio counterparts of [`FrameWriter`](crate::FrameWriter) and
//! [`FrameReader`](crate::FrameReader), implementing `AsyncWrite` and
//! `AsyncRead` so they compose with `tokio::io::copy`, `BufReader` and the
//! `*Ext` traits.
//!
//! Compression and decompression run inline inside the poll functions; the
//! only suspension points are the polls on the wrapped source or sink.

use std::future::poll_fn;
use std::io;
use std::ops::Range;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::frame::types::FrameOptions;
use crate::stream::{ReadState, ReadStep, WriteState};

/// Compresses into one frame on an async sink.
///
/// Compressed output of one `poll_write` is staged and pushed to the sink by
/// the next write, flush or shutdown. Unlike the blocking writer, dropping this
/// one does not close the frame; call [`finish`](AsyncFrameWriter::finish) or
/// shut it down.
pub struct AsyncFrameWriter<W: AsyncWrite + Unpin> {
    inner: W,
    state: WriteState,
    /// Part of the state's output buffer not yet accepted by the sink.
    pending: Range<usize>,
    finished: bool,
}

impl<W: AsyncWrite + Unpin> AsyncFrameWriter<W> {
    pub fn new(inner: W, options: FrameOptions) -> Self {
        Self::with_encoder(inner, Encoder::new(options))
    }

    pub fn with_encoder(inner: W, encoder: Encoder) -> Self {
        Self {
            inner,
            state: WriteState::new(encoder),
            pending: 0..0,
            finished: false,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Close the frame and flush the sink, leaving it open. Idempotent until
    /// more data is written.
    pub async fn finish(&mut self) -> io::Result<()> {
        poll_fn(|cx| self.poll_finish(cx)).await
    }

    /// The sink. Call [`finish`](AsyncFrameWriter::finish) first or the frame
    /// stays open.
    pub fn into_inner(self) -> W {
        self.inner
    }

    fn poll_drain(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        while !self.pending.is_empty() {
            let out = &self.state.output()[self.pending.clone()];
            let n = ready!(Pin::new(&mut self.inner).poll_write(cx, out))?;
            if n == 0 {
                return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
            }
            self.pending.start += n;
        }
        Poll::Ready(Ok(()))
    }

    fn poll_finish(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        ready!(self.poll_drain(cx))?;
        if !self.finished {
            self.pending = 0..self.state.close()?.len();
            self.finished = true;
        }
        ready!(self.poll_drain(cx))?;
        Pin::new(&mut self.inner).poll_flush(cx)
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for AsyncFrameWriter<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }
        this.pending = 0..this.state.compress(buf)?.len();
        this.finished = false;
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        // Once drained, a repeated call finds nothing buffered and emits nothing.
        this.pending = 0..this.state.flush()?.len();
        ready!(this.poll_drain(cx))?;
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_finish(cx))?;
        Pin::new(&mut this.inner).poll_shutdown(cx)
    }
}

/// Decompresses concatenated frames from an async source.
pub struct AsyncFrameReader<R: AsyncRead + Unpin> {
    inner: R,
    state: ReadState,
}

impl<R: AsyncRead + Unpin> AsyncFrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_decoder(inner, Decoder::new())
    }

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

    pub fn into_inner(self) -> R {
        self.inner
    }

    pub fn decoder(&self) -> &Decoder {
        self.state.decoder()
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for AsyncFrameReader<R> {
    /// Fills `buf` with decompressed bytes. Filling nothing means the source
    /// ended on a frame boundary.
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }
        let dst = buf.initialize_unfilled();
        let mut produced = 0;
        loop {
            match this.state.advance(dst, &mut produced)? {
                ReadStep::Return(n) => {
                    buf.advance(n);
                    return Poll::Ready(Ok(()));
                }
                ReadStep::Refill => {
                    // Nothing has been produced yet when a refill is asked
                    // for, so suspending here loses no output.
                    let mut slot = ReadBuf::new(this.state.refill_slot());
                    let polled = Pin::new(&mut this.inner)
                        .poll_read(cx, &mut slot)
                        .map_ok(|()| slot.filled().len());
                    match ready!(polled) {
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => return Poll::Ready(Err(e)),
                        Ok(0) => {
                            let n = this.state.at_eof(produced)?;
                            buf.advance(n);
                            return Poll::Ready(Ok(()));
                        }
                        Ok(n) => this.state.commit(n),
                    }
                }
            }
        }
    }
}
