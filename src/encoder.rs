//! Frame encoder: lifecycle and failure handling around a `CompressionContext`.
//!
//! The encoder turns any sequence of `compress` calls followed by `close` into
//! exactly one frame. The header goes out with the first `compress` (or with
//! `close` when nothing was compressed). After `close` the same instance can
//! start a new frame on the same context.
//!
//! Any failure reported by the frame primitive disposes the encoder: every
//! later call returns [`Error::Disposed`].

use std::sync::Arc;

use crate::codec::{BlockCodec, Lz4Block};
use crate::dictionary::CompressionDictionary;
use crate::error::{Error, Result};
use crate::frame::compress::CompressionContext;
use crate::frame::header::{blocks_bound, frame_footer_length, frame_header_length};
use crate::frame::types::{FrameError, FrameOptions, MAX_FH_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EncoderState {
    NotStarted,
    HeaderWritten,
    /// A frame was just closed; the next `compress` starts another one.
    Closed,
}

pub struct Encoder {
    /// `None` once disposed.
    context: Option<Box<CompressionContext>>,
    options: FrameOptions,
    dictionary: Option<CompressionDictionary>,
    state: EncoderState,
    write_header: bool,
}

impl Encoder {
    pub fn new(options: FrameOptions) -> Self {
        Self::with_codec(options, Arc::new(Lz4Block))
    }

    pub fn with_codec(options: FrameOptions, codec: Arc<dyn BlockCodec>) -> Self {
        Self {
            context: Some(Box::new(CompressionContext::new(codec))),
            options,
            dictionary: None,
            state: EncoderState::NotStarted,
            write_header: true,
        }
    }

    /// Compress against `dictionary`. Its id is advertised in the header
    /// unless the options already carry one.
    pub fn with_dictionary(mut self, dictionary: CompressionDictionary) -> Self {
        if self.options.frame_info.dict_id == 0 {
            self.options.frame_info.dict_id = dictionary.id();
        }
        self.dictionary = Some(dictionary);
        self
    }

    /// Suppress header emission, for encoders that write the blocks of a frame
    /// whose header some other encoder produced.
    pub fn without_header(mut self) -> Self {
        self.write_header = false;
        self
    }

    pub fn set_write_header(&mut self, write_header: bool) {
        self.write_header = write_header;
    }

    pub fn is_write_header(&self) -> bool {
        self.write_header
    }

    pub fn options(&self) -> &FrameOptions {
        &self.options
    }

    /// True while a frame is open (header emitted, not yet closed).
    pub fn is_header_written(&self) -> bool {
        self.state == EncoderState::HeaderWritten
    }

    pub fn is_disposed(&self) -> bool {
        self.context.is_none()
    }

    /// Release the compression context. Idempotent.
    pub fn dispose(&mut self) {
        self.context = None;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Size queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Destination size that is always enough for one `compress` of
    /// `input_len` bytes, whatever is currently buffered.
    ///
    /// A pure function of the options; the encoder's state does not matter.
    pub fn max_compressed_length(
        &self,
        input_len: usize,
        include_header: bool,
        include_footer: bool,
    ) -> usize {
        let mut total = blocks_bound(input_len, &self.options, usize::MAX);
        if include_header {
            total += self.actual_frame_header_length();
        }
        if include_footer {
            total += self.actual_frame_footer_length();
        }
        total
    }

    /// Destination size that is always enough for `flush`.
    pub fn max_flush_length(&self) -> usize {
        self.max_compressed_length(0, false, false)
    }

    /// Header bytes this encoder's frames carry.
    pub fn actual_frame_header_length(&self) -> usize {
        frame_header_length(&self.options.frame_info)
    }

    /// Footer bytes this encoder's frames carry.
    pub fn actual_frame_footer_length(&self) -> usize {
        frame_footer_length(&self.options.frame_info)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Frame operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Consume all of `src`, writing the header (first call of a frame) and any
    /// completed blocks to `dst`. Size `dst` with [`max_compressed_length`].
    ///
    /// [`max_compressed_length`]: Encoder::max_compressed_length
    pub fn compress(&mut self, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        if self.context.is_none() {
            return Err(Error::Disposed);
        }
        let mut written = 0;
        if self.state != EncoderState::HeaderWritten {
            written = self.begin_frame(dst)?;
        }
        let res = match self.context.as_deref_mut() {
            Some(ctx) => ctx.frame_update(&mut dst[written..], src),
            None => return Err(Error::Disposed),
        };
        Ok(written + self.check(res)?)
    }

    /// Emit any buffered partial block. Returns 0 when nothing was buffered or
    /// no frame is open.
    pub fn flush(&mut self, dst: &mut [u8]) -> Result<usize> {
        let Some(ctx) = self.context.as_deref_mut() else {
            return Err(Error::Disposed);
        };
        if self.state != EncoderState::HeaderWritten {
            return Ok(0);
        }
        let res = ctx.frame_flush(dst);
        self.check(res)
    }

    /// Finish the frame: pending data, end mark and optional content checksum.
    ///
    /// Closing twice without an intervening `compress` is a usage error.
    pub fn close(&mut self, dst: &mut [u8]) -> Result<usize> {
        if self.context.is_none() {
            return Err(Error::Disposed);
        }
        let mut written = 0;
        match self.state {
            EncoderState::Closed => {
                return Err(Error::usage(
                    "frame already closed; compress new data before closing again",
                ))
            }
            EncoderState::NotStarted => written = self.compress(&[], dst)?,
            EncoderState::HeaderWritten => {}
        }
        let res = match self.context.as_deref_mut() {
            Some(ctx) => ctx.frame_end(&mut dst[written..]),
            None => return Err(Error::Disposed),
        };
        let end = self.check(res)?;
        self.state = EncoderState::Closed;
        Ok(written + end)
    }

    fn begin_frame(&mut self, dst: &mut [u8]) -> Result<usize> {
        let Some(ctx) = self.context.as_deref_mut() else {
            return Err(Error::Disposed);
        };
        let res = if self.write_header {
            ctx.frame_begin(dst, &self.options, self.dictionary.as_ref())
        } else {
            let mut discarded = [0u8; MAX_FH_SIZE];
            ctx.frame_begin(&mut discarded, &self.options, self.dictionary.as_ref())
                .map(|_| 0)
        };
        let written = self.check(res)?;
        self.state = EncoderState::HeaderWritten;
        Ok(written)
    }

    /// Frame primitive failures are fatal to the encoder.
    fn check(&mut self, res: std::result::Result<usize, FrameError>) -> Result<usize> {
        res.map_err(|code| {
            self.dispose();
            match code {
                FrameError::DstMaxSizeTooSmall => Error::usage(format!(
                    "destination buffer too small ({}); size it with max_compressed_length",
                    code.error_name()
                )),
                other => Error::Codec(other),
            }
        })
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new(FrameOptions::default())
    }
}
