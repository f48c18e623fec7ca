//! Frame decoder: status reporting around a `DecompressionContext`.

use std::sync::Arc;

use crate::codec::{BlockCodec, Lz4Block};
use crate::dictionary::CompressionDictionary;
use crate::error::{Error, Result};
use crate::frame::decompress::DecompressionContext;
use crate::frame::header::{header_size, parse_frame_header};
use crate::frame::types::{FrameError, FrameInfo};

/// What the caller has to do after a `decompress` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    /// The current frame ended. Call `reset` before decoding a following frame.
    Done,
    /// The destination filled up and more output is pending.
    DestinationTooSmall,
    /// All input was consumed before the frame ended.
    NeedMoreData,
    /// The input is corrupt. The decoder is unusable from now on.
    InvalidData,
}

/// Outcome of one `decompress` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    pub status: OperationStatus,
    pub consumed: usize,
    pub written: usize,
}

pub struct Decoder {
    context: Option<Box<DecompressionContext>>,
    last_status: Option<OperationStatus>,
    last_error: Option<FrameError>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::with_codec(Arc::new(Lz4Block), None)
    }

    pub fn with_dictionary(dictionary: CompressionDictionary) -> Self {
        Self::with_codec(Arc::new(Lz4Block), Some(dictionary))
    }

    pub fn with_codec(codec: Arc<dyn BlockCodec>, dictionary: Option<CompressionDictionary>) -> Self {
        Self {
            context: Some(Box::new(DecompressionContext::new(codec, dictionary))),
            last_status: None,
            last_error: None,
        }
    }

    /// Decode from `src` into `dst`.
    ///
    /// Corrupt input is reported through [`OperationStatus::InvalidData`], not
    /// as an `Err`; [`last_error`](Decoder::last_error) then names the cause.
    pub fn decompress(&mut self, src: &[u8], dst: &mut [u8]) -> Result<Decoded> {
        if self.context.is_none() {
            return Err(Error::Disposed);
        }
        if self.last_error.is_some() {
            return Ok(self.record(OperationStatus::InvalidData, 0, 0));
        }

        let res = match self.context.as_deref_mut() {
            Some(ctx) => ctx.frame_decompress(dst, src),
            None => return Err(Error::Disposed),
        };
        match res {
            Ok(progress) => {
                let status = if progress.hint == 0 {
                    OperationStatus::Done
                } else if progress.output_pending {
                    OperationStatus::DestinationTooSmall
                } else {
                    OperationStatus::NeedMoreData
                };
                // A full-destination report without any progress would loop forever.
                if status == OperationStatus::DestinationTooSmall
                    && progress.consumed == 0
                    && progress.written == 0
                    && !dst.is_empty()
                {
                    self.last_error = Some(FrameError::Generic);
                    return Ok(self.record(OperationStatus::InvalidData, 0, 0));
                }
                Ok(self.record(status, progress.consumed, progress.written))
            }
            Err(code) => {
                self.last_error = Some(code);
                Ok(self.record(OperationStatus::InvalidData, 0, 0))
            }
        }
    }

    /// Prepare for the next concatenated frame. A decoder that reported
    /// `InvalidData` stays invalid.
    pub fn reset(&mut self) -> Result<()> {
        let ctx = self.context.as_deref_mut().ok_or(Error::Disposed)?;
        ctx.reset();
        self.last_status = None;
        Ok(())
    }

    pub fn last_status(&self) -> Option<OperationStatus> {
        self.last_status
    }

    /// The failure behind the last `InvalidData` status.
    pub fn last_error(&self) -> Option<FrameError> {
        self.last_error
    }

    /// True when part of a frame has been consumed but the frame has not ended.
    pub fn is_mid_frame(&self) -> bool {
        self.context.as_deref().is_some_and(|ctx| !ctx.is_idle())
    }

    /// Parameters of the frame being decoded, once its header has been read.
    pub fn current_frame_info(&self) -> Option<FrameInfo> {
        self.context.as_deref().and_then(DecompressionContext::frame_info)
    }

    pub fn is_disposed(&self) -> bool {
        self.context.is_none()
    }

    /// Release the decompression context. Idempotent.
    pub fn dispose(&mut self) {
        self.context = None;
    }

    /// Header length of the frame starting at `src`; needs at least 5 bytes.
    pub fn header_size(src: &[u8]) -> Result<usize> {
        header_size(src).map_err(inspect_error)
    }

    /// Decode the header at the start of `src` without consuming anything.
    pub fn frame_info(src: &[u8]) -> Result<FrameInfo> {
        parse_frame_header(src).map_err(inspect_error)
    }

    fn record(&mut self, status: OperationStatus, consumed: usize, written: usize) -> Decoded {
        self.last_status = Some(status);
        Decoded {
            status,
            consumed,
            written,
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

fn inspect_error(code: FrameError) -> Error {
    match code {
        FrameError::FrameHeaderIncomplete => Error::TruncatedStream,
        other => Error::MalformedStream(other),
    }
}
