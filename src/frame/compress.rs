//! Streaming frame compression context.
//!
//! `CompressionContext` is the frame-level primitive behind the
//! [`Encoder`](crate::Encoder): `frame_begin` writes a header, `frame_update`
//! fully consumes its input (emitting whole blocks and staging the remainder),
//! `frame_flush` emits the staged partial block, and `frame_end` writes the end
//! mark and optional content checksum. None of them allocate caller output;
//! an undersized destination is reported as `DstMaxSizeTooSmall`.

use std::mem;
use std::sync::Arc;

use xxhash_rust::xxh32::{xxh32, Xxh32};

use crate::codec::BlockCodec;
use crate::dictionary::CompressionDictionary;
use crate::frame::header::{
    blocks_bound, frame_footer_length, frame_header_length, write_frame_header, write_le32,
};
use crate::frame::slide_window;
use crate::frame::types::{
    FrameError, FrameOptions, FrameType, BF_SIZE, BH_SIZE, BLOCK_UNCOMPRESSED_FLAG,
};

pub struct CompressionContext {
    codec: Arc<dyn BlockCodec>,
    options: FrameOptions,
    dictionary: Option<CompressionDictionary>,
    /// A header has been written and `frame_end` has not run yet.
    started: bool,
    max_block_size: usize,
    /// Input not yet emitted; always shorter than one block.
    staging: Vec<u8>,
    /// Linked mode: the last 64 KiB of input already emitted.
    history: Vec<u8>,
    /// Codec output before the raw/compressed decision.
    scratch: Vec<u8>,
    total_in_size: u64,
    xxh: Xxh32,
}

impl CompressionContext {
    pub fn new(codec: Arc<dyn BlockCodec>) -> Self {
        Self {
            codec,
            options: FrameOptions::default(),
            dictionary: None,
            started: false,
            max_block_size: 0,
            staging: Vec::new(),
            history: Vec::new(),
            scratch: Vec::new(),
            total_in_size: 0,
            xxh: Xxh32::new(0),
        }
    }

    /// Options of the current (or last) frame, with the block size resolved.
    pub fn options(&self) -> &FrameOptions {
        &self.options
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Bytes staged and not yet emitted as a block.
    pub fn buffered_len(&self) -> usize {
        self.staging.len()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Frame lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Start a new frame, discarding any state from a previous one.
    ///
    /// Returns the header length written to `dst`.
    pub fn frame_begin(
        &mut self,
        dst: &mut [u8],
        options: &FrameOptions,
        dictionary: Option<&CompressionDictionary>,
    ) -> Result<usize, FrameError> {
        let mut options = *options;
        options.frame_info.block_size_id = options.frame_info.block_size_id.resolve();
        options.frame_info.frame_type = FrameType::Frame;

        if dst.len() < frame_header_length(&options.frame_info) {
            return Err(FrameError::DstMaxSizeTooSmall);
        }

        self.options = options;
        self.dictionary = dictionary.cloned();
        self.max_block_size = options.block_size();
        self.staging.clear();
        self.staging.reserve(self.max_block_size);
        self.history.clear();
        if options.is_linked() {
            if let Some(dict) = &self.dictionary {
                self.history.extend_from_slice(dict.window());
            }
        }
        let scratch_len = self.codec.max_block_compressed_length(self.max_block_size);
        if self.scratch.len() < scratch_len {
            self.scratch.resize(scratch_len, 0);
        }
        self.total_in_size = 0;
        self.xxh.reset(0);

        let written = write_frame_header(dst, &self.options.frame_info)?;
        self.started = true;
        Ok(written)
    }

    /// Consume all of `src`. Returns the number of block bytes written.
    ///
    /// `dst` must hold `blocks_bound(src.len(), options, buffered_len())` bytes.
    pub fn frame_update(&mut self, dst: &mut [u8], src: &[u8]) -> Result<usize, FrameError> {
        if !self.started {
            return Err(FrameError::CompressionStateUninitialized);
        }
        if dst.len() < blocks_bound(src.len(), &self.options, self.staging.len()) {
            return Err(FrameError::DstMaxSizeTooSmall);
        }

        let block_size = self.max_block_size;
        let mut dst_pos = 0;
        let mut src_pos = 0;

        // Top up a partially staged block first.
        if !self.staging.is_empty() {
            let missing = block_size - self.staging.len();
            if src.len() < missing {
                self.staging.extend_from_slice(src);
                src_pos = src.len();
            } else {
                self.staging.extend_from_slice(&src[..missing]);
                src_pos = missing;
                dst_pos += self.emit_staging(&mut dst[dst_pos..])?;
            }
        }

        while src.len() - src_pos >= block_size {
            dst_pos += self.emit_block(&mut dst[dst_pos..], &src[src_pos..src_pos + block_size])?;
            src_pos += block_size;
        }

        if self.options.auto_flush && src_pos < src.len() {
            dst_pos += self.emit_block(&mut dst[dst_pos..], &src[src_pos..])?;
            src_pos = src.len();
        }

        if src_pos < src.len() {
            self.staging.extend_from_slice(&src[src_pos..]);
        }

        if self.options.has_content_checksum() {
            self.xxh.update(src);
        }
        self.total_in_size += src.len() as u64;
        Ok(dst_pos)
    }

    /// Emit the staged partial block, if any. Returns 0 when nothing was staged.
    pub fn frame_flush(&mut self, dst: &mut [u8]) -> Result<usize, FrameError> {
        if self.staging.is_empty() {
            return Ok(0);
        }
        if !self.started {
            return Err(FrameError::CompressionStateUninitialized);
        }
        if dst.len() < self.staging.len() + BH_SIZE + self.block_crc_size() {
            return Err(FrameError::DstMaxSizeTooSmall);
        }
        self.emit_staging(dst)
    }

    /// Flush, then write the end mark and optional content checksum.
    ///
    /// The context is reusable for a new `frame_begin` afterwards, even when
    /// the declared content size turns out to be wrong.
    pub fn frame_end(&mut self, dst: &mut [u8]) -> Result<usize, FrameError> {
        if !self.started {
            return Err(FrameError::CompressionStateUninitialized);
        }
        let mut pos = self.frame_flush(dst)?;

        if dst.len() - pos < frame_footer_length(&self.options.frame_info) {
            return Err(FrameError::DstMaxSizeTooSmall);
        }
        write_le32(dst, pos, 0);
        pos += BH_SIZE;

        if self.options.has_content_checksum() {
            write_le32(dst, pos, self.xxh.digest());
            pos += BF_SIZE;
        }

        self.started = false;

        let declared = self.options.frame_info.content_size;
        if declared != 0 && declared != self.total_in_size {
            return Err(FrameError::FrameSizeWrong);
        }
        Ok(pos)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Block emission
    // ─────────────────────────────────────────────────────────────────────────

    fn block_crc_size(&self) -> usize {
        if self.options.has_block_checksum() {
            BF_SIZE
        } else {
            0
        }
    }

    fn emit_staging(&mut self, dst: &mut [u8]) -> Result<usize, FrameError> {
        let mut staged = mem::take(&mut self.staging);
        let res = self.emit_block(dst, &staged);
        staged.clear();
        self.staging = staged;
        res
    }

    fn emit_block(&mut self, dst: &mut [u8], src: &[u8]) -> Result<usize, FrameError> {
        let linked = self.options.is_linked();
        let prefix: &[u8] = if linked {
            &self.history
        } else {
            self.dictionary.as_ref().map_or(&[][..], |d| d.window())
        };
        let written = write_block(
            self.codec.as_ref(),
            &mut self.scratch,
            prefix,
            self.options.compression_level,
            self.options.has_block_checksum(),
            dst,
            src,
        )?;
        if linked {
            slide_window(&mut self.history, src);
        }
        Ok(written)
    }
}

/// Write one block (header, payload, optional checksum) to the front of `dst`.
///
/// Falls back to a raw block when the codec output is not smaller than `src`.
fn write_block(
    codec: &dyn BlockCodec,
    scratch: &mut [u8],
    prefix: &[u8],
    level: i32,
    with_crc: bool,
    dst: &mut [u8],
    src: &[u8],
) -> Result<usize, FrameError> {
    let bound = codec.max_block_compressed_length(src.len()).min(scratch.len());
    let c_size = codec.compress_block(src, &mut scratch[..bound], prefix, level)?;

    let (header, payload) = if c_size == 0 || c_size >= src.len() {
        (src.len() as u32 | BLOCK_UNCOMPRESSED_FLAG, src)
    } else {
        (c_size as u32, &scratch[..c_size])
    };

    let crc_size = if with_crc { BF_SIZE } else { 0 };
    let total = BH_SIZE + payload.len() + crc_size;
    if dst.len() < total {
        return Err(FrameError::DstMaxSizeTooSmall);
    }

    write_le32(dst, 0, header);
    dst[BH_SIZE..BH_SIZE + payload.len()].copy_from_slice(payload);
    if with_crc {
        write_le32(dst, BH_SIZE + payload.len(), xxh32(payload, 0));
    }
    Ok(total)
}
