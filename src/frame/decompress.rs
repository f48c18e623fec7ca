//! Streaming frame decompression context.
//!
//! `DecompressionContext::frame_decompress` walks a [`DecompressStage`]
//! machine over arbitrarily split input and output slices. Anything that does
//! not fit the current call (header fragments, partial blocks, decoded bytes
//! the destination cannot take yet) is staged internally, so every call makes
//! progress with whatever the caller supplies.
//!
//! Each call returns a [`DecodeProgress`]. Its `hint` suggests the size of the
//! next input; 0 means a frame (standard or skippable) has just ended and the
//! context has reset itself for the next one. `output_pending` tells a full
//! destination apart from exhausted input.

use std::mem;
use std::sync::Arc;

use xxhash_rust::xxh32::{xxh32, Xxh32};

use crate::codec::BlockCodec;
use crate::dictionary::CompressionDictionary;
use crate::frame::header::{header_size, parse_frame_header, read_le32};
use crate::frame::slide_window;
use crate::frame::types::{
    DecompressStage, FrameError, FrameInfo, FrameType, BF_SIZE, BH_SIZE, BLOCK_UNCOMPRESSED_FLAG,
    BlockChecksum, BlockMode, ContentChecksum, MAX_FH_SIZE, MIN_FH_SIZE,
    MIN_SIZE_TO_KNOW_HEADER_LENGTH,
};

/// Outcome of one [`DecompressionContext::frame_decompress`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeProgress {
    pub consumed: usize,
    pub written: usize,
    pub hint: usize,
    /// Decoded bytes, or input that decodes without more input, are waiting
    /// for destination space.
    pub output_pending: bool,
}

pub struct DecompressionContext {
    codec: Arc<dyn BlockCodec>,
    dictionary: Option<CompressionDictionary>,
    frame_info: FrameInfo,
    stage: DecompressStage,
    /// Declared content size still expected; only meaningful when declared.
    frame_remaining_size: u64,
    max_block_size: usize,
    /// Staging for block headers and partially received blocks.
    tmp_in: Vec<u8>,
    tmp_in_size: usize,
    tmp_in_target: usize,
    /// A block decoded here when the caller's destination was too small for it.
    tmp_out: Vec<u8>,
    tmp_out_size: usize,
    tmp_out_start: usize,
    /// Linked mode: the last 64 KiB of decoded output.
    history: Vec<u8>,
    xxh: Xxh32,
    block_xxh: Xxh32,
    /// Staging for header bytes and block checksums.
    header: [u8; MAX_FH_SIZE],
}

impl DecompressionContext {
    pub fn new(codec: Arc<dyn BlockCodec>, dictionary: Option<CompressionDictionary>) -> Self {
        Self {
            codec,
            dictionary,
            frame_info: FrameInfo::default(),
            stage: DecompressStage::GetFrameHeader,
            frame_remaining_size: 0,
            max_block_size: 0,
            tmp_in: Vec::new(),
            tmp_in_size: 0,
            tmp_in_target: 0,
            tmp_out: Vec::new(),
            tmp_out_size: 0,
            tmp_out_start: 0,
            history: Vec::new(),
            xxh: Xxh32::new(0),
            block_xxh: Xxh32::new(0),
            header: [0u8; MAX_FH_SIZE],
        }
    }

    /// Forget the current frame. Buffers are kept for reuse.
    pub fn reset(&mut self) {
        self.stage = DecompressStage::GetFrameHeader;
        self.history.clear();
        self.frame_remaining_size = 0;
        self.frame_info = FrameInfo::default();
        self.tmp_in_size = 0;
        self.tmp_in_target = 0;
        self.tmp_out_size = 0;
        self.tmp_out_start = 0;
    }

    pub fn stage(&self) -> DecompressStage {
        self.stage
    }

    /// True between frames: nothing of a frame has been consumed yet.
    pub fn is_idle(&self) -> bool {
        self.stage == DecompressStage::GetFrameHeader
    }

    /// Parameters of the frame being decoded, once its header has been read.
    pub fn frame_info(&self) -> Option<FrameInfo> {
        (self.stage > DecompressStage::StoreFrameHeader).then_some(self.frame_info)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Main state machine
    // ─────────────────────────────────────────────────────────────────────────

    /// Decode as much of `src` into `dst` as possible.
    ///
    /// See the module docs for the meaning of the returned progress.
    pub fn frame_decompress(
        &mut self,
        dst: &mut [u8],
        src: &[u8],
    ) -> Result<DecodeProgress, FrameError> {
        let mut src_pos = 0usize;
        let mut dst_pos = 0usize;
        let mut next_hint = 1usize;
        let mut output_pending = false;

        loop {
            match self.stage {
                DecompressStage::GetFrameHeader => {
                    let src_avail = src.len() - src_pos;
                    if src_avail == 0 {
                        next_hint = MIN_FH_SIZE;
                        break;
                    }
                    if src_avail >= MIN_SIZE_TO_KNOW_HEADER_LENGTH {
                        let h_size = header_size(&src[src_pos..])?;
                        if src_avail >= h_size {
                            let info = parse_frame_header(&src[src_pos..src_pos + h_size])?;
                            src_pos += h_size;
                            self.apply_header(info);
                            continue;
                        }
                    }
                    self.tmp_in_size = 0;
                    self.tmp_in_target = MIN_SIZE_TO_KNOW_HEADER_LENGTH;
                    self.stage = DecompressStage::StoreFrameHeader;
                }

                DecompressStage::StoreFrameHeader => {
                    let copy = (self.tmp_in_target - self.tmp_in_size).min(src.len() - src_pos);
                    let ts = self.tmp_in_size;
                    self.header[ts..ts + copy].copy_from_slice(&src[src_pos..src_pos + copy]);
                    self.tmp_in_size += copy;
                    src_pos += copy;
                    if self.tmp_in_size < self.tmp_in_target {
                        next_hint = self.tmp_in_target - self.tmp_in_size + BH_SIZE;
                        break;
                    }
                    let h_size = header_size(&self.header[..self.tmp_in_size])?;
                    if h_size > self.tmp_in_size {
                        self.tmp_in_target = h_size;
                        continue;
                    }
                    let info = parse_frame_header(&self.header[..h_size])?;
                    self.apply_header(info);
                }

                DecompressStage::Init => {
                    if self.tmp_in.len() < self.max_block_size + BF_SIZE {
                        self.tmp_in.resize(self.max_block_size + BF_SIZE, 0);
                    }
                    if self.tmp_out.len() < self.max_block_size {
                        self.tmp_out.resize(self.max_block_size, 0);
                    }
                    self.xxh.reset(0);
                    self.history.clear();
                    if self.frame_info.block_mode == BlockMode::Linked {
                        if let Some(dict) = &self.dictionary {
                            self.history.extend_from_slice(dict.window());
                        }
                    }
                    self.tmp_in_size = 0;
                    self.tmp_in_target = 0;
                    self.tmp_out_size = 0;
                    self.tmp_out_start = 0;
                    self.stage = DecompressStage::GetBlockHeader;
                }

                DecompressStage::GetBlockHeader => {
                    let src_avail = src.len() - src_pos;
                    if src_avail >= BH_SIZE {
                        let bh = read_le32(src, src_pos);
                        src_pos += BH_SIZE;
                        if let Some(hint) = self.process_block_header(
                            bh,
                            src_pos == src.len(),
                            dst_pos == dst.len(),
                        )? {
                            next_hint = hint;
                            output_pending = dst_pos == dst.len() && src_pos < src.len();
                            break;
                        }
                    } else {
                        self.tmp_in[..src_avail].copy_from_slice(&src[src_pos..]);
                        self.tmp_in_size = src_avail;
                        src_pos += src_avail;
                        self.stage = DecompressStage::StoreBlockHeader;
                        next_hint = BH_SIZE - self.tmp_in_size;
                        break;
                    }
                }

                DecompressStage::StoreBlockHeader => {
                    let copy = (BH_SIZE - self.tmp_in_size).min(src.len() - src_pos);
                    let ts = self.tmp_in_size;
                    self.tmp_in[ts..ts + copy].copy_from_slice(&src[src_pos..src_pos + copy]);
                    self.tmp_in_size += copy;
                    src_pos += copy;
                    if self.tmp_in_size < BH_SIZE {
                        next_hint = BH_SIZE - self.tmp_in_size;
                        break;
                    }
                    let bh = read_le32(&self.tmp_in, 0);
                    if let Some(hint) =
                        self.process_block_header(bh, src_pos == src.len(), dst_pos == dst.len())?
                    {
                        next_hint = hint;
                        output_pending = dst_pos == dst.len() && src_pos < src.len();
                        break;
                    }
                }

                DecompressStage::CopyDirect => {
                    let size_to_copy = self
                        .tmp_in_target
                        .min(src.len() - src_pos)
                        .min(dst.len() - dst_pos);
                    if size_to_copy > 0 {
                        let chunk = &src[src_pos..src_pos + size_to_copy];
                        dst[dst_pos..dst_pos + size_to_copy].copy_from_slice(chunk);
                        if self.has_block_checksum() {
                            self.block_xxh.update(chunk);
                        }
                        self.note_decoded(chunk)?;
                        src_pos += size_to_copy;
                        dst_pos += size_to_copy;
                    }
                    self.tmp_in_target -= size_to_copy;
                    if self.tmp_in_target == 0 {
                        if self.has_block_checksum() {
                            self.tmp_in_size = 0;
                            self.stage = DecompressStage::GetBlockChecksum;
                        } else {
                            self.stage = DecompressStage::GetBlockHeader;
                        }
                    } else {
                        next_hint = self.tmp_in_target + self.block_crc_size() + BH_SIZE;
                        output_pending = dst_pos == dst.len() && src_pos < src.len();
                        break;
                    }
                }

                DecompressStage::GetBlockChecksum => {
                    let copy = (BF_SIZE - self.tmp_in_size).min(src.len() - src_pos);
                    let ts = self.tmp_in_size;
                    self.header[ts..ts + copy].copy_from_slice(&src[src_pos..src_pos + copy]);
                    self.tmp_in_size += copy;
                    src_pos += copy;
                    if self.tmp_in_size < BF_SIZE {
                        next_hint = BF_SIZE - self.tmp_in_size;
                        break;
                    }
                    if read_le32(&self.header, 0) != self.block_xxh.digest() {
                        return Err(FrameError::BlockChecksumInvalid);
                    }
                    self.stage = DecompressStage::GetBlockHeader;
                }

                DecompressStage::GetCBlock => {
                    let target = self.tmp_in_target;
                    if src.len() - src_pos >= target {
                        let block = &src[src_pos..src_pos + target];
                        src_pos += target;
                        self.decode_block(block, dst, &mut dst_pos)?;
                    } else {
                        self.tmp_in_size = 0;
                        self.stage = DecompressStage::StoreCBlock;
                    }
                }

                DecompressStage::StoreCBlock => {
                    let copy = (self.tmp_in_target - self.tmp_in_size).min(src.len() - src_pos);
                    let ts = self.tmp_in_size;
                    self.tmp_in[ts..ts + copy].copy_from_slice(&src[src_pos..src_pos + copy]);
                    self.tmp_in_size += copy;
                    src_pos += copy;
                    if self.tmp_in_size < self.tmp_in_target {
                        next_hint = self.tmp_in_target - self.tmp_in_size + BH_SIZE;
                        break;
                    }
                    let target = self.tmp_in_target;
                    let staged = mem::take(&mut self.tmp_in);
                    let res = self.decode_block(&staged[..target], dst, &mut dst_pos);
                    self.tmp_in = staged;
                    res?;
                }

                DecompressStage::FlushOut => {
                    let copy = (self.tmp_out_size - self.tmp_out_start).min(dst.len() - dst_pos);
                    let start = self.tmp_out_start;
                    dst[dst_pos..dst_pos + copy].copy_from_slice(&self.tmp_out[start..start + copy]);
                    self.tmp_out_start += copy;
                    dst_pos += copy;
                    if self.tmp_out_start == self.tmp_out_size {
                        self.stage = DecompressStage::GetBlockHeader;
                    } else {
                        next_hint = BH_SIZE;
                        output_pending = true;
                        break;
                    }
                }

                DecompressStage::GetSuffix => {
                    if self.frame_info.content_size != 0 && self.frame_remaining_size != 0 {
                        return Err(FrameError::FrameSizeWrong);
                    }
                    if self.frame_info.content_checksum_flag == ContentChecksum::Disabled {
                        self.reset();
                        next_hint = 0;
                        break;
                    }
                    self.tmp_in_size = 0;
                    self.stage = DecompressStage::StoreSuffix;
                }

                DecompressStage::StoreSuffix => {
                    let copy = (BF_SIZE - self.tmp_in_size).min(src.len() - src_pos);
                    let ts = self.tmp_in_size;
                    self.header[ts..ts + copy].copy_from_slice(&src[src_pos..src_pos + copy]);
                    self.tmp_in_size += copy;
                    src_pos += copy;
                    if self.tmp_in_size < BF_SIZE {
                        next_hint = BF_SIZE - self.tmp_in_size;
                        break;
                    }
                    if read_le32(&self.header, 0) != self.xxh.digest() {
                        return Err(FrameError::ContentChecksumInvalid);
                    }
                    self.reset();
                    next_hint = 0;
                    break;
                }

                DecompressStage::SkipSkippable => {
                    let skip = self.tmp_in_target.min(src.len() - src_pos);
                    src_pos += skip;
                    self.tmp_in_target -= skip;
                    next_hint = self.tmp_in_target;
                    if self.tmp_in_target == 0 {
                        self.reset();
                    }
                    break;
                }
            }
        }

        Ok(DecodeProgress {
            consumed: src_pos,
            written: dst_pos,
            hint: next_hint,
            output_pending,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn has_block_checksum(&self) -> bool {
        self.frame_info.block_checksum_flag == BlockChecksum::Enabled
    }

    fn block_crc_size(&self) -> usize {
        if self.has_block_checksum() {
            BF_SIZE
        } else {
            0
        }
    }

    fn apply_header(&mut self, info: FrameInfo) {
        self.frame_info = info;
        if info.frame_type == FrameType::SkippableFrame {
            // A skippable length is a u32, so it always fits a usize here.
            self.tmp_in_target = info.content_size as usize;
            self.stage = DecompressStage::SkipSkippable;
        } else {
            self.max_block_size = info.block_size_id.block_size();
            self.frame_remaining_size = info.content_size;
            self.stage = DecompressStage::Init;
        }
    }

    /// Route a block header. `Some(hint)` means stop this call.
    fn process_block_header(
        &mut self,
        block_header: u32,
        src_exhausted: bool,
        dst_full: bool,
    ) -> Result<Option<usize>, FrameError> {
        if block_header == 0 {
            self.stage = DecompressStage::GetSuffix;
            return Ok(None);
        }
        let size = (block_header & !BLOCK_UNCOMPRESSED_FLAG) as usize;
        if size > self.max_block_size {
            return Err(FrameError::MaxBlockSizeInvalid);
        }

        if block_header & BLOCK_UNCOMPRESSED_FLAG != 0 {
            self.tmp_in_target = size;
            self.block_xxh.reset(0);
            self.stage = DecompressStage::CopyDirect;
            return Ok(None);
        }

        let crc_size = self.block_crc_size();
        self.tmp_in_target = size + crc_size;
        self.stage = DecompressStage::GetCBlock;
        if dst_full || src_exhausted {
            return Ok(Some(BH_SIZE + size + crc_size));
        }
        Ok(None)
    }

    fn block_prefix(&self) -> &[u8] {
        if self.frame_info.block_mode == BlockMode::Linked {
            &self.history
        } else {
            self.dictionary.as_ref().map_or(&[][..], |d| d.window())
        }
    }

    /// Verify and decode one compressed block (payload plus optional checksum).
    ///
    /// Decodes straight into `dst` when a whole block fits, otherwise into
    /// `tmp_out` followed by `FlushOut`.
    fn decode_block(
        &mut self,
        block: &[u8],
        dst: &mut [u8],
        dst_pos: &mut usize,
    ) -> Result<(), FrameError> {
        let mut c_size = block.len();
        if self.has_block_checksum() {
            c_size -= BF_SIZE;
            if read_le32(block, c_size) != xxh32(&block[..c_size], 0) {
                return Err(FrameError::BlockChecksumInvalid);
            }
        }
        let compressed = &block[..c_size];

        if dst.len() - *dst_pos >= self.max_block_size {
            let out = &mut dst[*dst_pos..*dst_pos + self.max_block_size];
            let n = self
                .codec
                .decompress_block(compressed, out, self.block_prefix())?;
            self.note_decoded(&out[..n])?;
            *dst_pos += n;
            self.stage = DecompressStage::GetBlockHeader;
        } else {
            let mut out = mem::take(&mut self.tmp_out);
            let res = self
                .codec
                .decompress_block(compressed, &mut out[..self.max_block_size], self.block_prefix())
                .and_then(|n| self.note_decoded(&out[..n]).map(|()| n));
            self.tmp_out = out;
            self.tmp_out_size = res?;
            self.tmp_out_start = 0;
            self.stage = DecompressStage::FlushOut;
        }
        Ok(())
    }

    /// Account for freshly decoded bytes: checksum, declared size, history.
    fn note_decoded(&mut self, bytes: &[u8]) -> Result<(), FrameError> {
        if self.frame_info.content_checksum_flag == ContentChecksum::Enabled {
            self.xxh.update(bytes);
        }
        if self.frame_info.content_size != 0 {
            self.frame_remaining_size = self
                .frame_remaining_size
                .checked_sub(bytes.len() as u64)
                .ok_or(FrameError::FrameSizeWrong)?;
        }
        if self.frame_info.block_mode == BlockMode::Linked {
            slide_window(&mut self.history, bytes);
        }
        Ok(())
    }
}
