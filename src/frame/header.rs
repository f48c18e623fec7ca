//! Byte-order helpers, header encode/decode, header checksum and bound queries.
//!
//! Covers:
//! - LE read/write helpers (`read_le32`, `write_le32`, `read_le64`, `write_le64`)
//! - `optimal_block_size_id`: smallest block class that holds an input
//! - `header_checksum`: the single HC byte closing every header
//! - `frame_header_length` / `frame_footer_length` for a given `FrameInfo`
//! - `write_frame_header`, `header_size`, `parse_frame_header`
//! - `blocks_bound`, `compress_bound`, `frame_bound`: worst-case output sizes

use xxhash_rust::xxh32::xxh32;

use crate::frame::types::{
    BlockChecksum, BlockMode, BlockSizeId, ContentChecksum, FrameError, FrameInfo, FrameOptions,
    FrameType, BF_SIZE, BH_SIZE, MAGIC_NUMBER, MAGIC_SKIPPABLE_MASK, MAGIC_SKIPPABLE_START,
    MAX_FH_SIZE, MIN_FH_SIZE, MIN_SIZE_TO_KNOW_HEADER_LENGTH,
};

// ─────────────────────────────────────────────────────────────────────────────
// Byte-order I/O helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Read a little-endian `u32` from `src` at byte `offset`.
#[inline]
pub fn read_le32(src: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        src[offset],
        src[offset + 1],
        src[offset + 2],
        src[offset + 3],
    ])
}

/// Write a little-endian `u32` into `dst` at byte `offset`.
#[inline]
pub fn write_le32(dst: &mut [u8], offset: usize, value: u32) {
    dst[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Read a little-endian `u64` from `src` at byte `offset`.
#[inline]
pub fn read_le64(src: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&src[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

/// Write a little-endian `u64` into `dst` at byte `offset`.
#[inline]
pub fn write_le64(dst: &mut [u8], offset: usize, value: u64) {
    dst[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

// ─────────────────────────────────────────────────────────────────────────────
// Block-size selection and header checksum
// ─────────────────────────────────────────────────────────────────────────────

/// Smallest block class able to hold `src_size` bytes in one block, capped at
/// `requested`.
pub fn optimal_block_size_id(requested: BlockSizeId, src_size: usize) -> BlockSizeId {
    let requested = requested.resolve();
    let mut proposed = BlockSizeId::Max64Kb;
    while proposed < requested {
        if src_size <= proposed.block_size() {
            return proposed;
        }
        match proposed.next_larger() {
            Some(next) => proposed = next,
            None => break,
        }
    }
    requested
}

/// `(XXH32(descriptor, 0) >> 8) & 0xFF`, computed over FLG up to (excluding) HC.
#[inline]
pub fn header_checksum(descriptor: &[u8]) -> u8 {
    ((xxh32(descriptor, 0) >> 8) & 0xFF) as u8
}

// ─────────────────────────────────────────────────────────────────────────────
// Header / footer lengths
// ─────────────────────────────────────────────────────────────────────────────

/// Bytes `write_frame_header` produces for `info`: 7, plus 8 for a declared
/// content size, plus 4 for a dictionary id.
pub fn frame_header_length(info: &FrameInfo) -> usize {
    MIN_FH_SIZE
        + if info.content_size != 0 { 8 } else { 0 }
        + if info.dict_id != 0 { 4 } else { 0 }
}

/// End mark plus the optional content checksum: 4 or 8 bytes.
pub fn frame_footer_length(info: &FrameInfo) -> usize {
    BH_SIZE
        + if info.content_checksum_flag == ContentChecksum::Enabled {
            BF_SIZE
        } else {
            0
        }
}

// ─────────────────────────────────────────────────────────────────────────────
// Header encode / decode
// ─────────────────────────────────────────────────────────────────────────────

/// Serialise the header described by `info` into the front of `dst`.
///
/// `info.block_size_id` must already be resolved; `Default` is written as 64 KiB.
pub fn write_frame_header(dst: &mut [u8], info: &FrameInfo) -> Result<usize, FrameError> {
    let len = frame_header_length(info);
    if dst.len() < len {
        return Err(FrameError::DstMaxSizeTooSmall);
    }

    write_le32(dst, 0, MAGIC_NUMBER);
    let flg = (1u8 << 6)
        | (u8::from(info.block_mode == BlockMode::Independent) << 5)
        | (u8::from(info.block_checksum_flag == BlockChecksum::Enabled) << 4)
        | (u8::from(info.content_size != 0) << 3)
        | (u8::from(info.content_checksum_flag == ContentChecksum::Enabled) << 2)
        | u8::from(info.dict_id != 0);
    dst[4] = flg;
    dst[5] = (info.block_size_id.resolve() as u8) << 4;

    let mut pos = 6;
    if info.content_size != 0 {
        write_le64(dst, pos, info.content_size);
        pos += 8;
    }
    if info.dict_id != 0 {
        write_le32(dst, pos, info.dict_id);
        pos += 4;
    }
    dst[pos] = header_checksum(&dst[4..pos]);
    Ok(pos + 1)
}

/// Total header length of the frame starting at `src`.
///
/// Needs at least 5 bytes. Skippable frames report 8 (magic + length).
pub fn header_size(src: &[u8]) -> Result<usize, FrameError> {
    if src.len() < MIN_SIZE_TO_KNOW_HEADER_LENGTH {
        return Err(FrameError::FrameHeaderIncomplete);
    }
    let magic = read_le32(src, 0);
    if magic & MAGIC_SKIPPABLE_MASK == MAGIC_SKIPPABLE_START {
        return Ok(8);
    }
    if magic != MAGIC_NUMBER {
        return Err(FrameError::FrameTypeUnknown);
    }
    let flg = src[4];
    Ok(MIN_FH_SIZE
        + if flg & 0x08 != 0 { 8 } else { 0 }
        + if flg & 0x01 != 0 { 4 } else { 0 })
}

/// Decode a complete header. `src` must hold at least `header_size(src)` bytes.
///
/// For a skippable frame the returned `content_size` is the payload length.
pub fn parse_frame_header(src: &[u8]) -> Result<FrameInfo, FrameError> {
    let len = header_size(src)?;
    if src.len() < len {
        return Err(FrameError::FrameHeaderIncomplete);
    }

    let magic = read_le32(src, 0);
    if magic & MAGIC_SKIPPABLE_MASK == MAGIC_SKIPPABLE_START {
        return Ok(FrameInfo {
            frame_type: FrameType::SkippableFrame,
            content_size: u64::from(read_le32(src, 4)),
            ..FrameInfo::default()
        });
    }

    let flg = src[4];
    if flg >> 6 != 1 {
        return Err(FrameError::HeaderVersionWrong);
    }
    if flg & 0x02 != 0 {
        return Err(FrameError::ReservedFlagSet);
    }

    let bd = src[5];
    if bd & 0x80 != 0 || bd & 0x0F != 0 {
        return Err(FrameError::ReservedFlagSet);
    }
    let block_size_id =
        BlockSizeId::from_raw((bd >> 4) & 0x07).ok_or(FrameError::MaxBlockSizeInvalid)?;

    if header_checksum(&src[4..len - 1]) != src[len - 1] {
        return Err(FrameError::HeaderChecksumInvalid);
    }

    let mut pos = 6;
    let content_size = if flg & 0x08 != 0 {
        let v = read_le64(src, pos);
        pos += 8;
        v
    } else {
        0
    };
    let dict_id = if flg & 0x01 != 0 { read_le32(src, pos) } else { 0 };

    Ok(FrameInfo {
        block_size_id,
        block_mode: if flg & 0x20 != 0 {
            BlockMode::Independent
        } else {
            BlockMode::Linked
        },
        content_checksum_flag: if flg & 0x04 != 0 {
            ContentChecksum::Enabled
        } else {
            ContentChecksum::Disabled
        },
        frame_type: FrameType::Frame,
        content_size,
        dict_id,
        block_checksum_flag: if flg & 0x10 != 0 {
            BlockChecksum::Enabled
        } else {
            BlockChecksum::Disabled
        },
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Bound queries
// ─────────────────────────────────────────────────────────────────────────────

/// Worst-case bytes of block output (headers, payloads, block checksums) for
/// feeding `src_size` more bytes to an encoder already holding
/// `already_buffered` bytes. Excludes the frame header and footer.
///
/// Blocks are never stored larger than their input: anything that does not
/// shrink is written raw.
pub fn blocks_bound(src_size: usize, options: &FrameOptions, already_buffered: usize) -> usize {
    let flush = options.auto_flush || src_size == 0;
    let block_size = options.block_size();

    let buffered = already_buffered.min(block_size - 1);
    let max_src = src_size.saturating_add(buffered);

    let nb_full_blocks = max_src / block_size;
    let partial = max_src % block_size;
    let last_block = if flush { partial } else { 0 };
    let nb_blocks = nb_full_blocks + usize::from(last_block > 0);

    let block_crc = if options.has_block_checksum() { BF_SIZE } else { 0 };

    (BH_SIZE + block_crc)
        .saturating_mul(nb_blocks)
        .saturating_add(block_size.saturating_mul(nb_full_blocks))
        .saturating_add(last_block)
}

/// `blocks_bound` plus the end mark and optional content checksum.
pub fn compress_bound(src_size: usize, options: &FrameOptions, already_buffered: usize) -> usize {
    blocks_bound(src_size, options, already_buffered)
        .saturating_add(frame_footer_length(&options.frame_info))
}

/// Upper bound of a complete single-call frame for `src_size` bytes.
pub fn frame_bound(src_size: usize, options: &FrameOptions) -> usize {
    let flushed = options.with_auto_flush(true);
    MAX_FH_SIZE + compress_bound(src_size, &flushed, 0)
}
