//! Block codec seam.
//!
//! Everything above this module speaks in frames; everything below it speaks
//! in single LZ4 blocks. `BlockCodec` is the only place match finding happens,
//! so tests can swap in slow or failing codecs without touching frame logic.

use lz4_flex::block::{
    compress_into, compress_into_with_dict, decompress_into, decompress_into_with_dict,
    get_maximum_output_size,
};

use crate::frame::types::FrameError;

/// Compress and decompress one raw block into caller-supplied memory.
///
/// Implementations never allocate the destination and must be usable from
/// several threads at once.
pub trait BlockCodec: Send + Sync {
    /// Upper bound on the compressed size of `input_len` bytes.
    fn max_block_compressed_length(&self, input_len: usize) -> usize;

    /// Compress `src` into `dst`, optionally referencing `prefix` (the bytes
    /// that logically precede `src`). Returns the compressed length.
    fn compress_block(
        &self,
        src: &[u8],
        dst: &mut [u8],
        prefix: &[u8],
        level: i32,
    ) -> Result<usize, FrameError>;

    /// Decompress `src` into `dst`, resolving back-references into `prefix`.
    /// Returns the decompressed length.
    fn decompress_block(&self, src: &[u8], dst: &mut [u8], prefix: &[u8])
        -> Result<usize, FrameError>;
}

/// Default codec: the pure-Rust LZ4 block format from `lz4_flex`.
///
/// `lz4_flex` has a single (fast) mode, so the compression level is accepted
/// and ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4Block;

impl BlockCodec for Lz4Block {
    fn max_block_compressed_length(&self, input_len: usize) -> usize {
        get_maximum_output_size(input_len)
    }

    fn compress_block(
        &self,
        src: &[u8],
        dst: &mut [u8],
        prefix: &[u8],
        _level: i32,
    ) -> Result<usize, FrameError> {
        let res = if prefix.is_empty() {
            compress_into(src, dst)
        } else {
            compress_into_with_dict(src, dst, prefix)
        };
        res.map_err(|_| FrameError::CompressionFailed)
    }

    fn decompress_block(
        &self,
        src: &[u8],
        dst: &mut [u8],
        prefix: &[u8],
    ) -> Result<usize, FrameError> {
        let res = if prefix.is_empty() {
            decompress_into(src, dst)
        } else {
            decompress_into_with_dict(src, dst, prefix)
        };
        res.map_err(|_| FrameError::DecompressionFailed)
    }
}
