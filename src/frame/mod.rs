//! LZ4 frame format: header codec, streaming compression and decompression
//! contexts.
//!
//! These contexts are the frame-level primitive: they never allocate caller
//! output and report failures as raw [`FrameError`] codes. The
//! [`Encoder`](crate::Encoder) and [`Decoder`](crate::Decoder) wrap them with
//! lifecycle and status handling.

pub mod compress;
pub mod decompress;
pub mod header;
pub mod types;

pub use compress::CompressionContext;
pub use decompress::DecompressionContext;
pub use header::{frame_bound, header_size, parse_frame_header};
pub use types::{
    BlockChecksum, BlockMode, BlockSizeId, ContentChecksum, FrameError, FrameInfo, FrameOptions,
    FrameType,
};

use types::MAX_HISTORY_SIZE;

/// Append `bytes` to a rolling history, keeping at most the last 64 KiB.
pub(crate) fn slide_window(window: &mut Vec<u8>, bytes: &[u8]) {
    if bytes.len() >= MAX_HISTORY_SIZE {
        window.clear();
        window.extend_from_slice(&bytes[bytes.len() - MAX_HISTORY_SIZE..]);
        return;
    }
    let overflow = (window.len() + bytes.len()).saturating_sub(MAX_HISTORY_SIZE);
    if overflow > 0 {
        window.drain(..overflow);
    }
    window.extend_from_slice(bytes);
}
