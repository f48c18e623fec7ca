// lz4flow: streaming LZ4 frames, stream adapters and parallel compression

pub mod codec;
pub mod config;
pub mod decoder;
pub mod dictionary;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod parallel;
pub mod pool;
pub mod reorder;
pub mod stream;
#[cfg(feature = "async")]
pub mod async_stream;

use std::sync::OnceLock;

use crate::config::STREAM_BUFFER_SIZE;
use crate::frame::header::{frame_bound, optimal_block_size_id};

// ── Top-level re-exports ──────────────────────────────────────────────────────
pub use codec::{BlockCodec, Lz4Block};
pub use decoder::{Decoded, Decoder, OperationStatus};
pub use dictionary::CompressionDictionary;
pub use encoder::Encoder;
pub use error::{Error, Result};
pub use frame::types::{
    BlockChecksum, BlockMode, BlockSizeId, ContentChecksum, FrameError, FrameInfo, FrameOptions,
    FrameType,
};
pub use parallel::{compress_parallel, CancellationToken, ParallelOptions, ParallelSummary};
pub use pool::BufferPool;
pub use reorder::{CompressionBuffer, ReorderQueue};
pub use stream::{FrameReader, FrameWriter};
#[cfg(feature = "async")]
pub use async_stream::{AsyncFrameReader, AsyncFrameWriter};

// ── Version ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

/// Library version, parsed once from the package metadata.
pub fn version() -> Version {
    static VERSION: OnceLock<Version> = OnceLock::new();
    *VERSION.get_or_init(|| Version {
        major: env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0),
        minor: env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0),
        patch: env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or(0),
    })
}

/// `"major.minor.patch"`.
pub fn version_string() -> &'static str {
    static VERSION_STRING: OnceLock<String> = OnceLock::new();
    VERSION_STRING.get_or_init(|| {
        let v = version();
        format!("{}.{}.{}", v.major, v.minor, v.patch)
    })
}

// ── One-shot API ──────────────────────────────────────────────────────────────

/// Options actually used for a one-shot frame of `len` bytes: the content
/// size is declared, an unset block size becomes the smallest class that
/// holds the input, and a frame with a single block is marked independent.
fn one_shot_options(len: usize, options: FrameOptions) -> FrameOptions {
    let mut options = options.with_content_size(len as u64);
    if options.frame_info.block_size_id == BlockSizeId::Default {
        options = options.with_block_size(optimal_block_size_id(BlockSizeId::Max4Mb, len));
    }
    if len <= options.block_size() {
        options = options.with_block_mode(BlockMode::Independent);
    }
    options
}

/// Upper bound of the frame [`compress_with`] produces for `len` input bytes.
pub fn max_compressed_length(len: usize, options: &FrameOptions) -> usize {
    frame_bound(len, &one_shot_options(len, *options))
}

/// Compress `src` into a single frame with default options.
pub fn compress(src: &[u8]) -> Result<Vec<u8>> {
    compress_with(src, FrameOptions::default(), None)
}

pub fn compress_with(
    src: &[u8],
    options: FrameOptions,
    dictionary: Option<&CompressionDictionary>,
) -> Result<Vec<u8>> {
    let mut dst = vec![0u8; max_compressed_length(src.len(), &options)];
    let n = compress_into(src, &mut dst, options, dictionary)?;
    dst.truncate(n);
    Ok(dst)
}

/// Compress `src` into `dst` as one frame. Size `dst` with
/// [`max_compressed_length`]; a smaller buffer is a usage error.
pub fn compress_into(
    src: &[u8],
    dst: &mut [u8],
    options: FrameOptions,
    dictionary: Option<&CompressionDictionary>,
) -> Result<usize> {
    let mut encoder = Encoder::new(one_shot_options(src.len(), options));
    if let Some(dict) = dictionary {
        encoder = encoder.with_dictionary(dict.clone());
    }
    let written = encoder.compress(src, dst)?;
    Ok(written + encoder.close(&mut dst[written..])?)
}

/// Decompress every frame in `src`, skipping skippable frames.
pub fn decompress(src: &[u8]) -> Result<Vec<u8>> {
    decompress_with(src, None)
}

/// Like [`decompress`], for frames compressed against `dictionary`.
pub fn decompress_with(src: &[u8], dictionary: Option<&CompressionDictionary>) -> Result<Vec<u8>> {
    let mut decoder = match dictionary {
        Some(dict) => Decoder::with_dictionary(dict.clone()),
        None => Decoder::new(),
    };
    let hint = frame_info(src)
        .filter(|info| info.frame_type == FrameType::Frame)
        .map_or(0, |info| info.content_size as usize);
    let mut out = Vec::with_capacity(hint.min(src.len().saturating_mul(255)));
    let mut chunk = vec![0u8; STREAM_BUFFER_SIZE];
    let mut pos = 0;

    while pos < src.len() || decoder.is_mid_frame() {
        let step = decoder.decompress(&src[pos..], &mut chunk)?;
        pos += step.consumed;
        out.extend_from_slice(&chunk[..step.written]);
        match step.status {
            OperationStatus::Done => decoder.reset()?,
            OperationStatus::DestinationTooSmall => {}
            OperationStatus::NeedMoreData => {
                if pos == src.len() && step.written == 0 {
                    return Err(Error::TruncatedStream);
                }
            }
            OperationStatus::InvalidData => {
                let code = decoder.last_error().unwrap_or(FrameError::Generic);
                return Err(Error::MalformedStream(code));
            }
        }
    }
    Ok(out)
}

/// Header of the frame at the start of `src`, if it parses.
pub fn frame_info(src: &[u8]) -> Option<FrameInfo> {
    Decoder::frame_info(src).ok()
}
