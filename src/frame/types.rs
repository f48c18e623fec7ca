//! LZ4 frame format types, constants, and codec error codes.
//!
//! Covers:
//! - Wire constants (magic numbers, `BH_SIZE`, `BF_SIZE`, header size limits)
//! - Frame parameter enums: `BlockSizeId`, `BlockMode`, `ContentChecksum`, etc.
//! - `FrameInfo` (what a header describes) and `FrameOptions` (what an encoder is asked to produce)
//! - `DecompressStage`, the decoder state-machine stages
//! - `FrameError` with stable `error_name()` strings

use core::fmt;

// ─────────────────────────────────────────────────────────────────────────────
// Wire constants
// ─────────────────────────────────────────────────────────────────────────────

/// Magic number opening every standard LZ4 frame.
pub const MAGIC_NUMBER: u32 = 0x184D_2204;

/// First of the sixteen skippable-frame magic numbers (`0x184D2A50..=0x184D2A5F`).
pub const MAGIC_SKIPPABLE_START: u32 = 0x184D_2A50;

/// Mask selecting the skippable-frame family from a magic number.
pub const MAGIC_SKIPPABLE_MASK: u32 = 0xFFFF_FFF0;

/// High bit of a block header: the block payload is stored uncompressed.
pub const BLOCK_UNCOMPRESSED_FLAG: u32 = 0x8000_0000;

/// Block header size in bytes.
pub const BH_SIZE: usize = 4;

/// Block (and content) checksum size in bytes.
pub const BF_SIZE: usize = 4;

/// Smallest possible frame header: magic + FLG + BD + HC.
pub const MIN_FH_SIZE: usize = 7;

/// Largest possible frame header: adds 8-byte content size and 4-byte dictionary id.
pub const MAX_FH_SIZE: usize = 19;

/// Largest possible frame footer: end mark + content checksum.
pub const MAX_FOOTER_SIZE: usize = BH_SIZE + BF_SIZE;

/// Bytes needed before [`header_size`](crate::frame::header::header_size) can answer.
pub const MIN_SIZE_TO_KNOW_HEADER_LENGTH: usize = 5;

/// Back-reference window of the LZ4 block format; linked history never exceeds it.
pub const MAX_HISTORY_SIZE: usize = 64 * 1024;

// ─────────────────────────────────────────────────────────────────────────────
// Frame parameter enums
// ─────────────────────────────────────────────────────────────────────────────

/// Maximum block size class of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum BlockSizeId {
    /// Resolved to `Max64Kb` when a frame begins.
    #[default]
    Default = 0,
    Max64Kb = 4,
    Max256Kb = 5,
    Max1Mb = 6,
    Max4Mb = 7,
}

impl BlockSizeId {
    /// Parses the 3-bit field of the BD byte. Values below 4 are invalid.
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            4 => Some(BlockSizeId::Max64Kb),
            5 => Some(BlockSizeId::Max256Kb),
            6 => Some(BlockSizeId::Max1Mb),
            7 => Some(BlockSizeId::Max4Mb),
            _ => None,
        }
    }

    /// `Default` resolves to `Max64Kb`; every other id maps to itself.
    pub fn resolve(self) -> Self {
        match self {
            BlockSizeId::Default => BlockSizeId::Max64Kb,
            other => other,
        }
    }

    /// Block size in bytes: 64 KiB, 256 KiB, 1 MiB or 4 MiB.
    pub fn block_size(self) -> usize {
        match self.resolve() {
            BlockSizeId::Max256Kb => 256 * 1024,
            BlockSizeId::Max1Mb => 1024 * 1024,
            BlockSizeId::Max4Mb => 4 * 1024 * 1024,
            _ => 64 * 1024,
        }
    }

    /// The next larger class, or `None` at `Max4Mb`.
    pub fn next_larger(self) -> Option<Self> {
        match self.resolve() {
            BlockSizeId::Max64Kb => Some(BlockSizeId::Max256Kb),
            BlockSizeId::Max256Kb => Some(BlockSizeId::Max1Mb),
            BlockSizeId::Max1Mb => Some(BlockSizeId::Max4Mb),
            _ => None,
        }
    }
}

/// Block linking mode: linked blocks may reference the previous 64 KiB of output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlockMode {
    #[default]
    Linked,
    /// Every block decodes on its own; required for parallel compression.
    Independent,
}

/// Whether an XXH32 of the whole content follows the end mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContentChecksum {
    #[default]
    Disabled,
    Enabled,
}

/// Whether an XXH32 of the stored bytes follows every block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlockChecksum {
    #[default]
    Disabled,
    Enabled,
}

/// Standard frame or skippable frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrameType {
    #[default]
    Frame,
    SkippableFrame,
}

// ─────────────────────────────────────────────────────────────────────────────
// FrameInfo / FrameOptions
// ─────────────────────────────────────────────────────────────────────────────

/// Frame parameters as carried by a frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameInfo {
    pub block_size_id: BlockSizeId,
    pub block_mode: BlockMode,
    pub content_checksum_flag: ContentChecksum,
    /// Read-only when decoding: standard or skippable.
    pub frame_type: FrameType,
    /// Uncompressed content size in bytes; 0 = unknown.
    /// For skippable frames this holds the skippable payload length.
    pub content_size: u64,
    /// Dictionary id hint; 0 = none.
    pub dict_id: u32,
    pub block_checksum_flag: BlockChecksum,
}

/// Everything an encoder needs to produce a frame.
///
/// A plain `Copy` value: every `with_*` method returns a modified copy and
/// leaves the receiver untouched, so one options value can be shared freely
/// between encoders and threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameOptions {
    pub frame_info: FrameInfo,
    /// Handed to the block codec. 0 is the fast default; negative values trade
    /// ratio for speed.
    pub compression_level: i32,
    /// Emit every `compress` input immediately instead of buffering partial blocks.
    pub auto_flush: bool,
}

impl FrameOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_block_size(mut self, id: BlockSizeId) -> Self {
        self.frame_info.block_size_id = id;
        self
    }

    pub fn with_block_mode(mut self, mode: BlockMode) -> Self {
        self.frame_info.block_mode = mode;
        self
    }

    pub fn with_content_checksum(mut self, enabled: bool) -> Self {
        self.frame_info.content_checksum_flag = if enabled {
            ContentChecksum::Enabled
        } else {
            ContentChecksum::Disabled
        };
        self
    }

    pub fn with_block_checksum(mut self, enabled: bool) -> Self {
        self.frame_info.block_checksum_flag = if enabled {
            BlockChecksum::Enabled
        } else {
            BlockChecksum::Disabled
        };
        self
    }

    /// Declares the uncompressed size in the header; 0 means unknown.
    pub fn with_content_size(mut self, size: u64) -> Self {
        self.frame_info.content_size = size;
        self
    }

    pub fn with_dictionary_id(mut self, id: u32) -> Self {
        self.frame_info.dict_id = id;
        self
    }

    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    pub fn with_auto_flush(mut self, auto_flush: bool) -> Self {
        self.auto_flush = auto_flush;
        self
    }

    /// Block size in bytes after resolving `BlockSizeId::Default`.
    pub fn block_size(&self) -> usize {
        self.frame_info.block_size_id.block_size()
    }

    pub fn has_content_checksum(&self) -> bool {
        self.frame_info.content_checksum_flag == ContentChecksum::Enabled
    }

    pub fn has_block_checksum(&self) -> bool {
        self.frame_info.block_checksum_flag == BlockChecksum::Enabled
    }

    pub fn is_linked(&self) -> bool {
        self.frame_info.block_mode == BlockMode::Linked
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Decoder stages
// ─────────────────────────────────────────────────────────────────────────────

/// Decompression state-machine stages, in the order a frame is walked.
///
/// Declaration order is significant: `stage <= Init` means "no block has been
/// decoded yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum DecompressStage {
    /// Waiting for a frame header; the context is between frames.
    #[default]
    GetFrameHeader,
    /// Header bytes are arriving in pieces and are staged internally.
    StoreFrameHeader,
    /// Header decoded; buffers are sized on the next call.
    Init,
    GetBlockHeader,
    StoreBlockHeader,
    /// Uncompressed block: bytes go straight from source to destination.
    CopyDirect,
    GetBlockChecksum,
    GetCBlock,
    StoreCBlock,
    /// A decoded block waits in the internal output buffer.
    FlushOut,
    GetSuffix,
    StoreSuffix,
    /// Discarding the payload of a skippable frame.
    SkipSkippable,
}

// ─────────────────────────────────────────────────────────────────────────────
// Error codes
// ─────────────────────────────────────────────────────────────────────────────

/// Codec-level failure codes.
///
/// `error_name()` strings are stable and match the names LZ4 tooling prints,
/// so they can be matched on in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameError {
    Generic,
    MaxBlockSizeInvalid,
    BlockModeInvalid,
    ParameterInvalid,
    CompressionLevelInvalid,
    HeaderVersionWrong,
    BlockChecksumInvalid,
    ReservedFlagSet,
    SrcSizeTooLarge,
    DstMaxSizeTooSmall,
    FrameHeaderIncomplete,
    FrameTypeUnknown,
    FrameSizeWrong,
    CompressionFailed,
    DecompressionFailed,
    HeaderChecksumInvalid,
    ContentChecksumInvalid,
    FrameDecodingAlreadyStarted,
    CompressionStateUninitialized,
}

impl FrameError {
    pub fn error_name(&self) -> &'static str {
        match self {
            FrameError::Generic => "ERROR_GENERIC",
            FrameError::MaxBlockSizeInvalid => "ERROR_maxBlockSize_invalid",
            FrameError::BlockModeInvalid => "ERROR_blockMode_invalid",
            FrameError::ParameterInvalid => "ERROR_parameter_invalid",
            FrameError::CompressionLevelInvalid => "ERROR_compressionLevel_invalid",
            FrameError::HeaderVersionWrong => "ERROR_headerVersion_wrong",
            FrameError::BlockChecksumInvalid => "ERROR_blockChecksum_invalid",
            FrameError::ReservedFlagSet => "ERROR_reservedFlag_set",
            FrameError::SrcSizeTooLarge => "ERROR_srcSize_tooLarge",
            FrameError::DstMaxSizeTooSmall => "ERROR_dstMaxSize_tooSmall",
            FrameError::FrameHeaderIncomplete => "ERROR_frameHeader_incomplete",
            FrameError::FrameTypeUnknown => "ERROR_frameType_unknown",
            FrameError::FrameSizeWrong => "ERROR_frameSize_wrong",
            FrameError::CompressionFailed => "ERROR_compressionFailed",
            FrameError::DecompressionFailed => "ERROR_decompressionFailed",
            FrameError::HeaderChecksumInvalid => "ERROR_headerChecksum_invalid",
            FrameError::ContentChecksumInvalid => "ERROR_contentChecksum_invalid",
            FrameError::FrameDecodingAlreadyStarted => "ERROR_frameDecoding_alreadyStarted",
            FrameError::CompressionStateUninitialized => "ERROR_compressionState_uninitialized",
        }
    }

    /// True for codes that mean the compressed input itself is bad, as opposed
    /// to a caller mistake such as an undersized destination.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            FrameError::MaxBlockSizeInvalid
                | FrameError::HeaderVersionWrong
                | FrameError::BlockChecksumInvalid
                | FrameError::ReservedFlagSet
                | FrameError::FrameTypeUnknown
                | FrameError::FrameSizeWrong
                | FrameError::DecompressionFailed
                | FrameError::HeaderChecksumInvalid
                | FrameError::ContentChecksumInvalid
        )
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.error_name())
    }
}

impl std::error::Error for FrameError {}
