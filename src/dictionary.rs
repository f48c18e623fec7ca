//! Opaque dictionary handle passed through to the codec.

use std::fmt;
use std::sync::Arc;

use crate::frame::types::MAX_HISTORY_SIZE;

/// Shared, immutable dictionary: raw bytes plus the id advertised in frame
/// headers. Cloning is a reference-count bump.
#[derive(Clone, PartialEq, Eq)]
pub struct CompressionDictionary {
    id: u32,
    bytes: Arc<[u8]>,
}

impl CompressionDictionary {
    /// `id` is written to frame headers when non-zero.
    pub fn new(id: u32, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            id,
            bytes: bytes.into(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The tail the block format can actually reference (last 64 KiB).
    pub fn window(&self) -> &[u8] {
        let start = self.bytes.len().saturating_sub(MAX_HISTORY_SIZE);
        &self.bytes[start..]
    }
}

impl fmt::Debug for CompressionDictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressionDictionary")
            .field("id", &self.id)
            .field("len", &self.bytes.len())
            .finish()
    }
}
