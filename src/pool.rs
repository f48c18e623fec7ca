//! Thread-safe byte-buffer pool.
//!
//! A stack of spare `Vec<u8>`s behind a `Mutex`: `rent` reuses one (or
//! allocates), `release` pushes it back unless the pool is full or the buffer
//! outgrew `max_capacity`. Rented buffers are plain owned vectors so they can
//! travel across threads inside a `CompressionBuffer` and be released by
//! whoever consumes them.

use std::sync::{Mutex, MutexGuard, OnceLock};

/// Spare buffers kept by [`BufferPool::shared`].
const SHARED_POOL_RETAINED: usize = 64;

/// Largest buffer kept by default: a 4 MB block bound plus frame overhead.
pub const DEFAULT_MAX_CAPACITY: usize = 4 * 1024 * 1024 + 64 * 1024;

#[derive(Debug)]
pub struct BufferPool {
    buffers: Mutex<Vec<Vec<u8>>>,
    max_retained: usize,
    max_capacity: usize,
}

impl BufferPool {
    #[must_use]
    pub fn new(max_retained: usize) -> Self {
        Self::with_max_capacity(max_retained, DEFAULT_MAX_CAPACITY)
    }

    /// A pool that drops released buffers whose capacity exceeds `max_capacity`.
    #[must_use]
    pub fn with_max_capacity(max_retained: usize, max_capacity: usize) -> Self {
        Self {
            buffers: Mutex::new(Vec::with_capacity(max_retained)),
            max_retained,
            max_capacity,
        }
    }

    /// Process-wide pool used by the stream adapters and the orchestrator.
    pub fn shared() -> &'static BufferPool {
        static SHARED: OnceLock<BufferPool> = OnceLock::new();
        SHARED.get_or_init(|| BufferPool::new(SHARED_POOL_RETAINED))
    }

    /// A zeroed buffer of exactly `len` bytes.
    ///
    /// Reuses a spare buffer that already has room for `len`, the most
    /// recently released first, or falls back to the last spare.
    pub fn rent(&self, len: usize) -> Vec<u8> {
        let recycled = {
            let mut buffers = self.lock();
            match buffers.iter().rposition(|buf| buf.capacity() >= len) {
                Some(idx) => Some(buffers.swap_remove(idx)),
                None => buffers.pop(),
            }
        };
        match recycled {
            Some(mut buf) => {
                buf.clear();
                buf.resize(len, 0);
                buf
            }
            None => vec![0u8; len],
        }
    }

    /// Return a buffer. Never panics; excess and oversized buffers are dropped.
    pub fn release(&self, buf: Vec<u8>) {
        if buf.capacity() == 0 || buf.capacity() > self.max_capacity {
            return;
        }
        let mut buffers = self.lock();
        if buffers.len() < self.max_retained {
            buffers.push(buf);
        }
    }

    /// Number of spare buffers currently held.
    pub fn retained(&self) -> usize {
        self.lock().len()
    }

    pub fn max_retained(&self) -> usize {
        self.max_retained
    }

    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    // A panic while holding the lock leaves only a Vec of spare buffers behind,
    // which is still consistent.
    fn lock(&self) -> MutexGuard<'_, Vec<Vec<u8>>> {
        self.buffers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(SHARED_POOL_RETAINED)
    }
}
