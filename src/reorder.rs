//! Reorder queue for out-of-order compressed blocks.
//!
//! Items are kept sorted by *descending* id so the smallest id sits at the end
//! of the vector: `peek_min` and `dequeue_min` are O(1), and inserting a block
//! that arrives nearly in order only shifts a handful of elements.

/// One compressed block travelling from a worker to the reassembler.
///
/// `buffer` is a pool-rented vector; only `buffer[..length]` is meaningful.
#[derive(Debug)]
pub struct CompressionBuffer {
    pub id: u64,
    pub buffer: Vec<u8>,
    pub length: usize,
}

impl CompressionBuffer {
    pub fn new(id: u64, buffer: Vec<u8>, length: usize) -> Self {
        debug_assert!(length <= buffer.len());
        Self { id, buffer, length }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[..self.length]
    }

    /// Give the backing buffer back, e.g. to return it to a pool.
    pub fn into_buffer(self) -> Vec<u8> {
        self.buffer
    }
}

#[derive(Debug, Default)]
pub struct ReorderQueue {
    items: Vec<CompressionBuffer>,
}

impl ReorderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    pub fn enqueue(&mut self, item: CompressionBuffer) {
        // Descending order: position of the first element with a smaller id.
        let pos = self.items.partition_point(|queued| queued.id > item.id);
        self.items.insert(pos, item);
    }

    pub fn peek_min(&self) -> Option<&CompressionBuffer> {
        self.items.last()
    }

    pub fn dequeue_min(&mut self) -> Option<CompressionBuffer> {
        self.items.pop()
    }

    /// Pop the smallest item only if its id equals `id`.
    pub fn dequeue_if(&mut self, id: u64) -> Option<CompressionBuffer> {
        match self.items.last() {
            Some(item) if item.id == id => self.items.pop(),
            _ => None,
        }
    }

    /// Remove every item, smallest id first.
    pub fn drain(&mut self) -> impl Iterator<Item = CompressionBuffer> + '_ {
        self.items.drain(..).rev()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
