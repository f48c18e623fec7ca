// Reorder queue and buffer pool behaviour seen from outside the crate.

use lz4flow::{BufferPool, CompressionBuffer, ReorderQueue};

fn block(id: u64) -> CompressionBuffer {
    CompressionBuffer::new(id, vec![id as u8; 16], 8)
}

#[test]
fn drains_in_id_order_whatever_the_arrival_order() {
    let arrivals = [5u64, 0, 3, 1, 4, 2, 7, 6];
    let mut queue = ReorderQueue::new();
    let mut next = 0;
    let mut written = Vec::new();
    for id in arrivals {
        queue.enqueue(block(id));
        while let Some(ready) = queue.dequeue_if(next) {
            written.push(ready.id);
            next += 1;
        }
    }
    assert_eq!(written, (0..8).collect::<Vec<_>>());
    assert!(queue.is_empty());
}

#[test]
fn peek_and_dequeue_min() {
    let mut queue = ReorderQueue::with_capacity(4);
    for id in [9, 2, 6] {
        queue.enqueue(block(id));
    }
    assert_eq!(queue.len(), 3);
    assert_eq!(queue.peek_min().map(|b| b.id), Some(2));
    assert!(queue.dequeue_if(1).is_none());
    assert_eq!(queue.dequeue_min().map(|b| b.id), Some(2));
    assert_eq!(queue.dequeue_min().map(|b| b.id), Some(6));
}

#[test]
fn drained_buffers_go_back_to_a_pool() {
    let pool = BufferPool::new(8);
    let mut queue = ReorderQueue::new();
    for id in [3, 1, 2] {
        queue.enqueue(CompressionBuffer::new(id, pool.rent(32), 10));
    }
    let order: Vec<u64> = queue
        .drain()
        .map(|b| {
            let id = b.id;
            pool.release(b.into_buffer());
            id
        })
        .collect();
    assert_eq!(order, vec![1, 2, 3]);
    assert_eq!(pool.retained(), 3);
    assert!(queue.is_empty());
}

#[test]
fn slice_covers_only_the_payload() {
    let b = CompressionBuffer::new(0, vec![1, 2, 3, 4, 5], 2);
    assert_eq!(b.as_slice(), &[1, 2]);
}

#[test]
fn shared_pool_does_not_keep_a_huge_stream_buffer() {
    use std::io::Write;

    let data = vec![0x5Au8; 12 * 1024 * 1024];
    let mut writer = lz4flow::FrameWriter::new(Vec::new(), lz4flow::FrameOptions::new());
    writer.write_all(&data).unwrap();
    let frame = writer.finish().unwrap();
    assert_eq!(lz4flow::decompress(&frame).unwrap().len(), data.len());

    let pool = BufferPool::shared();
    let buf = pool.rent(16);
    assert_eq!(buf.len(), 16);
    assert!(buf.capacity() <= pool.max_capacity());
    pool.release(buf);
}
