//! Multi-threaded compression of one in-memory input into one frame.
//!
//! Workers on a rayon pool claim block ids from a shared counter, compress
//! their slice of the input with a private header-less encoder, and hand the
//! result over a bounded channel. The calling thread reassembles: arrivals go
//! into a [`ReorderQueue`] and are written to the sink strictly by id.
//!
//! Memory is bounded by permits: a worker takes one before claiming a block
//! and the reassembler returns it once that block has been written, so at most
//! `queue_capacity + workers` compressed blocks exist at any time.

use std::any::Any;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, trace};

use crate::codec::{BlockCodec, Lz4Block};
use crate::config::{init_nb_workers, HANDOFF_SLOTS_PER_WORKER};
use crate::dictionary::CompressionDictionary;
use crate::encoder::Encoder;
use crate::error::{Error, Result};
use crate::frame::header::optimal_block_size_id;
use crate::frame::types::{
    BlockMode, BlockSizeId, FrameError, FrameOptions, MAX_FH_SIZE, MAX_FOOTER_SIZE,
};
use crate::pool::BufferPool;
use crate::reorder::{CompressionBuffer, ReorderQueue};

const MIB: usize = 1024 * 1024;

/// Cooperative cancellation flag shared between a caller and a running
/// [`compress_parallel`].
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// How [`compress_parallel`] schedules its work.
#[derive(Clone)]
pub struct ParallelOptions {
    /// Worker count; `None` reads `LZ4FLOW_NBWORKERS`, falling back to the CPU count.
    pub parallelism: Option<usize>,
    /// Hand-off channel capacity; `None` means two slots per worker.
    pub queue_capacity: Option<usize>,
    pub cancellation: Option<CancellationToken>,
    pub codec: Arc<dyn BlockCodec>,
}

impl ParallelOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parallelism(mut self, workers: usize) -> Self {
        self.parallelism = Some(workers);
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn with_codec(mut self, codec: Arc<dyn BlockCodec>) -> Self {
        self.codec = codec;
        self
    }
}

impl Default for ParallelOptions {
    fn default() -> Self {
        Self {
            parallelism: None,
            queue_capacity: None,
            cancellation: None,
            codec: Arc::new(Lz4Block),
        }
    }
}

/// What a [`compress_parallel`] run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelSummary {
    pub workers: usize,
    pub block_size: usize,
    pub block_count: usize,
    pub bytes_in: u64,
    /// Header, blocks and footer.
    pub bytes_out: u64,
    /// Most compressed blocks alive at once (rented and not yet written).
    pub peak_outstanding: usize,
    pub queue_capacity: usize,
}

/// Block size class for `len` bytes split across `workers`.
///
/// A single worker gets the smallest class that holds the whole input; several
/// workers get larger blocks as each one's share of the input grows.
pub fn select_block_size(len: usize, workers: usize) -> BlockSizeId {
    if workers <= 1 {
        return optimal_block_size_id(BlockSizeId::Max4Mb, len);
    }
    match len / workers {
        share if share >= 16 * MIB => BlockSizeId::Max4Mb,
        share if share >= 4 * MIB => BlockSizeId::Max1Mb,
        share if share >= MIB => BlockSizeId::Max256Kb,
        _ => BlockSizeId::Max64Kb,
    }
}

/// Compress `source` into one frame on `sink` using several workers.
///
/// The frame declares the content size and uses independent blocks whenever
/// more than one worker runs. Content checksums need a single sequential pass
/// and are rejected unless `parallelism` is exactly 1; that check happens
/// before anything is written. On failure or cancellation the sink may hold a
/// partial frame.
pub fn compress_parallel<W: Write + ?Sized>(
    source: &[u8],
    sink: &mut W,
    options: FrameOptions,
    dictionary: Option<&CompressionDictionary>,
    parallel: &ParallelOptions,
) -> Result<ParallelSummary> {
    let requested = match parallel.parallelism {
        Some(0) => return Err(Error::usage("parallelism must be at least 1")),
        Some(n) => n,
        None => init_nb_workers(),
    };
    if options.has_content_checksum() && parallel.parallelism != Some(1) {
        return Err(Error::usage(
            "content checksum needs a sequential pass; set parallelism to 1",
        ));
    }
    if parallel.queue_capacity == Some(0) {
        return Err(Error::usage("queue capacity must be at least 1"));
    }
    if is_cancelled(parallel.cancellation.as_ref()) {
        return Err(Error::Cancelled);
    }

    let len = source.len();
    let block_size_id = match options.frame_info.block_size_id {
        BlockSizeId::Default => select_block_size(len, requested),
        explicit => explicit,
    };
    let mut frame = options
        .with_block_size(block_size_id)
        .with_content_size(len as u64);
    let block_size = frame.block_size();
    let block_count = len.div_ceil(block_size);
    let workers = requested.min(block_count).max(1);

    if workers == 1 {
        debug!(block_size, block_count, "compressing sequentially");
        return compress_sequential(source, sink, frame, dictionary, parallel, block_count);
    }

    frame = frame
        .with_block_mode(BlockMode::Independent)
        .with_auto_flush(true);
    let queue_capacity = parallel
        .queue_capacity
        .unwrap_or(workers * HANDOFF_SLOTS_PER_WORKER);
    debug!(workers, block_size, block_count, queue_capacity, "compressing in parallel");

    let mut header = [0u8; MAX_FH_SIZE];
    let mut header_encoder = encoder_for(frame, &parallel.codec, dictionary);
    let header_len = header_encoder.compress(&[], &mut header)?;
    sink.write_all(&header[..header_len])?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("lz4flow-worker-{i}"))
        .build()
        .map_err(|e| Error::Io(std::io::Error::other(e)))?;

    let permit_count = queue_capacity + workers;
    let (permit_tx, permit_rx) = bounded(permit_count);
    for _ in 0..permit_count {
        let _ = permit_tx.send(());
    }

    let shared = Shared {
        source,
        block_size,
        block_count: block_count as u64,
        block_options: frame
            .with_content_size(0)
            .with_content_checksum(false),
        dictionary,
        codec: Arc::clone(&parallel.codec),
        cancellation: parallel.cancellation.as_ref(),
        next_id: AtomicU64::new(0),
        stop: AtomicBool::new(false),
        outstanding: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
        permit_tx,
        permit_rx,
        failure: Mutex::new(None),
    };

    let (handoff_tx, handoff_rx) = bounded::<CompressionBuffer>(queue_capacity);
    let written = pool.in_place_scope(|scope| {
        for _ in 0..workers {
            let tx = handoff_tx.clone();
            let shared = &shared;
            scope.spawn(move |_| shared.work(tx));
        }
        drop(handoff_tx);
        shared.reassemble(&handoff_rx, sink, workers + queue_capacity)
    });

    if let Some(err) = shared.take_failure() {
        return Err(err);
    }
    let (next, blocks_out) = written;
    if next != shared.block_count {
        return Err(Error::Cancelled);
    }

    let mut footer = [0u8; MAX_FOOTER_SIZE];
    let mut footer_encoder = encoder_for(frame.with_content_size(0), &parallel.codec, dictionary)
        .without_header();
    let footer_len = footer_encoder.close(&mut footer)?;
    sink.write_all(&footer[..footer_len])?;
    sink.flush()?;

    Ok(ParallelSummary {
        workers,
        block_size,
        block_count,
        bytes_in: len as u64,
        bytes_out: (header_len + footer_len) as u64 + blocks_out,
        peak_outstanding: shared.peak.load(Ordering::Acquire),
        queue_capacity,
    })
}

fn is_cancelled(token: Option<&CancellationToken>) -> bool {
    token.is_some_and(CancellationToken::is_cancelled)
}

fn encoder_for(
    options: FrameOptions,
    codec: &Arc<dyn BlockCodec>,
    dictionary: Option<&CompressionDictionary>,
) -> Encoder {
    let encoder = Encoder::with_codec(options, Arc::clone(codec));
    match dictionary {
        Some(dict) => encoder.with_dictionary(dict.clone()),
        None => encoder,
    }
}

/// One encoder over the whole input, checking for cancellation between blocks.
fn compress_sequential<W: Write + ?Sized>(
    source: &[u8],
    sink: &mut W,
    options: FrameOptions,
    dictionary: Option<&CompressionDictionary>,
    parallel: &ParallelOptions,
    block_count: usize,
) -> Result<ParallelSummary> {
    let block_size = options.block_size();
    let mut encoder = encoder_for(options, &parallel.codec, dictionary);
    let pool = BufferPool::shared();
    let mut buffer = pool.rent(encoder.max_compressed_length(block_size, true, true));
    let mut bytes_out = 0u64;

    let result = (|| {
        for chunk in source.chunks(block_size) {
            if is_cancelled(parallel.cancellation.as_ref()) {
                return Err(Error::Cancelled);
            }
            let n = encoder.compress(chunk, &mut buffer)?;
            sink.write_all(&buffer[..n])?;
            bytes_out += n as u64;
        }
        let n = encoder.close(&mut buffer)?;
        sink.write_all(&buffer[..n])?;
        sink.flush()?;
        bytes_out += n as u64;
        Ok(())
    })();
    pool.release(buffer);
    result?;

    Ok(ParallelSummary {
        workers: 1,
        block_size,
        block_count,
        bytes_in: source.len() as u64,
        bytes_out,
        peak_outstanding: usize::from(!source.is_empty()),
        queue_capacity: 0,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Worker / reassembler state
// ─────────────────────────────────────────────────────────────────────────────

struct Shared<'a> {
    source: &'a [u8],
    block_size: usize,
    block_count: u64,
    /// Header-less, independent, auto-flushed: one `compress` = one block.
    block_options: FrameOptions,
    dictionary: Option<&'a CompressionDictionary>,
    codec: Arc<dyn BlockCodec>,
    cancellation: Option<&'a CancellationToken>,
    next_id: AtomicU64,
    stop: AtomicBool,
    outstanding: AtomicUsize,
    peak: AtomicUsize,
    permit_tx: Sender<()>,
    permit_rx: Receiver<()>,
    /// First failure wins.
    failure: Mutex<Option<Error>>,
}

impl Shared<'_> {
    fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Acquire) || is_cancelled(self.cancellation)
    }

    fn fail(&self, err: Error) {
        let mut slot = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(err);
        }
        self.stop.store(true, Ordering::Release);
    }

    fn take_failure(&self) -> Option<Error> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn rent(&self, len: usize) -> Vec<u8> {
        let now = self.outstanding.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);
        BufferPool::shared().rent(len)
    }

    /// Return a block's buffer to the pool and its permit to the workers.
    fn release(&self, buffer: Vec<u8>) {
        BufferPool::shared().release(buffer);
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
        let _ = self.permit_tx.send(());
    }

    fn work(&self, handoff: Sender<CompressionBuffer>) {
        let mut encoder = encoder_for(self.block_options, &self.codec, self.dictionary).without_header();
        loop {
            if self.permit_rx.recv().is_err() {
                return;
            }
            if self.should_stop() {
                let _ = self.permit_tx.send(());
                return;
            }
            let id = self.next_id.fetch_add(1, Ordering::AcqRel);
            if id >= self.block_count {
                let _ = self.permit_tx.send(());
                return;
            }

            let start = id as usize * self.block_size;
            let end = (start + self.block_size).min(self.source.len());
            let chunk = &self.source[start..end];
            // A claimed block is always either handed off or failed, even when
            // the codec panics.
            let mut rented: Option<Vec<u8>> = None;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                let bound = encoder.max_compressed_length(chunk.len(), false, false);
                let buffer = rented.insert(self.rent(bound));
                encoder.compress(chunk, buffer)
            }))
            .unwrap_or_else(|payload| Err(Error::WorkerPanicked(panic_message(payload.as_ref()))));

            match (outcome, rented) {
                (Ok(length), Some(buffer)) => {
                    if let Err(returned) = handoff.send(CompressionBuffer::new(id, buffer, length)) {
                        self.release(returned.into_inner().into_buffer());
                        return;
                    }
                }
                (outcome, rented) => {
                    match rented {
                        Some(buffer) => self.release(buffer),
                        None => {
                            let _ = self.permit_tx.send(());
                        }
                    }
                    self.fail(outcome.err().unwrap_or(Error::Codec(FrameError::Generic)));
                    return;
                }
            }
        }
    }

    /// Write blocks in id order until every worker has hung up. Returns the
    /// number of blocks written and their byte count.
    fn reassemble<W: Write + ?Sized>(
        &self,
        handoff: &Receiver<CompressionBuffer>,
        sink: &mut W,
        max_pending: usize,
    ) -> (u64, u64) {
        let mut queue = ReorderQueue::with_capacity(max_pending);
        let mut next = 0u64;
        let mut bytes = 0u64;
        let mut failed = false;

        for arrival in handoff.iter() {
            if failed {
                self.release(arrival.into_buffer());
                continue;
            }
            queue.enqueue(arrival);
            debug_assert!(queue.len() <= max_pending);

            while let Some(ready) = queue.dequeue_if(next) {
                let res = sink.write_all(ready.as_slice());
                let length = ready.length;
                self.release(ready.into_buffer());
                if let Err(e) = res {
                    self.fail(e.into());
                    break;
                }
                bytes += length as u64;
                trace!(block = next, bytes = length, "block written");
                next += 1;
            }

            if is_cancelled(self.cancellation) && next != self.block_count {
                self.fail(Error::Cancelled);
            }
            if self.stop.load(Ordering::Acquire) {
                failed = true;
                for pending in queue.drain() {
                    self.release(pending.into_buffer());
                }
            }
        }

        for pending in queue.drain() {
            self.release(pending.into_buffer());
        }
        (next, bytes)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_size_grows_with_per_worker_share() {
        assert_eq!(select_block_size(100, 1), BlockSizeId::Max64Kb);
        assert_eq!(select_block_size(300 * 1024, 1), BlockSizeId::Max1Mb);
        assert_eq!(select_block_size(8 * MIB, 1), BlockSizeId::Max4Mb);
        assert_eq!(select_block_size(5 * MIB, 4), BlockSizeId::Max256Kb);
        assert_eq!(select_block_size(20 * MIB, 4), BlockSizeId::Max1Mb);
        assert_eq!(select_block_size(64 * MIB, 4), BlockSizeId::Max4Mb);
        assert_eq!(select_block_size(MIB, 4), BlockSizeId::Max64Kb);
    }

    #[test]
    fn zero_parallelism_is_usage_error() {
        let mut sink = Vec::new();
        let opts = ParallelOptions::new().with_parallelism(0);
        let err = compress_parallel(b"x", &mut sink, FrameOptions::new(), None, &opts).unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
    }

    #[test]
    fn content_checksum_allowed_when_sequential() {
        let mut sink = Vec::new();
        let opts = ParallelOptions::new().with_parallelism(1);
        let frame = FrameOptions::new().with_content_checksum(true);
        let summary = compress_parallel(&[7u8; 1000], &mut sink, frame, None, &opts).unwrap();
        assert_eq!(summary.workers, 1);
        assert_eq!(crate::decompress(&sink).unwrap(), vec![7u8; 1000]);
    }

    #[test]
    fn workers_never_exceed_blocks() {
        let data = vec![1u8; 3 * 64 * 1024];
        let mut sink = Vec::new();
        let opts = ParallelOptions::new().with_parallelism(8);
        let summary = compress_parallel(&data, &mut sink, FrameOptions::new(), None, &opts).unwrap();
        assert_eq!(summary.block_count, 3);
        assert_eq!(summary.workers, 3);
        assert_eq!(summary.bytes_out, sink.len() as u64);
    }

    #[test]
    fn empty_input_is_header_and_footer() {
        let mut sink = Vec::new();
        let opts = ParallelOptions::new().with_parallelism(4);
        let summary = compress_parallel(&[], &mut sink, FrameOptions::new(), None, &opts).unwrap();
        assert_eq!(summary.block_count, 0);
        assert_eq!(crate::decompress(&sink).unwrap(), Vec::<u8>::new());
    }

    struct OneWriteSink(Option<usize>);

    impl Write for OneWriteSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            match self.0.take() {
                Some(_) => Ok(buf.len()),
                None => Err(std::io::Error::other("closed")),
            }
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_writes_are_not_counted() {
        let (permit_tx, permit_rx) = bounded(8);
        let shared = Shared {
            source: &[],
            block_size: 64 * 1024,
            block_count: 2,
            block_options: FrameOptions::new(),
            dictionary: None,
            codec: Arc::new(Lz4Block),
            cancellation: None,
            next_id: AtomicU64::new(2),
            stop: AtomicBool::new(false),
            outstanding: AtomicUsize::new(2),
            peak: AtomicUsize::new(2),
            permit_tx,
            permit_rx,
            failure: Mutex::new(None),
        };
        let (tx, rx) = bounded(2);
        tx.send(CompressionBuffer::new(1, vec![2; 20], 20)).unwrap();
        tx.send(CompressionBuffer::new(0, vec![1; 10], 10)).unwrap();
        drop(tx);

        let mut sink = OneWriteSink(Some(0));
        assert_eq!(shared.reassemble(&rx, &mut sink, 2), (1, 10));
        assert!(matches!(shared.take_failure(), Some(Error::Io(_))));
        assert_eq!(shared.outstanding.load(Ordering::Acquire), 0);
    }

    #[test]
    fn panic_payloads_become_messages() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&7u8), "unknown panic payload");
    }

    #[test]
    fn cancelled_before_start_writes_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let mut sink = Vec::new();
        let opts = ParallelOptions::new().with_parallelism(2).with_cancellation(token);
        let err = compress_parallel(&[0u8; 10], &mut sink, FrameOptions::new(), None, &opts).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(sink.is_empty());
    }
}
