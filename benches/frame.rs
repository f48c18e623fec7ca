//! Criterion benchmarks for one-shot, streamed and parallel frame compression.
//!
//! Run with:
//!   cargo bench --bench frame

use std::io::{Read, Write};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use lz4flow::{
    compress_parallel, compress_with, decompress, FrameOptions, FrameReader, FrameWriter,
    ParallelOptions,
};

/// Text-like, moderately compressible data.
fn corpus(size: usize) -> Vec<u8> {
    const WORDS: &[&str] = &[
        "frame ", "block ", "header ", "checksum ", "worker ", "queue ", "stream ", "buffer ",
        "reorder ", "encoder ", "decoder ", "window ",
    ];
    let mut out = Vec::with_capacity(size);
    let mut state = 0x9E37_79B9u32;
    while out.len() < size {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        out.extend_from_slice(WORDS[state as usize % WORDS.len()].as_bytes());
    }
    out.truncate(size);
    out
}

fn bench_one_shot(c: &mut Criterion) {
    let mut group = c.benchmark_group("one_shot");
    for &size in &[65_536usize, 1 << 20, 4 << 20] {
        let data = corpus(size);
        let frame = compress_with(&data, FrameOptions::new(), None).unwrap();
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("compress", size), &data, |b, data| {
            b.iter(|| compress_with(data, FrameOptions::new(), None).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("decompress", size), &frame, |b, frame| {
            b.iter(|| decompress(frame).unwrap())
        });
    }
    group.finish();
}

fn bench_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream");
    let data = corpus(4 << 20);
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("writer_16k_writes", |b| {
        b.iter(|| {
            let mut writer = FrameWriter::new(Vec::new(), FrameOptions::new());
            for chunk in data.chunks(16 * 1024) {
                writer.write_all(chunk).unwrap();
            }
            writer.finish().unwrap()
        })
    });
    let frame = compress_with(&data, FrameOptions::new(), None).unwrap();
    group.bench_function("reader_to_end", |b| {
        b.iter(|| {
            let mut out = Vec::with_capacity(data.len());
            FrameReader::new(&frame[..]).read_to_end(&mut out).unwrap();
            out
        })
    });
    group.finish();
}

fn bench_parallel(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel");
    group.sample_size(20);
    let data = corpus(32 << 20);
    group.throughput(Throughput::Bytes(data.len() as u64));
    for workers in [1usize, 2, 4, 8] {
        let opts = ParallelOptions::new().with_parallelism(workers);
        group.bench_with_input(BenchmarkId::new("compress", workers), &opts, |b, opts| {
            b.iter(|| {
                let mut sink = Vec::with_capacity(data.len());
                compress_parallel(&data, &mut sink, FrameOptions::new(), None, opts).unwrap();
                sink
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_one_shot, bench_stream, bench_parallel);
criterion_main!(benches);
