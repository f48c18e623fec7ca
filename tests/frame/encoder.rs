// Encoder lifecycle: header emission, flushing, closing and reuse.

use lz4flow::frame::types::{BH_SIZE, MIN_FH_SIZE};
use lz4flow::{
    decompress, decompress_with, BlockMode, BlockSizeId, CompressionDictionary, Encoder, Error,
    FrameOptions,
};

fn collect_frame(enc: &mut Encoder, parts: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for part in parts {
        let mut buf = vec![0u8; enc.max_compressed_length(part.len(), true, false)];
        let n = enc.compress(part, &mut buf).unwrap();
        out.extend_from_slice(&buf[..n]);
    }
    let mut buf = vec![0u8; enc.max_compressed_length(0, true, true)];
    let n = enc.close(&mut buf).unwrap();
    out.extend_from_slice(&buf[..n]);
    out
}

#[test]
fn ten_byte_input_round_trips_with_only_framing_overhead() {
    let mut enc = Encoder::default();
    let frame = collect_frame(&mut enc, &[b"aaaaaaaaaa"]);
    assert_eq!(decompress(&frame).unwrap(), b"aaaaaaaaaa");
    assert!(frame.len() > 10);
    // Too short to compress: stored raw.
    assert_eq!(
        frame.len(),
        enc.actual_frame_header_length() + BH_SIZE + 10 + enc.actual_frame_footer_length()
    );
}

#[test]
fn header_goes_out_with_the_first_compress() {
    let mut enc = Encoder::default();
    let mut buf = vec![0u8; enc.max_compressed_length(3, true, false)];
    let n = enc.compress(b"abc", &mut buf).unwrap();
    assert_eq!(n, MIN_FH_SIZE);
    assert!(enc.is_header_written());
    let n = enc.compress(b"def", &mut buf).unwrap();
    assert_eq!(n, 0, "partial blocks stay buffered");
}

#[test]
fn flush_emits_the_partial_block() {
    let mut enc = Encoder::default();
    let mut buf = vec![0u8; 1024];
    enc.compress(b"pending", &mut buf).unwrap();
    let n = enc.flush(&mut buf).unwrap();
    assert_eq!(n, BH_SIZE + 7);
    assert_eq!(enc.flush(&mut buf).unwrap(), 0);
}

#[test]
fn many_small_writes_round_trip() {
    let data: Vec<u8> = (0..300_000u32).map(|i| (i * 7 % 253) as u8).collect();
    let parts: Vec<&[u8]> = data.chunks(1_234).collect();
    let mut enc = Encoder::new(FrameOptions::new().with_content_checksum(true));
    let frame = collect_frame(&mut enc, &parts);
    assert_eq!(decompress(&frame).unwrap(), data);
}

#[test]
fn auto_flush_emits_every_write() {
    let mut enc = Encoder::new(FrameOptions::new().with_auto_flush(true));
    let mut buf = vec![0u8; 1024];
    let n = enc.compress(b"0123456789", &mut buf).unwrap();
    assert_eq!(n, MIN_FH_SIZE + BH_SIZE + 10);
}

#[test]
fn encoder_reuse_produces_independent_frames() {
    let mut enc = Encoder::default();
    let mut stream = collect_frame(&mut enc, &[b"one"]);
    stream.extend(collect_frame(&mut enc, &[b"two"]));
    assert_eq!(decompress(&stream).unwrap(), b"onetwo");
}

#[test]
fn close_twice_is_usage_error() {
    let mut enc = Encoder::default();
    collect_frame(&mut enc, &[b"x"]);
    let mut buf = vec![0u8; 64];
    assert!(matches!(enc.close(&mut buf), Err(Error::Usage(_))));
}

#[test]
fn linked_blocks_with_dictionary() {
    let dict_bytes: Vec<u8> = b"shared vocabulary for every message; "
        .iter()
        .cycle()
        .take(10_000)
        .copied()
        .collect();
    let dict = CompressionDictionary::new(77, dict_bytes);
    let data: Vec<u8> = b"shared vocabulary, then something new. "
        .iter()
        .cycle()
        .take(200_000)
        .copied()
        .collect();
    let options = FrameOptions::new()
        .with_block_size(BlockSizeId::Max64Kb)
        .with_block_mode(BlockMode::Linked);
    let mut enc = Encoder::new(options).with_dictionary(dict.clone());
    let frame = collect_frame(&mut enc, &[&data]);
    assert_eq!(decompress_with(&frame, Some(&dict)).unwrap(), data);
}

#[test]
fn suppressed_header_writes_blocks_only() {
    let mut enc = Encoder::new(FrameOptions::new().with_auto_flush(true)).without_header();
    assert!(!enc.is_write_header());
    let mut buf = vec![0u8; 1024];
    let n = enc.compress(b"body", &mut buf).unwrap();
    assert_eq!(n, BH_SIZE + 4);
    enc.set_write_header(true);
    assert!(enc.is_write_header());
}
