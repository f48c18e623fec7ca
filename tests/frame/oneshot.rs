// One-shot compress / decompress, concatenated and skippable frames.

use lz4flow::{
    compress, compress_into, compress_with, decompress, max_compressed_length, BlockMode,
    BlockSizeId, Error, FrameError, FrameOptions,
};

fn skippable(magic_nibble: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(0x184D_2A50 | magic_nibble).to_le_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

#[test]
fn round_trip_sizes() {
    for len in [0usize, 1, 13, 65_535, 65_536, 65_537, 1_000_000] {
        let data: Vec<u8> = (0..len).map(|i| (i % 97) as u8 ^ (i / 4096) as u8).collect();
        let frame = compress(&data).unwrap();
        assert!(frame.len() <= max_compressed_length(len, &FrameOptions::new()));
        assert_eq!(decompress(&frame).unwrap(), data, "len {len}");
    }
}

#[test]
fn concatenated_frames_decode_in_order() {
    let mut stream = compress(b"alpha ").unwrap();
    stream.extend(compress_with(b"beta ", FrameOptions::new().with_content_checksum(true), None).unwrap());
    stream.extend(compress(b"gamma").unwrap());
    assert_eq!(decompress(&stream).unwrap(), b"alpha beta gamma");
}

#[test]
fn skippable_frames_are_ignored() {
    let mut stream = skippable(0, b"metadata");
    stream.extend(compress(b"payload").unwrap());
    stream.extend(skippable(0xF, &[]));
    stream.extend(skippable(3, &[0xAA; 1000]));
    assert_eq!(decompress(&stream).unwrap(), b"payload");
}

#[test]
fn truncated_skippable_frame_is_truncation() {
    let stream = skippable(1, b"0123456789");
    assert!(matches!(decompress(&stream[..12]), Err(Error::TruncatedStream)));
}

#[test]
fn trailing_garbage_is_malformed() {
    let mut stream = compress(b"fine").unwrap();
    stream.extend_from_slice(b"not a frame");
    assert!(matches!(
        decompress(&stream),
        Err(Error::MalformedStream(FrameError::FrameTypeUnknown))
    ));
}

#[test]
fn content_checksum_mismatch_is_malformed() {
    let mut frame =
        compress_with(b"checked content", FrameOptions::new().with_content_checksum(true), None)
            .unwrap();
    let last = frame.len() - 1;
    frame[last] ^= 0x55;
    assert!(matches!(
        decompress(&frame),
        Err(Error::MalformedStream(FrameError::ContentChecksumInvalid))
    ));
}

#[test]
fn compress_into_exact_bound() {
    let data = vec![9u8; 70_000];
    let options = FrameOptions::new()
        .with_block_size(BlockSizeId::Max64Kb)
        .with_block_mode(BlockMode::Linked);
    let mut dst = vec![0u8; max_compressed_length(data.len(), &options)];
    let n = compress_into(&data, &mut dst, options, None).unwrap();
    assert_eq!(decompress(&dst[..n]).unwrap(), data);
}
