// Byte layout of produced frames and header inspection.

use lz4flow::frame::header::{header_checksum, read_le32};
use lz4flow::frame::types::{BLOCK_UNCOMPRESSED_FLAG, MAGIC_NUMBER};
use lz4flow::{
    compress_with, frame_info, BlockChecksum, BlockMode, BlockSizeId, ContentChecksum, Decoder,
    Encoder, Error, FrameError, FrameOptions, FrameType,
};

fn empty_frame(options: FrameOptions) -> Vec<u8> {
    let mut enc = Encoder::new(options);
    let mut out = vec![0u8; enc.max_compressed_length(0, true, true)];
    let n = enc.close(&mut out).unwrap();
    out.truncate(n);
    out
}

#[test]
fn default_header_bytes() {
    let frame = empty_frame(FrameOptions::new());
    assert_eq!(read_le32(&frame, 0), MAGIC_NUMBER);
    assert_eq!(frame[4], 0x40, "version 01, linked, no optional fields");
    assert_eq!(frame[5], 0x40, "64 KB blocks");
    assert_eq!(frame[6], header_checksum(&frame[4..6]));
    assert_eq!(&frame[7..], &[0, 0, 0, 0]);
}

#[test]
fn flags_follow_options() {
    let frame = empty_frame(
        FrameOptions::new()
            .with_block_mode(BlockMode::Independent)
            .with_block_checksum(true)
            .with_content_checksum(true)
            .with_block_size(BlockSizeId::Max4Mb)
            .with_dictionary_id(0x0102_0304),
    );
    assert_eq!(frame[4], 0x40 | 0x20 | 0x10 | 0x04 | 0x01);
    assert_eq!(frame[5], 0x70);
    assert_eq!(read_le32(&frame, 6), 0x0102_0304);
    assert_eq!(frame[10], header_checksum(&frame[4..10]));
    // end mark plus the checksum of no content
    assert_eq!(frame.len(), 11 + 8);
    assert_eq!(read_le32(&frame, 11), 0);
    assert_eq!(read_le32(&frame, 15), xxhash_rust::xxh32::xxh32(&[], 0));
}

#[test]
fn incompressible_block_is_stored_raw() {
    let mut state = 0x1234_5678u32;
    let noise: Vec<u8> = (0..4096)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect();
    let frame = compress_with(&noise, FrameOptions::new(), None).unwrap();
    let header_len = Decoder::header_size(&frame).unwrap();
    let bh = read_le32(&frame, header_len);
    assert_ne!(bh & BLOCK_UNCOMPRESSED_FLAG, 0);
    assert_eq!((bh & !BLOCK_UNCOMPRESSED_FLAG) as usize, noise.len());
    assert_eq!(&frame[header_len + 4..header_len + 4 + noise.len()], &noise[..]);
}

#[test]
fn frame_info_reads_every_field() {
    let options = FrameOptions::new()
        .with_content_checksum(true)
        .with_block_checksum(true)
        .with_dictionary_id(9);
    let frame = compress_with(&[1u8; 500], options, None).unwrap();
    let info = frame_info(&frame).unwrap();
    assert_eq!(info.frame_type, FrameType::Frame);
    assert_eq!(info.content_size, 500);
    assert_eq!(info.dict_id, 9);
    assert_eq!(info.content_checksum_flag, ContentChecksum::Enabled);
    assert_eq!(info.block_checksum_flag, BlockChecksum::Enabled);
    assert_eq!(info.block_size_id, BlockSizeId::Max64Kb);
}

#[test]
fn header_size_needs_five_bytes() {
    let frame = compress_with(b"x", FrameOptions::new(), None).unwrap();
    assert_eq!(Decoder::header_size(&frame[..5]).unwrap(), 15);
    assert!(matches!(Decoder::header_size(&frame[..4]), Err(Error::TruncatedStream)));
    assert!(frame_info(&frame[..4]).is_none());
}

#[test]
fn corrupted_header_checksum_is_rejected() {
    let mut frame = empty_frame(FrameOptions::new());
    frame[6] ^= 0x01;
    assert!(matches!(
        Decoder::frame_info(&frame),
        Err(Error::MalformedStream(FrameError::HeaderChecksumInvalid))
    ));
}

#[test]
fn skippable_header_reports_payload_length() {
    let mut frame = Vec::new();
    frame.extend_from_slice(&0x184D_2A53u32.to_le_bytes());
    frame.extend_from_slice(&3u32.to_le_bytes());
    frame.extend_from_slice(b"xyz");
    assert_eq!(Decoder::header_size(&frame).unwrap(), 8);
    let info = frame_info(&frame).unwrap();
    assert_eq!(info.frame_type, FrameType::SkippableFrame);
    assert_eq!(info.content_size, 3);
}
