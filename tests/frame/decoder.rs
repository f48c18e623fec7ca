// Decoder status contracts over complete, truncated and split frames.

use lz4flow::{BlockMode, Decoder, Encoder, FrameOptions, OperationStatus};

fn text(len: usize) -> Vec<u8> {
    b"The decoder reports one status per call. "
        .iter()
        .cycle()
        .take(len)
        .copied()
        .collect()
}

fn frame_of(data: &[u8], options: FrameOptions) -> Vec<u8> {
    let mut enc = Encoder::new(options);
    let mut out = vec![0u8; enc.max_compressed_length(data.len(), true, true)];
    let mut n = enc.compress(data, &mut out).unwrap();
    n += enc.close(&mut out[n..]).unwrap();
    out.truncate(n);
    out
}

#[test]
fn one_byte_destination_reproduces_content() {
    let data = text(5000);
    let frame = frame_of(&data, FrameOptions::new());
    let mut dec = Decoder::new();
    let mut out = Vec::new();
    let mut pos = 0;
    let mut byte = [0u8; 1];
    let mut statuses = Vec::new();

    loop {
        let d = dec.decompress(&frame[pos..], &mut byte).unwrap();
        pos += d.consumed;
        out.extend_from_slice(&byte[..d.written]);
        statuses.push(d.status);
        if d.status == OperationStatus::Done {
            break;
        }
        assert!(statuses.len() <= data.len() + 2, "decoder stopped making progress");
    }

    assert_eq!(out, data);
    assert_eq!(pos, frame.len());
    let (last, rest) = statuses.split_last().unwrap();
    assert_eq!(*last, OperationStatus::Done);
    assert!(rest.iter().all(|s| *s == OperationStatus::DestinationTooSmall));
}

#[test]
fn truncated_prefixes_never_report_done() {
    let data = text(3000);
    for options in [
        FrameOptions::new(),
        FrameOptions::new().with_content_checksum(true).with_block_checksum(true),
        FrameOptions::new().with_content_size(3000),
    ] {
        let frame = frame_of(&data, options);
        for cut in 1..frame.len() {
            let mut dec = Decoder::new();
            let mut out = vec![0u8; 128 * 1024];
            let d = dec.decompress(&frame[..cut], &mut out).unwrap();
            assert_eq!(d.status, OperationStatus::NeedMoreData, "prefix of {cut} bytes");
            assert_eq!(d.consumed, cut);
            assert!(dec.is_mid_frame());
        }
    }
}

#[test]
fn split_input_decodes_identically() {
    let data = text(200_000);
    let frame = frame_of(&data, FrameOptions::new().with_block_checksum(true));
    for step in [1usize, 7, 4096, 65_539] {
        let mut dec = Decoder::new();
        let mut out = Vec::new();
        let mut buf = vec![0u8; 70_000];
        let mut pos = 0;
        loop {
            let end = (pos + step).min(frame.len());
            let d = dec.decompress(&frame[pos..end], &mut buf).unwrap();
            pos += d.consumed;
            out.extend_from_slice(&buf[..d.written]);
            if d.status == OperationStatus::Done {
                break;
            }
            assert_ne!(d.status, OperationStatus::InvalidData);
        }
        assert_eq!(out, data, "step {step}");
    }
}

#[test]
fn reset_allows_the_next_frame() {
    let mut stream = frame_of(b"first frame", FrameOptions::new());
    let first_len = stream.len();
    stream.extend(frame_of(b"second frame", FrameOptions::new()));

    let mut dec = Decoder::new();
    let mut out = [0u8; 64];
    let d = dec.decompress(&stream, &mut out).unwrap();
    assert_eq!(d.status, OperationStatus::Done);
    assert_eq!(d.consumed, first_len);
    assert_eq!(&out[..d.written], b"first frame");

    dec.reset().unwrap();
    let d = dec.decompress(&stream[first_len..], &mut out).unwrap();
    assert_eq!(d.status, OperationStatus::Done);
    assert_eq!(&out[..d.written], b"second frame");
}

#[test]
fn current_frame_info_after_header() {
    let frame = frame_of(
        &text(100),
        FrameOptions::new().with_block_mode(BlockMode::Independent),
    );
    let mut dec = Decoder::new();
    assert!(dec.current_frame_info().is_none());
    let mut out = [0u8; 8];
    dec.decompress(&frame[..7], &mut out).unwrap();
    let info = dec.current_frame_info().unwrap();
    assert_eq!(info.block_mode, BlockMode::Independent);
}

#[test]
fn corrupt_block_checksum_is_invalid_data() {
    let data = text(1000);
    let mut frame = frame_of(&data, FrameOptions::new().with_block_checksum(true));
    // Last byte of the only block checksum sits just before the end mark.
    let idx = frame.len() - 5;
    frame[idx] ^= 0xFF;
    let mut dec = Decoder::new();
    let mut out = vec![0u8; 4096];
    let d = dec.decompress(&frame, &mut out).unwrap();
    assert_eq!(d.status, OperationStatus::InvalidData);
    assert_eq!(dec.last_error(), Some(lz4flow::FrameError::BlockChecksumInvalid));
}

#[test]
fn filled_destination_at_end_of_input_needs_more_data() {
    let frame = frame_of(b"hello", FrameOptions::new());
    let body = &frame[..frame.len() - 4];
    let mut dec = Decoder::new();
    let mut out = [0u8; 5];
    let d = dec.decompress(body, &mut out).unwrap();
    assert_eq!(d.status, OperationStatus::NeedMoreData);
    assert_eq!((d.consumed, d.written), (body.len(), 5));
    assert_eq!(&out, b"hello");

    let d = dec.decompress(&frame[body.len()..], &mut out).unwrap();
    assert_eq!(d.status, OperationStatus::Done);
    assert_eq!(d.written, 0);
}

#[test]
fn empty_destination_with_staged_output_is_too_small() {
    let data = text(10_000);
    let frame = frame_of(&data, FrameOptions::new());
    let mut dec = Decoder::new();
    let mut small = [0u8; 10];
    let first = dec.decompress(&frame, &mut small).unwrap();
    assert_eq!(first.status, OperationStatus::DestinationTooSmall);

    let d = dec.decompress(&frame[first.consumed..], &mut []).unwrap();
    assert_eq!(d.status, OperationStatus::DestinationTooSmall);
    assert_eq!((d.consumed, d.written), (0, 0));

    let mut rest = vec![0u8; data.len()];
    let d = dec.decompress(&frame[first.consumed..], &mut rest).unwrap();
    assert_eq!(d.status, OperationStatus::Done);
    let mut out = small.to_vec();
    out.extend_from_slice(&rest[..d.written]);
    assert_eq!(out, data);
}
