#![no_main]
use std::io::Read;

use libfuzzer_sys::fuzz_target;
use lz4flow::{Decoder, FrameReader, OperationStatus};

fuzz_target!(|data: &[u8]| {
    // Errors are expected; panics and hangs are not.
    let _ = lz4flow::decompress(data);
    let _ = lz4flow::frame_info(data);

    let mut out = Vec::new();
    let _ = FrameReader::new(data).take(1 << 24).read_to_end(&mut out);

    let mut decoder = Decoder::new();
    let mut buf = vec![0u8; 977];
    let mut pos = 0;
    while pos < data.len() {
        let Ok(step) = decoder.decompress(&data[pos..], &mut buf) else {
            break;
        };
        pos += step.consumed;
        match step.status {
            OperationStatus::Done => {
                if decoder.reset().is_err() {
                    break;
                }
            }
            OperationStatus::InvalidData => break,
            OperationStatus::NeedMoreData if step.written == 0 => break,
            _ => {}
        }
    }
});
