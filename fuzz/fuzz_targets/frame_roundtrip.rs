#![no_main]
use libfuzzer_sys::fuzz_target;
use lz4flow::{BlockMode, BlockSizeId, FrameOptions};

fuzz_target!(|input: &[u8]| {
    // First byte picks the options, the rest is the payload.
    let Some((&knobs, data)) = input.split_first() else {
        return;
    };
    let options = FrameOptions::new()
        .with_block_size(if knobs & 1 != 0 { BlockSizeId::Max256Kb } else { BlockSizeId::Max64Kb })
        .with_block_mode(if knobs & 2 != 0 { BlockMode::Independent } else { BlockMode::Linked })
        .with_content_checksum(knobs & 4 != 0)
        .with_block_checksum(knobs & 8 != 0)
        .with_auto_flush(knobs & 16 != 0);

    let compressed = lz4flow::compress_with(data, options, None).expect("compression failed");
    let recovered = lz4flow::decompress(&compressed).expect("own frame failed to decode");
    assert_eq!(recovered, data);
});
