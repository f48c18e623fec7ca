#![no_main]
use libfuzzer_sys::fuzz_target;
use lz4flow::{compress_parallel, BlockSizeId, FrameOptions, ParallelOptions};

fuzz_target!(|input: &[u8]| {
    let Some((&workers, data)) = input.split_first() else {
        return;
    };
    let opts = ParallelOptions::new().with_parallelism(usize::from(workers % 4) + 1);
    let frame = FrameOptions::new().with_block_size(BlockSizeId::Max64Kb);
    let mut sink = Vec::new();
    compress_parallel(data, &mut sink, frame, None, &opts).expect("parallel compression failed");
    assert_eq!(lz4flow::decompress(&sink).expect("own frame failed to decode"), data);
});
