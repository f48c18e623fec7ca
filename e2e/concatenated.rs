// Frames produced separately (and by different paths) read back as one stream.

use std::fs;
use std::io::{Read, Write};

use tempfile::NamedTempFile;

use lz4flow::{
    compress_parallel, compress_with, FrameOptions, FrameReader, FrameWriter, ParallelOptions,
};

#[test]
fn mixed_producers_in_one_file() {
    let mut file = NamedTempFile::new().unwrap();
    let part_a = vec![b'a'; 100_000];
    let part_b: Vec<u8> = (0..400_000u32).map(|i| (i % 7) as u8).collect();
    let part_c = b"written by the stream adapter".to_vec();

    file.write_all(&compress_with(&part_a, FrameOptions::new().with_content_checksum(true), None).unwrap())
        .unwrap();
    // skippable frame carrying metadata between the data frames
    file.write_all(&0x184D_2A5Eu32.to_le_bytes()).unwrap();
    file.write_all(&5u32.to_le_bytes()).unwrap();
    file.write_all(b"meta!").unwrap();
    compress_parallel(
        &part_b,
        file.as_file_mut(),
        FrameOptions::new(),
        None,
        &ParallelOptions::new().with_parallelism(3),
    )
    .unwrap();
    let mut writer = FrameWriter::new(file.as_file_mut(), FrameOptions::new());
    writer.write_all(&part_c).unwrap();
    writer.finish().unwrap();

    let mut expected = part_a;
    expected.extend_from_slice(&part_b);
    expected.extend_from_slice(&part_c);

    let mut out = Vec::new();
    FrameReader::new(fs::File::open(file.path()).unwrap())
        .read_to_end(&mut out)
        .unwrap();
    assert_eq!(out, expected);
}
