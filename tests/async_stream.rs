// Async adapters must behave exactly like the blocking ones.
#![cfg(feature = "async")]

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};

use lz4flow::{compress, decompress, AsyncFrameReader, AsyncFrameWriter, FrameOptions};

fn sample(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8 ^ (i >> 10) as u8).collect()
}

#[tokio::test(flavor = "current_thread")]
async fn async_writer_output_decodes() {
    let data = sample(300_000);
    let mut writer = AsyncFrameWriter::new(Vec::new(), FrameOptions::new());
    for chunk in data.chunks(7_000) {
        assert_eq!(writer.write(chunk).await.unwrap(), chunk.len());
    }
    writer.shutdown().await.unwrap();
    let compressed = writer.into_inner();
    assert_eq!(decompress(&compressed).unwrap(), data);
}

#[tokio::test(flavor = "current_thread")]
async fn async_reader_decodes_concatenated_frames() {
    let mut stream = compress(&sample(100_000)).unwrap();
    stream.extend(compress(b"tail").unwrap());
    let mut expected = sample(100_000);
    expected.extend_from_slice(b"tail");

    let mut reader = AsyncFrameReader::new(&stream[..]);
    let mut out = Vec::new();
    reader.read_to_end(&mut out).await.unwrap();
    assert_eq!(out, expected);
}

#[tokio::test(flavor = "current_thread")]
async fn async_round_trip_through_duplex() {
    let data = sample(200_000);
    let (client, server) = tokio::io::duplex(4096);

    let producer = async {
        let mut writer = AsyncFrameWriter::new(client, FrameOptions::new().with_block_checksum(true));
        writer.write_all(&data).await.unwrap();
        writer.shutdown().await.unwrap();
    };
    let consumer = async {
        let mut reader = AsyncFrameReader::new(server);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        out
    };
    let ((), out) = tokio::join!(producer, consumer);
    assert_eq!(out, data);
}

#[tokio::test(flavor = "current_thread")]
async fn async_truncation_is_unexpected_eof() {
    let frame = compress(&sample(5_000)).unwrap();
    let mut reader = AsyncFrameReader::new(&frame[..frame.len() - 2]);
    let mut out = Vec::new();
    let err = reader.read_to_end(&mut out).await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
}

#[tokio::test(flavor = "current_thread")]
async fn empty_async_writer_emits_a_frame() {
    let mut writer = AsyncFrameWriter::new(Vec::new(), FrameOptions::new());
    writer.finish().await.unwrap();
    writer.finish().await.unwrap();
    assert_eq!(decompress(writer.get_ref()).unwrap(), Vec::<u8>::new());
}

#[tokio::test(flavor = "current_thread")]
async fn tokio_copy_round_trip() {
    let data = sample(500_000);
    let mut writer = AsyncFrameWriter::new(Vec::new(), FrameOptions::new().with_content_checksum(true));
    let copied = tokio::io::copy(&mut &data[..], &mut writer).await.unwrap();
    assert_eq!(copied, data.len() as u64);
    writer.shutdown().await.unwrap();
    let compressed = writer.into_inner();

    let mut reader = AsyncFrameReader::new(&compressed[..]);
    let mut out = Vec::new();
    let copied = tokio::io::copy(&mut reader, &mut out).await.unwrap();
    assert_eq!(copied, data.len() as u64);
    assert_eq!(out, data);
}

#[tokio::test(flavor = "current_thread")]
async fn reader_composes_with_buf_reader() {
    let text = "first line\nsecond line\nthird line\n".repeat(500);
    let compressed = compress(text.as_bytes()).unwrap();
    let mut lines = BufReader::new(AsyncFrameReader::new(&compressed[..])).lines();
    let mut count = 0;
    while let Some(line) = lines.next_line().await.unwrap() {
        assert!(line.ends_with(" line"));
        count += 1;
    }
    assert_eq!(count, 1500);
}

#[tokio::test(flavor = "current_thread")]
async fn flush_pushes_a_partial_block_through_a_narrow_pipe() {
    let (client, server) = tokio::io::duplex(64);
    let writer = AsyncFrameWriter::new(client, FrameOptions::new());
    let mut reader = AsyncFrameReader::new(server);

    let producer = async move {
        let mut writer = writer;
        writer.write_all(b"latency matters").await.unwrap();
        writer.flush().await.unwrap();
        writer
    };
    let consumer = async {
        let mut got = [0u8; 15];
        reader.read_exact(&mut got).await.unwrap();
        got
    };
    let (mut writer, got) = tokio::join!(producer, consumer);
    assert_eq!(&got, b"latency matters");
    writer.shutdown().await.unwrap();
}
