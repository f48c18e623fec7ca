// Black-box tests of the `lz4flow` binary.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tempfile::TempDir;

fn bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_lz4flow"))
}

fn make_input(len: usize) -> (TempDir, PathBuf, Vec<u8>) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("input.txt");
    let content: Vec<u8> = "Streaming LZ4 frames, line after line.\n"
        .bytes()
        .cycle()
        .take(len)
        .collect();
    fs::write(&path, &content).unwrap();
    (dir, path, content)
}

fn run(args: &[&std::ffi::OsStr]) -> std::process::Output {
    Command::new(bin()).args(args).output().unwrap()
}

#[test]
fn compress_then_decompress_files() {
    let (dir, input, content) = make_input(300_000);
    let packed = dir.path().join("input.lz4");
    let unpacked = dir.path().join("output.txt");

    let out = run(&[input.as_os_str(), packed.as_os_str()]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(fs::metadata(&packed).unwrap().len() < content.len() as u64);

    let out = run(&["-d".as_ref(), packed.as_os_str(), unpacked.as_os_str()]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(fs::read(&unpacked).unwrap(), content);
}

#[test]
fn parallel_compression_output_is_a_normal_frame() {
    let (dir, input, content) = make_input(3_000_000);
    let packed = dir.path().join("input.lz4");
    let out = run(&["-T".as_ref(), "4".as_ref(), input.as_os_str(), packed.as_os_str()]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(lz4flow::decompress(&fs::read(&packed).unwrap()).unwrap(), content);
}

#[test]
fn parallel_with_content_checksum_fails() {
    let (dir, input, _) = make_input(1000);
    let packed = dir.path().join("input.lz4");
    let out = run(&[
        "-T".as_ref(),
        "4".as_ref(),
        "--content-checksum".as_ref(),
        input.as_os_str(),
        packed.as_os_str(),
    ]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("usage error"));
}

#[test]
fn stdin_to_stdout() {
    let mut child = Command::new(bin())
        .args(["--block-checksum", "-B", "5"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"piped through the binary")
        .unwrap();
    let out = child.wait_with_output().unwrap();
    assert!(out.status.success());
    let info = lz4flow::frame_info(&out.stdout).unwrap();
    assert_eq!(info.block_size_id, lz4flow::BlockSizeId::Max256Kb);
    assert_eq!(lz4flow::decompress(&out.stdout).unwrap(), b"piped through the binary");
}

#[test]
fn list_mode_prints_one_line_per_frame() {
    let dir = TempDir::new().unwrap();
    let packed = dir.path().join("two.lz4");
    let mut stream = lz4flow::compress(b"first").unwrap();
    stream.extend(lz4flow::compress(b"second").unwrap());
    fs::write(&packed, &stream).unwrap();

    let out = run(&["-l".as_ref(), packed.as_os_str()]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let text = String::from_utf8(out.stdout).unwrap();
    assert_eq!(text.lines().count(), 3);
    assert_eq!(text.matches("LZ4Frame").count(), 2);
}

#[test]
fn corrupt_input_fails_cleanly() {
    let dir = TempDir::new().unwrap();
    let bad = dir.path().join("bad.lz4");
    fs::write(&bad, b"this is not lz4 at all").unwrap();
    let out = run(&["-d".as_ref(), bad.as_os_str(), dir.path().join("out").as_os_str()]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("malformed"));
}

#[test]
fn invalid_block_size_is_rejected_by_the_parser() {
    let out = run(&["-B".as_ref(), "9".as_ref()]);
    assert!(!out.status.success());
}

#[test]
fn level_does_not_change_the_output_and_says_so() {
    let (dir, input, _) = make_input(200_000);
    let plain = dir.path().join("plain.lz4");
    let leveled = dir.path().join("leveled.lz4");

    let out = Command::new(bin())
        .env_remove("LZ4FLOW_CLEVEL")
        .args([input.as_os_str(), plain.as_os_str()])
        .output()
        .unwrap();
    assert!(out.status.success());
    let out = Command::new(bin())
        .env_remove("LZ4FLOW_CLEVEL")
        .args(["--level".as_ref(), "9".as_ref(), input.as_os_str(), leveled.as_os_str()])
        .output()
        .unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("compression level ignored"));
    assert_eq!(fs::read(&plain).unwrap(), fs::read(&leveled).unwrap());
}
