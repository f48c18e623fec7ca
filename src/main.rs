//! Binary entry point for the `lz4flow` command-line tool.
//!
//! Compresses (default), decompresses (`-d`) or lists (`-l`) LZ4 frames.
//! Reads stdin and writes stdout when paths are omitted or given as `-`.
//! With `-T N` (N > 1, or 0 for one worker per CPU) compression runs through
//! the parallel orchestrator, which needs the whole input in memory.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use lz4flow::config::{init_c_level, CLEVEL_DEFAULT, STREAM_BUFFER_SIZE};
use lz4flow::frame::header::{header_size, parse_frame_header, read_le32};
use lz4flow::frame::types::{BF_SIZE, BH_SIZE, BLOCK_UNCOMPRESSED_FLAG};
use lz4flow::{
    compress_parallel, BlockChecksum, BlockMode, BlockSizeId, ContentChecksum, FrameOptions,
    FrameReader, FrameType, FrameWriter, ParallelOptions,
};

const STDIO_MARK: &str = "-";

#[derive(Parser, Debug)]
#[command(name = "lz4flow", version, about = "Compress or decompress LZ4 frames")]
struct Cli {
    /// Decompress
    #[arg(short = 'd', long, conflicts_with = "list")]
    decompress: bool,

    /// List frames in a compressed input
    #[arg(short = 'l', long)]
    list: bool,

    /// Compression workers; 0 uses one per CPU
    #[arg(short = 'T', long = "threads", value_name = "N")]
    threads: Option<usize>,

    /// Block size id: 4 = 64 KB, 5 = 256 KB, 6 = 1 MB, 7 = 4 MB
    #[arg(short = 'B', long = "block-size", value_name = "ID",
          value_parser = clap::value_parser!(u8).range(4..=7))]
    block_size: Option<u8>,

    /// Compression level. Accepted for compatibility only: the built-in LZ4
    /// codec has a single mode, so the level does not change the output
    #[arg(long = "level", value_name = "N", allow_hyphen_values = true)]
    level: Option<i32>,

    /// Append an XXH32 of the whole content
    #[arg(long)]
    content_checksum: bool,

    /// Append an XXH32 after every block
    #[arg(long)]
    block_checksum: bool,

    /// Compress every block on its own
    #[arg(long)]
    independent: bool,

    /// More output on stderr; repeat for more
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,

    input: Option<PathBuf>,
    output: Option<PathBuf>,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn open_input(path: Option<&Path>) -> Result<Box<dyn Read>> {
    match path {
        Some(path) if path.as_os_str() != STDIO_MARK => {
            let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
            Ok(Box::new(BufReader::with_capacity(STREAM_BUFFER_SIZE, file)))
        }
        _ => Ok(Box::new(io::stdin().lock())),
    }
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) if path.as_os_str() != STDIO_MARK => {
            let file =
                File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
            Ok(Box::new(BufWriter::with_capacity(STREAM_BUFFER_SIZE, file)))
        }
        _ => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
    }
}

fn frame_options(cli: &Cli) -> FrameOptions {
    let level = cli.level.unwrap_or_else(init_c_level);
    if level != CLEVEL_DEFAULT {
        warn!(level, "the built-in LZ4 codec has a single mode; compression level ignored");
    }
    let mut options = FrameOptions::new()
        .with_content_checksum(cli.content_checksum)
        .with_block_checksum(cli.block_checksum)
        .with_compression_level(level);
    if let Some(id) = cli.block_size.and_then(BlockSizeId::from_raw) {
        options = options.with_block_size(id);
    }
    if cli.independent {
        options = options.with_block_mode(BlockMode::Independent);
    }
    options
}

fn compress(cli: &Cli) -> Result<()> {
    let options = frame_options(cli);
    let mut input = open_input(cli.input.as_deref())?;
    let mut output = open_output(cli.output.as_deref())?;

    match cli.threads {
        Some(threads) if threads != 1 => {
            let mut source = Vec::new();
            input.read_to_end(&mut source).context("cannot read input")?;
            let parallel = ParallelOptions {
                parallelism: (threads > 0).then_some(threads),
                ..ParallelOptions::default()
            };
            let summary = compress_parallel(&source, &mut *output, options, None, &parallel)
                .context("parallel compression failed")?;
            info!(
                workers = summary.workers,
                blocks = summary.block_count,
                bytes_in = summary.bytes_in,
                bytes_out = summary.bytes_out,
                "compressed"
            );
        }
        _ => {
            let mut writer = FrameWriter::new(&mut output, options);
            let copied = io::copy(&mut input, &mut writer).context("compression failed")?;
            writer.finish().context("cannot finish frame")?;
            info!(bytes_in = copied, "compressed");
        }
    }
    output.flush().context("cannot flush output")?;
    Ok(())
}

fn decompress(cli: &Cli) -> Result<()> {
    let input = open_input(cli.input.as_deref())?;
    let mut output = open_output(cli.output.as_deref())?;
    let mut reader = FrameReader::new(input);
    let copied = io::copy(&mut reader, &mut output).context("decompression failed")?;
    output.flush().context("cannot flush output")?;
    info!(bytes_out = copied, "decompressed");
    Ok(())
}

fn block_size_label(id: BlockSizeId) -> &'static str {
    match id.resolve() {
        BlockSizeId::Max256Kb => "256K",
        BlockSizeId::Max1Mb => "1M",
        BlockSizeId::Max4Mb => "4M",
        _ => "64K",
    }
}

/// Walk the frames of `src`, one line each.
fn list_frames(src: &[u8], out: &mut dyn Write) -> Result<()> {
    writeln!(out, "{:>6} {:>10} {:>6} {:>11} {:>10} {:>12} {:>12}",
        "Frame", "Type", "Block", "Mode", "Checksum", "Compressed", "Content")?;
    let mut pos = 0;
    let mut index = 1;
    while pos < src.len() {
        let info = parse_frame_header(&src[pos..])
            .map_err(|e| anyhow::anyhow!("frame {index} at offset {pos}: {}", e.error_name()))?;
        let start = pos;

        if info.frame_type == FrameType::SkippableFrame {
            pos += 8 + info.content_size as usize;
            if pos > src.len() {
                bail!("frame {index}: skippable frame runs past end of input");
            }
            writeln!(out, "{:>6} {:>10} {:>6} {:>11} {:>10} {:>12} {:>12}",
                index, "Skippable", "-", "-", "-", pos - start, "-")?;
            index += 1;
            continue;
        }

        pos += header_size(&src[pos..]).map_err(|e| anyhow::anyhow!(e.error_name()))?;
        let block_crc = if info.block_checksum_flag == BlockChecksum::Enabled { BF_SIZE } else { 0 };
        loop {
            if pos + BH_SIZE > src.len() {
                bail!("frame {index}: truncated");
            }
            let header = read_le32(src, pos);
            pos += BH_SIZE;
            if header == 0 {
                break;
            }
            pos += (header & !BLOCK_UNCOMPRESSED_FLAG) as usize + block_crc;
        }
        if info.content_checksum_flag == ContentChecksum::Enabled {
            pos += BF_SIZE;
        }
        if pos > src.len() {
            bail!("frame {index}: truncated");
        }

        let mode = match info.block_mode {
            BlockMode::Linked => "linked",
            BlockMode::Independent => "independent",
        };
        let checksum = match (info.content_checksum_flag, info.block_checksum_flag) {
            (ContentChecksum::Enabled, BlockChecksum::Enabled) => "both",
            (ContentChecksum::Enabled, _) => "content",
            (_, BlockChecksum::Enabled) => "block",
            _ => "none",
        };
        let content = if info.content_size == 0 {
            "-".to_string()
        } else {
            info.content_size.to_string()
        };
        writeln!(out, "{:>6} {:>10} {:>6} {:>11} {:>10} {:>12} {:>12}",
            index, "LZ4Frame", block_size_label(info.block_size_id), mode, checksum, pos - start, content)?;
        index += 1;
    }
    Ok(())
}

fn list(cli: &Cli) -> Result<()> {
    let mut input = open_input(cli.input.as_deref())?;
    let mut src = Vec::new();
    input.read_to_end(&mut src).context("cannot read input")?;
    let mut output = open_output(cli.output.as_deref())?;
    list_frames(&src, &mut output)?;
    output.flush()?;
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    debug!(?cli, "parsed arguments");
    if cli.list {
        list(cli)
    } else if cli.decompress {
        decompress(cli)
    } else {
        compress(cli)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("lz4flow: {err:#}");
            ExitCode::FAILURE
        }
    }
}
