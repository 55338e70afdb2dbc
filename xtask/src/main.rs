use anyhow::{Context, Result};
use caplog_common::{encode_blob_frame, encode_text_frame, fragment_line, CAPLOG_PREFIX, CHANNEL_ANCHOR, DEFAULT_PORT};
use clap::Parser;
use std::io::Write;
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Parser)]
enum Cmd {
    /// Replay a text log to a running collector as framed bytes
    Send {
        log: PathBuf,
        #[arg(long, default_value_t = format!("127.0.0.1:{DEFAULT_PORT}"))]
        addr: String,
        /// Split records longer than this into concat fragments
        #[arg(long)]
        limit: Option<usize>,
        /// Files to attach as binary frames after the log
        #[arg(long)]
        blob: Vec<PathBuf>,
        /// Pause between frames
        #[arg(long, default_value = "0")]
        delay_ms: u64,
    },
    /// Convert a text log into a raw frame dump for file mode
    Frame {
        log: PathBuf,
        output: PathBuf,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        blob: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Cmd::Send { log, addr, limit, blob, delay_ms } => {
            send(&log, &addr, limit, &blob, Duration::from_millis(delay_ms))?;
        }
        Cmd::Frame { log, output, limit, blob } => frame(&log, &output, limit, &blob)?,
    }

    Ok(())
}

fn send(log: &Path, addr: &str, limit: Option<usize>, blobs: &[PathBuf], delay: Duration) -> Result<()> {
    let frames = encode_log(log, limit, blobs)?;
    let mut stream = TcpStream::connect(addr).with_context(|| format!("Failed to connect to {addr}"))?;

    let mut bytes = 0;
    for frame in &frames {
        stream.write_all(frame).context("Connection closed by collector")?;
        bytes += frame.len();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
    stream.flush()?;

    println!("✓ Sent {} frames ({bytes} bytes) to {addr}", frames.len());
    Ok(())
}

fn frame(log: &Path, output: &Path, limit: Option<usize>, blobs: &[PathBuf]) -> Result<()> {
    let frames = encode_log(log, limit, blobs)?;
    let bytes: Vec<u8> = frames.concat();
    std::fs::write(output, &bytes).with_context(|| format!("Failed to write {}", output.display()))?;

    println!("✓ Wrote {} frames ({} bytes)", frames.len(), bytes.len());
    println!("  Replay with: caplog {}", output.display());
    Ok(())
}

/// One text frame per log line (fragmented when over `limit`), then one
/// binary frame per attachment.
fn encode_log(log: &Path, limit: Option<usize>, blobs: &[PathBuf]) -> Result<Vec<Vec<u8>>> {
    let text = std::fs::read_to_string(log).with_context(|| format!("Failed to read {}", log.display()))?;
    let mut frames = Vec::new();

    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        match (limit, split_record(line)) {
            (Some(limit), Some((prefix, body))) if line.chars().count() > limit => {
                frames.extend(fragment_line(prefix, body, limit).iter().map(|f| encode_text_frame(f)));
            }
            _ => frames.push(encode_text_frame(line)),
        }
    }

    for path in blobs {
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path.file_name().map_or_else(|| "blob".into(), |n| n.to_string_lossy());
        frames.push(encode_blob_frame(&name, &bytes));
    }

    Ok(frames)
}

/// `CAP_LOG : P=.. T=.. C=NNN ` and the rest of a scope/message record
fn split_record(line: &str) -> Option<(&str, &str)> {
    let start = line.find(CAPLOG_PREFIX)?;
    let channel = line[start..].find(CHANNEL_ANCHOR)? + start + CHANNEL_ANCHOR.len();
    let end = line[channel..].find(' ')? + channel + 1;
    Some((&line[start..end], &line[end..]))
}
