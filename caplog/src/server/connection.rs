//! Per-connection reader task
//!
//! Owns the connection's [`FrameParser`] and raw dump. Bytes are dumped
//! exactly as received before decoding, so `raw/<source>.bin` can be replayed
//! in file mode.

use super::worker::FrameRouter;
use crate::ingest::FrameParser;
use crate::output::SourceSummary;
use log::{debug, info, warn};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio::sync::watch;

const READ_CHUNK: usize = 64 * 1024;

/// Read `stream` until the peer closes it or `stop` fires.
pub async fn read_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    dump_path: PathBuf,
    mut router: FrameRouter,
    mut stop: watch::Receiver<bool>,
) -> SourceSummary {
    let source = router.source();
    let mut dump = match File::create(&dump_path).await {
        Ok(file) => Some(BufWriter::new(file)),
        Err(e) => {
            warn!("Cannot create raw dump {}: {e}", dump_path.display());
            None
        }
    };
    let mut parser = FrameParser::new();
    let mut buf = vec![0u8; READ_CHUNK];
    let mut bytes = 0u64;
    let mut workers_alive = true;

    while workers_alive {
        // bytes the peer already sent are read before a stop is honored
        let read = tokio::select! {
            biased;
            read = stream.read(&mut buf) => read,
            _ = stop.changed() => {
                debug!("{source} stopped by shutdown");
                break;
            }
        };
        let n = match read {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!("{source} ({peer}) read failed: {e}");
                break;
            }
        };
        bytes += n as u64;

        if let Some(writer) = dump.as_mut() {
            if let Err(e) = writer.write_all(&buf[..n]).await {
                warn!("Raw dump of {source} stopped: {e}");
                dump = None;
            }
        }
        workers_alive = parser.push(&buf[..n]).into_iter().all(|frame| router.route(frame));
    }

    if workers_alive {
        for frame in parser.finish() {
            router.route(frame);
        }
    }
    if let Some(mut writer) = dump {
        if let Err(e) = writer.flush().await {
            warn!("Failed to flush raw dump of {source}: {e}");
        }
    }

    let stats = parser.stats();
    info!("{source} ({peer}) closed: {bytes} bytes, {} frames", stats.frames);
    let lines = router.last_line() as u64;
    router.close();
    SourceSummary { source, name: peer.to_string(), bytes, lines, frames: Some(stats) }
}
