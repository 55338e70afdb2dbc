//! # Ingest Server
//!
//! ```text
//!            accept loop (tokio)
//!                  │ one task per connection
//!                  ▼
//!   ┌──────────────────────────────┐
//!   │ reader: raw dump, FrameParser │──▶ text channel ──▶ text worker
//!   └──────────────────────────────┘──▶ blob channel ──▶ blob worker
//! ```
//!
//! Each accepted connection becomes a new source. Shutdown stops accepting,
//! tells every reader to stop, and waits for them to flush and close their
//! sources before returning.

pub mod connection;
pub mod worker;

pub use connection::read_connection;
pub use worker::{spawn_blob_worker, spawn_text_worker, BlobMessage, FrameRouter, TextMessage};

use crate::domain::SourceId;
use crate::output::{SourceSummary, WorkDir};
use crossbeam_channel::Sender;
use log::{debug, info, warn};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;

pub struct IngestServer {
    listener: TcpListener,
    workdir: WorkDir,
    text: Sender<TextMessage>,
    blobs: Sender<BlobMessage>,
    next_source: u32,
}

impl IngestServer {
    /// # Errors
    ///
    /// The bind failure.
    pub async fn bind(
        addr: SocketAddr,
        workdir: WorkDir,
        text: Sender<TextMessage>,
        blobs: Sender<BlobMessage>,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, workdir, text, blobs, next_source: 0 })
    }

    /// # Errors
    ///
    /// If the socket cannot report its address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` completes. Returns one summary per
    /// accepted connection, in source order.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Vec<SourceSummary> {
        tokio::pin!(shutdown);
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut readers = JoinSet::new();
        let mut summaries = Vec::new();

        loop {
            tokio::select! {
                biased;
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let source = SourceId(self.next_source);
                        self.next_source += 1;
                        info!("Accepted {peer} as {source}");
                        let router = FrameRouter::new(source, self.text.clone(), self.blobs.clone());
                        let dump = self.workdir.raw_dump(source);
                        readers.spawn(read_connection(stream, peer, dump, router, stop_rx.clone()));
                    }
                    Err(e) => warn!("Accept failed: {e}"),
                },
                Some(done) = readers.join_next(), if !readers.is_empty() => {
                    collect(done, &mut summaries);
                }
                () = &mut shutdown => {
                    info!("Shutdown requested, {} connection(s) open", readers.len());
                    break;
                }
            }
        }

        // stop_rx is still held here, so the send cannot fail.
        let _ = stop_tx.send(true);
        while let Some(done) = readers.join_next().await {
            collect(done, &mut summaries);
        }
        debug!("All readers finished");

        summaries.sort_by_key(|s| s.source);
        summaries
    }
}

fn collect(done: Result<SourceSummary, tokio::task::JoinError>, summaries: &mut Vec<SourceSummary>) {
    match done {
        Ok(summary) => summaries.push(summary),
        Err(e) => warn!("Connection reader failed: {e}"),
    }
}
