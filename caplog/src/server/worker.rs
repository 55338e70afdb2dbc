//! Workers and the per-source router feeding them
//!
//! ```text
//! reader / file ──▶ FrameRouter ──┬─ TextMessage ──▶ text worker (owns Pipeline)
//!                                 └─ BlobMessage ──▶ blob worker (owns BlobStore)
//! ```
//!
//! Both workers are std threads draining unbounded `crossbeam_channel`s.
//! They finish once every sender is dropped.

use crate::domain::{FrameError, SourceId};
use crate::ingest::{text_lines, Frame};
use crate::output::BlobStore;
use crate::processing::{Pipeline, PipelineReport};
use crossbeam_channel::{Receiver, Sender};
use log::{debug, warn};
use std::thread::{self, JoinHandle};

/// Work for the text worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextMessage {
    Line { source: SourceId, line_number: usize, text: String },
    FrameError { source: SourceId, line_number: usize, error: FrameError },
    /// No more lines will arrive from this source
    Closed(SourceId),
}

/// Work for the blob worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobMessage {
    pub source: SourceId,
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Run `pipeline` on its own thread until all text senders are gone.
pub fn spawn_text_worker(mut pipeline: Pipeline, rx: Receiver<TextMessage>) -> JoinHandle<PipelineReport> {
    thread::spawn(move || {
        for message in rx {
            match message {
                TextMessage::Line { source, line_number, text } => {
                    pipeline.ingest_line(source, line_number, &text);
                }
                TextMessage::FrameError { source, line_number, error } => {
                    pipeline.report_frame_error(source, line_number, &error);
                }
                TextMessage::Closed(source) => {
                    debug!("{source} closed");
                    pipeline.close_source(source);
                }
            }
        }
        pipeline.finish()
    })
}

/// Store blobs on their own thread until all blob senders are gone.
pub fn spawn_blob_worker(mut store: BlobStore, rx: Receiver<BlobMessage>) -> JoinHandle<BlobStore> {
    thread::spawn(move || {
        for blob in rx {
            // failures are logged and counted by the store
            if let Ok(path) = store.write(&blob.filename, &blob.bytes) {
                debug!("{} blob saved to {}", blob.source, path.display());
            }
        }
        store
    })
}

/// Numbers the lines of one source and hands frames to the workers
#[derive(Debug)]
pub struct FrameRouter {
    source: SourceId,
    last_line: usize,
    text: Sender<TextMessage>,
    blobs: Sender<BlobMessage>,
}

impl FrameRouter {
    #[must_use]
    pub fn new(source: SourceId, text: Sender<TextMessage>, blobs: Sender<BlobMessage>) -> Self {
        Self { source, last_line: 0, text, blobs }
    }

    #[must_use]
    pub fn source(&self) -> SourceId {
        self.source
    }

    /// Number of the last line handed on
    #[must_use]
    pub fn last_line(&self) -> usize {
        self.last_line
    }

    /// Route one decoded frame (or framing error). Returns `false` once the
    /// workers are gone.
    pub fn route(&mut self, frame: Result<Frame, FrameError>) -> bool {
        match frame {
            Ok(Frame::Text(text)) => text_lines(&text).all(|line| {
                let number = self.last_line + 1;
                self.route_line(number, line)
            }),
            Ok(Frame::Binary { filename, bytes }) => {
                let sent = self.blobs.send(BlobMessage { source: self.source, filename, bytes });
                sent.is_ok()
            }
            Err(error) => {
                warn!("{}: {error}", self.source);
                let message = TextMessage::FrameError { source: self.source, line_number: self.last_line, error };
                self.text.send(message).is_ok()
            }
        }
    }

    /// Route a line whose number the caller already knows (plain text files).
    pub fn route_line(&mut self, line_number: usize, text: &str) -> bool {
        self.last_line = line_number;
        let message = TextMessage::Line { source: self.source, line_number, text: text.to_string() };
        self.text.send(message).is_ok()
    }

    /// Tell the text worker the source is done.
    pub fn close(self) {
        if self.text.send(TextMessage::Closed(self.source)).is_err() {
            warn!("Text worker gone before {} closed", self.source);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::{PipelineOptions, Sinks};
    use crate::validation::Validator;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_router_numbers_lines_across_frames() {
        let (text_tx, text_rx) = unbounded();
        let (blob_tx, blob_rx) = unbounded();
        let mut router = FrameRouter::new(SourceId(4), text_tx, blob_tx);

        assert!(router.route(Ok(Frame::Text("a\nb\n".to_string()))));
        assert!(router.route(Ok(Frame::Binary { filename: "f".to_string(), bytes: vec![1] })));
        assert!(router.route(Ok(Frame::Text("c".to_string()))));
        assert!(router.route(Err(FrameError::Oversized { offset: 0, declared: 1 << 30 })));
        router.close();

        let messages: Vec<TextMessage> = text_rx.try_iter().collect();
        let numbers: Vec<usize> = messages
            .iter()
            .filter_map(|m| match m {
                TextMessage::Line { line_number, .. } => Some(*line_number),
                _ => None,
            })
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(matches!(messages[3], TextMessage::FrameError { line_number: 3, .. }));
        assert_eq!(messages[4], TextMessage::Closed(SourceId(4)));
        assert_eq!(blob_rx.try_iter().count(), 1);
    }

    #[test]
    fn test_router_reports_gone_workers() {
        let (text_tx, text_rx) = unbounded();
        let (blob_tx, _blob_rx) = unbounded();
        drop(text_rx);
        let mut router = FrameRouter::new(SourceId(0), text_tx, blob_tx);
        assert!(!router.route_line(1, "x"));
    }

    #[test]
    fn test_text_worker_finishes_when_senders_drop() {
        let (tx, rx) = unbounded();
        let pipeline = Pipeline::new(PipelineOptions::default(), Validator::default(), Sinks::discard());
        let handle = spawn_text_worker(pipeline, rx);

        tx.send(TextMessage::Line {
            source: SourceId(0),
            line_number: 1,
            text: "CAP_LOG : P=1 T=1 C=000 :-> 1 [2] LOG: hello".to_string(),
        })
        .unwrap();
        tx.send(TextMessage::Closed(SourceId(0))).unwrap();
        drop(tx);

        let report = handle.join().unwrap();
        assert_eq!(report.events, 1);
        assert_eq!(report.processes.len(), 1);
    }

    #[test]
    fn test_blob_worker_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = unbounded();
        let handle = spawn_blob_worker(BlobStore::new(dir.path()), rx);
        tx.send(BlobMessage { source: SourceId(0), filename: "core.dmp".to_string(), bytes: vec![0; 8] })
            .unwrap();
        drop(tx);

        let store = handle.join().unwrap();
        assert_eq!(store.stats().written, 1);
        assert!(dir.path().join("core.dmp").is_file());
    }
}
