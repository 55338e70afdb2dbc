//! # Run Orchestration
//!
//! A [`Session`] is one run: working directory, pipeline and blob workers,
//! and the senders every source writes through. File mode and server mode
//! only differ in where the sources come from.
//!
//! ```text
//! Session::start ──▶ process_files() or bind() + IngestServer::run ──▶ Session::finish
//!                                                                      (joins workers,
//!                                                                       writes summary.json)
//! ```

use crate::config::{RunConfig, RunMode};
use crate::domain::{RunError, SourceId};
use crate::ingest::FrameParser;
use crate::output::{BlobStore, RunSummary, SourceSummary, WorkDir};
use crate::processing::{Pipeline, PipelineReport};
use crate::server::{spawn_blob_worker, spawn_text_worker, BlobMessage, FrameRouter, IngestServer, TextMessage};
use crate::validation::{load_rules, Validator};
use anyhow::{Context, Result};
use caplog_common::FRAME_DELIMITER;
use chrono::{DateTime, Local};
use crossbeam_channel::{unbounded, Sender};
use log::{info, warn};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

/// What a finished run produced
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub workdir: PathBuf,
    pub summary: RunSummary,
}

pub struct Session {
    config: RunConfig,
    started: DateTime<Local>,
    workdir: WorkDir,
    text: Sender<TextMessage>,
    blobs: Sender<BlobMessage>,
    text_worker: JoinHandle<PipelineReport>,
    blob_worker: JoinHandle<BlobStore>,
}

impl Session {
    /// Load rules, create the working directory and start both workers.
    ///
    /// # Errors
    ///
    /// Unreadable or invalid rules, or an output directory that cannot be
    /// created.
    pub fn start(config: RunConfig) -> Result<Self> {
        let started = Local::now();
        let validator = match &config.rules {
            Some(path) => Validator::new(load_rules(path)?),
            None => Validator::default(),
        };
        let workdir = WorkDir::create(&config.output_dir, started)?;
        let sinks = workdir
            .sinks()
            .with_context(|| format!("Failed to create output files in {}", workdir.root().display()))?;

        let (text, text_rx) = unbounded();
        let (blobs, blob_rx) = unbounded();
        let pipeline = Pipeline::new(config.pipeline_options(), validator, sinks);
        let text_worker = spawn_text_worker(pipeline, text_rx);
        let blob_worker = spawn_blob_worker(BlobStore::new(workdir.blobs()), blob_rx);
        info!("Writing run to {}", workdir.root().display());

        Ok(Self { config, started, workdir, text, blobs, text_worker, blob_worker })
    }

    #[must_use]
    pub fn workdir(&self) -> &WorkDir {
        &self.workdir
    }

    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Feed every configured file, one source each, in order.
    #[must_use]
    pub fn process_files(&self) -> Vec<SourceSummary> {
        self.config
            .files
            .iter()
            .zip(0..)
            .map(|(path, n)| {
                let router = FrameRouter::new(SourceId(n), self.text.clone(), self.blobs.clone());
                read_file(path, router)
            })
            .collect()
    }

    /// Bind the listener for server mode.
    ///
    /// # Errors
    ///
    /// The bind failure, with the address as context.
    pub async fn bind(&self) -> Result<IngestServer> {
        let addr = self.config.listen;
        IngestServer::bind(addr, self.workdir.clone(), self.text.clone(), self.blobs.clone())
            .await
            .with_context(|| format!("Failed to bind {addr}"))
    }

    /// Close the channels, wait for both workers and write `summary.json`.
    ///
    /// # Errors
    ///
    /// A panicked worker or a summary that cannot be written.
    pub fn finish(self, sources: Vec<SourceSummary>) -> Result<RunOutcome> {
        let Self { config, started, workdir, text, blobs, text_worker, blob_worker } = self;
        drop(text);
        drop(blobs);

        let report = text_worker.join().map_err(|_| RunError::WorkerPanicked("text"))?;
        let store = blob_worker.join().map_err(|_| RunError::WorkerPanicked("blob"))?;
        let summary = RunSummary::new(started, config, sources, store.stats(), report);
        summary.write(&workdir.summary())?;

        Ok(RunOutcome { workdir: workdir.root().to_path_buf(), summary })
    }
}

/// Run `config` to completion. Server mode stops when `shutdown` completes.
///
/// # Errors
///
/// Setup failures only; problems inside the input are reported in the
/// output files.
pub async fn execute(config: RunConfig, shutdown: impl Future<Output = ()>) -> Result<RunOutcome> {
    let session = Session::start(config)?;
    let sources = match session.config().mode {
        RunMode::Files => session.process_files(),
        RunMode::Server => {
            let server = session.bind().await?;
            info!("Listening on {}", server.local_addr()?);
            server.run(shutdown).await
        }
    };
    session.finish(sources)
}

/// Read one file as a source. Files starting with the frame delimiter are
/// raw dumps; anything else is a text log.
fn read_file(path: &Path, mut router: FrameRouter) -> SourceSummary {
    let source = router.source();
    let name = path.display().to_string();
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            warn!("Skipping {name}: {e}");
            router.close();
            return SourceSummary { source, name, bytes: 0, lines: 0, frames: None };
        }
    };

    let frames = if data.starts_with(&FRAME_DELIMITER) {
        info!("{name}: raw frame dump ({} bytes)", data.len());
        let mut parser = FrameParser::new();
        let mut results = parser.push(&data);
        results.extend(parser.finish());
        for frame in results {
            if !router.route(frame) {
                break;
            }
        }
        Some(parser.stats())
    } else {
        info!("{name}: text log ({} bytes)", data.len());
        let text = String::from_utf8_lossy(&data);
        for (index, line) in text.lines().enumerate() {
            if !line.trim().is_empty() && !router.route_line(index + 1, line) {
                break;
            }
        }
        None
    };

    let lines = router.last_line() as u64;
    router.close();
    SourceSummary { source, name, bytes: data.len() as u64, lines, frames }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::io::Write;

    #[test]
    fn test_text_file_keeps_file_line_numbers() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "first\n\nthird\r\n").unwrap();
        let (text_tx, text_rx) = unbounded();
        let (blob_tx, _blob_rx) = unbounded();

        let summary = read_file(file.path(), FrameRouter::new(SourceId(0), text_tx, blob_tx));

        let numbers: Vec<usize> = text_rx
            .try_iter()
            .filter_map(|m| match m {
                TextMessage::Line { line_number, .. } => Some(line_number),
                _ => None,
            })
            .collect();
        assert_eq!(numbers, vec![1, 3]);
        assert_eq!(summary.lines, 3);
        assert!(summary.frames.is_none());
    }

    #[test]
    fn test_raw_dump_is_decoded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&caplog_common::encode_text_frame("a\nb")).unwrap();
        file.write_all(&caplog_common::encode_blob_frame("x.bin", b"123")).unwrap();
        let (text_tx, text_rx) = unbounded();
        let (blob_tx, blob_rx) = unbounded();

        let summary = read_file(file.path(), FrameRouter::new(SourceId(1), text_tx, blob_tx));

        assert_eq!(summary.frames.map(|f| f.frames), Some(2));
        assert_eq!(text_rx.try_iter().count(), 3); // two lines + close
        assert_eq!(blob_rx.try_iter().next().map(|b| b.filename), Some("x.bin".to_string()));
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let (text_tx, text_rx) = unbounded();
        let (blob_tx, _blob_rx) = unbounded();
        let summary = read_file(Path::new("/nonexistent/trace.log"), FrameRouter::new(SourceId(0), text_tx, blob_tx));
        assert_eq!(summary.bytes, 0);
        assert_eq!(text_rx.try_iter().collect::<Vec<_>>(), vec![TextMessage::Closed(SourceId(0))]);
    }
}
