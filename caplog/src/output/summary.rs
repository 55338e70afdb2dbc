//! `summary.json`: configuration, per-source counters and pipeline totals

use super::blobs::BlobStats;
use crate::config::RunConfig;
use crate::domain::{RunError, SourceId};
use crate::ingest::FrameStats;
use crate::processing::PipelineReport;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// One input stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub source: SourceId,
    /// Peer address or file path
    pub name: String,
    pub bytes: u64,
    pub lines: u64,
    /// `None` for plain text files
    pub frames: Option<FrameStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub version: &'static str,
    pub started: DateTime<Local>,
    pub finished: DateTime<Local>,
    pub duration_secs: f64,
    pub config: RunConfig,
    pub sources: Vec<SourceSummary>,
    pub blobs: BlobStats,
    pub pipeline: PipelineReport,
}

impl RunSummary {
    #[must_use]
    pub fn new(
        started: DateTime<Local>,
        config: RunConfig,
        sources: Vec<SourceSummary>,
        blobs: BlobStats,
        pipeline: PipelineReport,
    ) -> Self {
        let finished = Local::now();
        #[allow(clippy::cast_precision_loss)]
        let duration_secs = (finished - started).num_milliseconds().max(0) as f64 / 1000.0;
        Self {
            version: env!("CARGO_PKG_VERSION"),
            started,
            finished,
            duration_secs,
            config,
            sources,
            blobs,
            pipeline,
        }
    }

    /// Pretty-printed JSON at `path`.
    ///
    /// # Errors
    ///
    /// File creation or serialization failure.
    pub fn write(&self, path: &Path) -> Result<(), RunError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}
