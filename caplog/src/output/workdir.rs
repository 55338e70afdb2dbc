//! Timestamped working directory of a run
//!
//! ```text
//! <output-dir>/caplog-<YYYYmmdd-HHMMSS>/
//! ├── raw/<source>.bin     bytes as received, replayable in file mode
//! ├── blobs/              binary attachments
//! ├── parsed.log
//! ├── report.log
//! ├── validation.log
//! └── summary.json
//! ```

use crate::domain::{RunError, SourceId};
use crate::processing::Sinks;
use chrono::{DateTime, Local};
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

const RAW_DIR: &str = "raw";
const BLOB_DIR: &str = "blobs";

#[derive(Debug, Clone)]
pub struct WorkDir {
    root: PathBuf,
}

impl WorkDir {
    /// Create a fresh run directory under `base`. A directory for the same
    /// second that already exists gets a numeric suffix.
    ///
    /// # Errors
    ///
    /// [`RunError::WorkDir`] if any directory cannot be created.
    pub fn create(base: &Path, started: DateTime<Local>) -> Result<Self, RunError> {
        let stem = format!("caplog-{}", started.format("%Y%m%d-%H%M%S"));
        let mut root = base.join(&stem);
        let mut suffix = 1;
        while root.exists() {
            root = base.join(format!("{stem}-{suffix}"));
            suffix += 1;
        }

        for dir in [root.join(RAW_DIR), root.join(BLOB_DIR)] {
            fs::create_dir_all(&dir)
                .map_err(|source| RunError::WorkDir { path: dir.display().to_string(), source })?;
        }
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn raw_dump(&self, source: SourceId) -> PathBuf {
        self.root.join(RAW_DIR).join(format!("{source}.bin"))
    }

    #[must_use]
    pub fn blobs(&self) -> PathBuf {
        self.root.join(BLOB_DIR)
    }

    #[must_use]
    pub fn parsed_log(&self) -> PathBuf {
        self.root.join("parsed.log")
    }

    #[must_use]
    pub fn report_log(&self) -> PathBuf {
        self.root.join("report.log")
    }

    #[must_use]
    pub fn validation_log(&self) -> PathBuf {
        self.root.join("validation.log")
    }

    #[must_use]
    pub fn summary(&self) -> PathBuf {
        self.root.join("summary.json")
    }

    /// Buffered file sinks for the three text outputs.
    ///
    /// # Errors
    ///
    /// Any file creation failure.
    pub fn sinks(&self) -> io::Result<Sinks> {
        Ok(Sinks {
            parsed: Box::new(BufWriter::new(File::create(self.parsed_log())?)),
            report: Box::new(BufWriter::new(File::create(self.report_log())?)),
            validation: Box::new(BufWriter::new(File::create(self.validation_log())?)),
        })
    }
}
