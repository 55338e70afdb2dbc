//! Run configuration, resolved once from the command line and recorded in
//! the run summary.

use crate::cli::Args;
use crate::processing::PipelineOptions;
use crate::reconstruct::RecoveryPolicy;
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Read the given files, then exit
    Files,
    /// Accept producer connections until interrupted
    Server,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunConfig {
    pub mode: RunMode,
    pub files: Vec<PathBuf>,
    pub listen: SocketAddr,
    pub output_dir: PathBuf,
    pub max_char_size: usize,
    pub rules: Option<PathBuf>,
    pub recovery: RecoveryPolicy,
    pub quiet: bool,
}

impl RunConfig {
    #[must_use]
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions { default_limit: self.max_char_size, recovery: self.recovery }
    }
}

impl From<Args> for RunConfig {
    fn from(args: Args) -> Self {
        Self {
            mode: if args.files.is_empty() { RunMode::Server } else { RunMode::Files },
            listen: SocketAddr::new(args.bind, args.port),
            files: args.files,
            output_dir: args.output_dir,
            max_char_size: args.max_char_size,
            rules: args.rules,
            recovery: args.on_depth_mismatch,
            quiet: args.quiet,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        let options = PipelineOptions::default();
        Self {
            mode: RunMode::Server,
            files: Vec::new(),
            listen: SocketAddr::new(IpAddr::from([0, 0, 0, 0]), caplog_common::DEFAULT_PORT),
            output_dir: PathBuf::from("."),
            max_char_size: options.default_limit,
            rules: None,
            recovery: options.recovery,
            quiet: false,
        }
    }
}
