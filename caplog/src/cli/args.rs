//! CLI argument definitions

use crate::reconstruct::RecoveryPolicy;
use caplog_common::{DEFAULT_MAX_CHAR_SIZE, DEFAULT_PORT};
use clap::builder::TypedValueParser;
use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "caplog",
    version,
    about = "Collect CAP_LOG traces, rebuild call stacks and validate them",
    after_help = "\
EXAMPLES:
    caplog                                   Listen on port 7227 until Ctrl-C
    caplog --port 9000 --output-dir /tmp     Listen on 9000, write runs under /tmp
    caplog trace.log other.log               Process text logs and exit
    caplog caplog-*/raw/src0.bin             Replay a raw dump of an earlier run"
)]
pub struct Args {
    /// Text logs or raw frame dumps to process (server mode if none)
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// TCP port to listen on in server mode
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind in server mode
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Directory receiving the timestamped run directory
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Line limit for processes that never announce MAX-CHAR-SIZE
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_CHAR_SIZE,
          value_parser = clap::value_parser!(u64).range(1..).map(|n| usize::try_from(n).unwrap_or(usize::MAX)))]
    pub max_char_size: usize,

    /// JSON behavior-tree rules (built-in object class check if omitted)
    #[arg(short, long, value_name = "FILE")]
    pub rules: Option<PathBuf>,

    /// Handling of a thread whose reported depth disagrees with its history
    #[arg(long, value_enum, default_value_t = RecoveryPolicy::Resync)]
    pub on_depth_mismatch: RecoveryPolicy,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}
