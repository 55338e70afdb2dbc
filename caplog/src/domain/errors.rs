//! Structured error types for caplog
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! Per-line problems (`FrameError`, `ReconstructIssue`, `FragmentError`) are
//! reported and skipped; only `RuleError` and `RunError` abort a run.

use super::types::{ProcessId, ThreadId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error(
        "Frame at offset {offset} declares {declared} payload bytes but the next delimiter follows after {available}"
    )]
    Truncated { offset: u64, declared: usize, available: usize },

    #[error("Frame at offset {offset} declares an oversized payload of {declared} bytes")]
    Oversized { offset: u64, declared: usize },

    #[error("Frame at offset {offset} has unknown payload type {payload_type}")]
    UnknownPayloadType { offset: u64, payload_type: u32 },

    #[error("Binary frame at offset {offset} has no filename separator")]
    MissingBlobSeparator { offset: u64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconstructIssue {
    #[error("Depth mismatch on {process} {thread}: expected {expected}, reported {reported}")]
    DepthMismatch { process: ProcessId, thread: ThreadId, expected: u32, reported: u32 },

    #[error("Malformed scope payload: {0}")]
    MalformedBlock(String),

    #[error("Malformed message payload: {0}")]
    MalformedInner(String),

    #[error("Unknown indentation marker '{0}'")]
    UnknownMarker(String),

    #[error("Close of {function} {object_id} does not match the enclosing open")]
    UnmatchedClose { function: String, object_id: String },

    #[error("{process} {thread} is quarantined after a depth mismatch")]
    Quarantined { process: ProcessId, thread: ThreadId },

    #[error("Fragment marker '{0}' reached the stack without reassembly")]
    UnassembledFragment(String),
}

impl ReconstructIssue {
    /// Warnings are reported but the event is still committed.
    #[must_use]
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::UnmatchedClose { .. })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FragmentError {
    #[error("'{marker}' fragment on {process} {thread} without a preceding begin")]
    WithoutBegin { process: ProcessId, thread: ThreadId, marker: String },

    #[error("Long line on {process} {thread} restarted before its end fragment")]
    Restarted { process: ProcessId, thread: ThreadId },

    #[error("Long line on {process} {thread} interrupted by an unrelated line")]
    Interrupted { process: ProcessId, thread: ThreadId },

    #[error("Long line on {process} {thread} left unfinished: {reason}")]
    Abandoned { process: ProcessId, thread: ThreadId, reason: &'static str },

    #[error("Reassembled line is not a scope or message record")]
    NotReassemblable,
}

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Failed to read rule file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid rule: {0}")]
    Invalid(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Failed to create working directory {path}: {source}")]
    WorkDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} worker panicked")]
    WorkerPanicked(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
