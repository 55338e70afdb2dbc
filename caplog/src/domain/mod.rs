//! Domain model for caplog
//!
//! This module contains core domain types and errors that provide:
//! - Compile-time safety via newtype pattern (a dense process id can never be
//!   passed where a thread id is expected)
//! - Self-documenting function signatures
//! - Structured error handling

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{ChannelId, EventIndex, ProcessId, SourceId, ThreadId};

pub use errors::{FragmentError, FrameError, ReconstructIssue, RuleError, RunError};
