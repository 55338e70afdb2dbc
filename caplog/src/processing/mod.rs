//! Event processing: everything between a classified line and the reports
//!
//! - [`pipeline`]: the run object that owns all per-run state
//! - [`processor`]: arena cursor that renders and validates committed events
//! - [`render`]: report line formatting
//! - [`channels`]: channel declarations collected for the summary

pub mod channels;
pub mod pipeline;
pub mod processor;
pub mod render;

pub use channels::{ChannelDecl, ChannelRegistry};
pub use pipeline::{LineStats, Pipeline, PipelineOptions, PipelineReport, Sinks};
pub use processor::{Processor, ProcessorStats};
pub use render::{render_classified, render_event};
