//! Ingestion: bytes to frames, frames to lines, lines to classified records

pub mod classify;
pub mod frame;
pub mod remap;
pub mod tokenizer;

pub use classify::{classify_line, reported_depth, BlockInfo, ClassifiedLine, EventKind, InnerInfo};
pub use frame::{text_lines, Frame, FrameParser, FrameStats};
pub use remap::IdentifierRemapper;
