//! Everything a run leaves on disk

pub mod blobs;
pub mod summary;
pub mod workdir;

pub use blobs::{sanitize_filename, BlobStats, BlobStore};
pub use summary::{RunSummary, SourceSummary};
pub use workdir::WorkDir;
