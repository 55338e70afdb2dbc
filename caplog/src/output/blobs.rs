//! Binary attachments written under `blobs/`

use log::{debug, warn};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::PathBuf;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlobStats {
    pub written: u64,
    pub bytes: u64,
    pub failed: u64,
}

#[derive(Debug)]
pub struct BlobStore {
    dir: PathBuf,
    used: HashSet<String>,
    stats: BlobStats,
}

impl BlobStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), used: HashSet::new(), stats: BlobStats::default() }
    }

    #[must_use]
    pub fn stats(&self) -> BlobStats {
        self.stats
    }

    /// Store `bytes` under a sanitized form of `filename`. Names already used
    /// in this run get a `-<n>` suffix before the extension.
    ///
    /// # Errors
    ///
    /// The write failure; it is also counted.
    pub fn write(&mut self, filename: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let name = self.unique_name(&sanitize_filename(filename));
        let path = self.dir.join(&name);
        match fs::write(&path, bytes) {
            Ok(()) => {
                debug!("Stored blob {} ({} bytes)", path.display(), bytes.len());
                self.used.insert(name);
                self.stats.written += 1;
                self.stats.bytes += bytes.len() as u64;
                Ok(path)
            }
            Err(e) => {
                warn!("Failed to store blob {}: {e}", path.display());
                self.stats.failed += 1;
                Err(e)
            }
        }
    }

    fn unique_name(&self, name: &str) -> String {
        if !self.taken(name) {
            return name.to_string();
        }
        let (stem, ext) = match name.rfind('.') {
            Some(dot) if dot > 0 => name.split_at(dot),
            _ => (name, ""),
        };
        (1..)
            .map(|n| format!("{stem}-{n}{ext}"))
            .find(|candidate| !self.taken(candidate))
            .unwrap_or_else(|| name.to_string())
    }

    fn taken(&self, name: &str) -> bool {
        self.used.contains(name) || self.dir.join(name).exists()
    }
}

/// Last path component of `filename` with anything but `[A-Za-z0-9._-]`
/// replaced by `_`. Never empty and never starts with a dot.
#[must_use]
pub fn sanitize_filename(filename: &str) -> String {
    let last = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let cleaned: String = last
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "blob".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_filename("dump.bin"), "dump.bin");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\tmp\\core dump.dmp"), "core_dump.dmp");
        assert_eq!(sanitize_filename(".."), "blob");
        assert_eq!(sanitize_filename(""), "blob");
        assert_eq!(sanitize_filename(".hidden"), "hidden");
    }

    #[test]
    fn test_collisions_get_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = BlobStore::new(dir.path());

        let first = store.write("frame.raw", b"one").unwrap();
        let second = store.write("frame.raw", b"two").unwrap();
        let third = store.write("sub/frame.raw", b"three").unwrap();

        assert_eq!(first.file_name().unwrap(), "frame.raw");
        assert_eq!(second.file_name().unwrap(), "frame-1.raw");
        assert_eq!(third.file_name().unwrap(), "frame-2.raw");
        assert_eq!(fs::read(&second).unwrap(), b"two");
        assert_eq!(store.stats(), BlobStats { written: 3, bytes: 11, failed: 0 });
    }

    #[test]
    fn test_missing_directory_counts_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = BlobStore::new(dir.path().join("gone"));
        assert!(store.write("x", b"1").is_err());
        assert_eq!(store.stats().failed, 1);
    }
}
