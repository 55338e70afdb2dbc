//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers prevent common bugs like indexing the arena with a
//! thread id, and make function signatures more expressive.

use serde::Serialize;
use std::fmt;

/// Dense process id (0, 1, 2, ...)
///
/// Assigned by the identifier remapper on first sight of a raw process id.
/// This is NOT the id the instrumented process reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ProcessId(pub u32);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Dense thread id, scoped under its owning process
///
/// Thread 0 of process 0 and thread 0 of process 1 are different threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ThreadId(pub u32);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Logging channel id (three digits on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ChannelId(pub u32);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{:03}", self.0)
    }
}

/// Position of a slot in the event arena
///
/// Events reference their caller by index, never by pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EventIndex(pub usize);

impl fmt::Display for EventIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One input stream: an accepted connection or a file given on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SourceId(pub u32);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "src{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display() {
        assert_eq!(ProcessId(3).to_string(), "P3");
        assert_eq!(ThreadId(0).to_string(), "T0");
        assert_eq!(ChannelId(7).to_string(), "C007");
        assert_eq!(EventIndex(42).to_string(), "#42");
        assert_eq!(SourceId(1).to_string(), "src1");
    }

    #[test]
    fn test_event_index_ordering() {
        assert!(EventIndex(1) < EventIndex(2));
    }
}
