//! Long-line reassembly
//!
//! A producer splits a line longer than its limit into `|+`, `+` ... `+`,
//! `+|` fragments, each padded to exactly `limit` characters. Transports may
//! trim that padding, so every fragment remembers how many characters it fell
//! short of the limit and the gap is restored before the next chunk.
//!
//! ```text
//! |+ "abc"    (limit 10, frame 7 chars)  -> buffer "abc",          padding 3
//! +  "def"    (frame 7 chars)            -> buffer "abc   def",    padding 3
//! +| "gh   "  (last)                     -> buffer "abc   def   gh"
//! ```

use crate::domain::{EventIndex, FragmentError, ProcessId, SourceId, ThreadId};
use crate::ingest::EventKind;
use serde::Serialize;
use std::collections::HashMap;

type ThreadKey = (ProcessId, ThreadId);

/// A long line still arriving
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFragment {
    pub process: ProcessId,
    pub thread: ThreadId,
    pub source: SourceId,
    pub source_line: usize,
    /// Arena slot reserved when the first fragment arrived
    pub slot: EventIndex,
    /// `CAP_LOG : P=.. T=.. C=.. ` of the reassembled line
    pub prefix: String,
    buffer: String,
    padding: usize,
    limit: usize,
    parts: usize,
}

/// A reassembled line ready to be classified again
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedLine {
    pub process: ProcessId,
    pub thread: ThreadId,
    pub source: SourceId,
    pub source_line: usize,
    pub slot: EventIndex,
    pub line: String,
    pub parts: usize,
}

/// First fragment of a long line
#[derive(Debug, Clone)]
pub struct FragmentStart<'a> {
    pub process: ProcessId,
    pub thread: ThreadId,
    pub source: SourceId,
    pub source_line: usize,
    pub slot: EventIndex,
    pub prefix: String,
    pub chunk: &'a str,
    /// Character length of the fragment line as received
    pub frame_len: usize,
    pub limit: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FragmentStats {
    pub begun: u64,
    pub completed: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
pub struct FragmentAssembler {
    pending: HashMap<ThreadKey, PendingFragment>,
    stats: FragmentStats,
}

impl FragmentAssembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn stats(&self) -> FragmentStats {
        self.stats
    }

    #[must_use]
    pub fn is_pending(&self, process: ProcessId, thread: ThreadId) -> bool {
        self.pending.contains_key(&(process, thread))
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Open a pending line. A line already pending on the same thread is
    /// returned so the caller can report and discard it.
    pub fn begin(&mut self, start: FragmentStart<'_>) -> Option<PendingFragment> {
        self.stats.begun += 1;
        let fragment = PendingFragment {
            process: start.process,
            thread: start.thread,
            source: start.source,
            source_line: start.source_line,
            slot: start.slot,
            prefix: start.prefix,
            buffer: start.chunk.to_string(),
            padding: start.limit.saturating_sub(start.frame_len),
            limit: start.limit,
            parts: 1,
        };
        let replaced = self.pending.insert((start.process, start.thread), fragment);
        if replaced.is_some() {
            self.stats.failed += 1;
        }
        replaced
    }

    /// Add a continue or end fragment.
    ///
    /// Returns the finished line on `+|`, `None` while more fragments are due.
    ///
    /// # Errors
    ///
    /// [`FragmentError::WithoutBegin`] when nothing is pending on the thread.
    pub fn append(
        &mut self,
        process: ProcessId,
        thread: ThreadId,
        kind: EventKind,
        chunk: &str,
        frame_len: usize,
    ) -> Result<Option<CompletedLine>, FragmentError> {
        let key = (process, thread);
        let Some(fragment) = self.pending.get_mut(&key) else {
            self.stats.failed += 1;
            let marker = if kind == EventKind::ConcatEnd { "+|" } else { "+" };
            return Err(FragmentError::WithoutBegin { process, thread, marker: marker.to_string() });
        };

        fragment.buffer.extend(std::iter::repeat(' ').take(fragment.padding));
        fragment.parts += 1;

        if kind != EventKind::ConcatEnd {
            fragment.buffer.push_str(chunk);
            fragment.padding = fragment.limit.saturating_sub(frame_len);
            return Ok(None);
        }

        fragment.buffer.push_str(chunk.trim_end_matches(' '));
        let Some(done) = self.pending.remove(&key) else {
            return Ok(None);
        };
        self.stats.completed += 1;
        Ok(Some(CompletedLine {
            process,
            thread,
            source: done.source,
            source_line: done.source_line,
            slot: done.slot,
            line: format!("{}{}", done.prefix, done.buffer),
            parts: done.parts,
        }))
    }

    /// A non-fragment line arrived on a thread with a pending line.
    pub fn interrupt(&mut self, process: ProcessId, thread: ThreadId) -> Option<PendingFragment> {
        let stale = self.pending.remove(&(process, thread));
        if stale.is_some() {
            self.stats.failed += 1;
        }
        stale
    }

    /// Drop every pending line that started on `source`.
    pub fn close_source(&mut self, source: SourceId) -> Vec<PendingFragment> {
        let keys: Vec<ThreadKey> =
            self.pending.iter().filter(|(_, f)| f.source == source).map(|(k, _)| *k).collect();
        self.take(&keys)
    }

    /// Drop every pending line.
    pub fn drain_all(&mut self) -> Vec<PendingFragment> {
        let keys: Vec<ThreadKey> = self.pending.keys().copied().collect();
        self.take(&keys)
    }

    fn take(&mut self, keys: &[ThreadKey]) -> Vec<PendingFragment> {
        let mut dropped: Vec<PendingFragment> =
            keys.iter().filter_map(|k| self.pending.remove(k)).collect();
        dropped.sort_by_key(|f| f.slot);
        self.stats.failed += dropped.len() as u64;
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caplog_common::fragment_line;

    const PREFIX: &str = "CAP_LOG : P=1 T=0 C=000 ";

    fn start(chunk: &str, frame_len: usize, limit: usize) -> FragmentStart<'_> {
        FragmentStart {
            process: ProcessId(0),
            thread: ThreadId(0),
            source: SourceId(0),
            source_line: 1,
            slot: EventIndex(0),
            prefix: PREFIX.to_string(),
            chunk,
            frame_len,
            limit,
        }
    }

    /// Feed producer fragments (optionally trimmed) through the assembler.
    fn reassemble(parts: &[String], trim: bool) -> String {
        let mut asm = FragmentAssembler::new();
        let limit = parts[0].chars().count();
        let mut out = None;
        for part in parts {
            let part = if trim { part.trim_end() } else { part.as_str() };
            let rest = &part[PREFIX.len()..];
            let (marker, chunk) = rest.split_once(' ').unwrap_or((rest, ""));
            let frame_len = part.chars().count() + usize::from(!rest.contains(' '));
            match EventKind::from_marker(marker).unwrap() {
                EventKind::ConcatBegin => {
                    assert!(asm.begin(start(chunk, frame_len, limit)).is_none());
                }
                kind => {
                    out = asm.append(ProcessId(0), ThreadId(0), kind, chunk, frame_len).unwrap();
                }
            }
        }
        out.unwrap().line
    }

    #[test]
    fn test_round_trip_untrimmed() {
        let body = ":-> 1 [3] LOG: the quick brown fox jumps over the lazy dog again and again";
        let parts = fragment_line(PREFIX, body, 40);
        assert!(parts.len() > 2);
        assert_eq!(reassemble(&parts, false), format!("{PREFIX}{body}"));
    }

    #[test]
    fn test_round_trip_with_trimmed_transport() {
        let body = ":-> 1 [3] LOG: word   spaced     across    boundaries          end";
        for limit in [34, 35, 40, 41] {
            let parts = fragment_line(PREFIX, body, limit);
            assert_eq!(reassemble(&parts, true), format!("{PREFIX}{body}"), "limit {limit}");
        }
    }

    #[test]
    fn test_padding_restores_gap() {
        let mut asm = FragmentAssembler::new();
        asm.begin(start("abc", 7, 10));
        assert_eq!(asm.append(ProcessId(0), ThreadId(0), EventKind::ConcatContinue, "def", 7), Ok(None));
        let done = asm.append(ProcessId(0), ThreadId(0), EventKind::ConcatEnd, "gh   ", 10).unwrap().unwrap();
        assert_eq!(done.line, format!("{PREFIX}abc   def   gh"));
        assert_eq!(done.parts, 3);
    }

    #[test]
    fn test_end_without_begin() {
        let mut asm = FragmentAssembler::new();
        let err = asm.append(ProcessId(0), ThreadId(2), EventKind::ConcatEnd, "x", 5).unwrap_err();
        assert!(matches!(err, FragmentError::WithoutBegin { .. }));
        assert_eq!(asm.stats().failed, 1);
    }

    #[test]
    fn test_restart_returns_previous() {
        let mut asm = FragmentAssembler::new();
        asm.begin(start("one", 10, 10));
        let old = asm.begin(start("two", 10, 10)).unwrap();
        assert_eq!(old.buffer, "one");
        assert_eq!(asm.pending_count(), 1);
    }

    #[test]
    fn test_close_source_drops_only_its_fragments() {
        let mut asm = FragmentAssembler::new();
        asm.begin(start("a", 10, 10));
        let mut other = start("b", 10, 10);
        other.thread = ThreadId(1);
        other.source = SourceId(1);
        asm.begin(other);

        let dropped = asm.close_source(SourceId(0));
        assert_eq!(dropped.len(), 1);
        assert!(asm.is_pending(ProcessId(0), ThreadId(1)));
        assert_eq!(asm.drain_all().len(), 1);
    }
}
