//! # Stack Reconstruction
//!
//! Rebuilds the nesting of open/inner/close records per `(process, thread)`
//! and checks the depth each record claims against the depth its
//! predecessor implies.
//!
//! ## Expected Depth
//!
//! ```text
//! prev kind   enclosing depth e    caller of next event
//! ─────────   ─────────────────    ────────────────────
//! OPEN  (d)   d                    prev
//! INNER (d)   d                    prev.caller
//! CLOSE (d)   d - 1                prev.caller.caller
//! (none)      reported depth taken as is
//!
//! next OPEN expects e + 1, next INNER and CLOSE expect e
//! ```
//!
//! ## Mismatch Recovery
//!
//! Mismatches are reported and handled per thread according to
//! [`RecoveryPolicy`]; other threads are never affected.

use super::arena::{EventArena, EventPayload, StackEvent};
use crate::domain::{ChannelId, EventIndex, ProcessId, ReconstructIssue, SourceId, ThreadId};
use crate::ingest::classify::{parse_block, parse_inner, split_payload_header};
use crate::ingest::EventKind;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// What to do with a thread whose reported depth disagrees with its history
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryPolicy {
    /// Trust the reported depth and re-attach to the matching ancestor
    #[default]
    Resync,
    /// Stop reconstructing the thread
    Quarantine,
}

/// A complete (reassembled if needed) scope or message record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    pub source: SourceId,
    pub source_line: usize,
    pub process: ProcessId,
    pub thread: ThreadId,
    pub channel: ChannelId,
    pub kind: EventKind,
    pub depth: u32,
    pub payload: String,
}

/// Outcome of a successful commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    pub index: EventIndex,
    /// Problems reported without dropping the event
    pub issues: Vec<ReconstructIssue>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconstructStats {
    pub committed: u64,
    pub depth_mismatches: u64,
    pub malformed: u64,
    pub unmatched_closes: u64,
    pub quarantined_threads: u64,
    pub quarantined_events: u64,
}

type ThreadKey = (ProcessId, ThreadId);

#[derive(Debug)]
pub struct StackReconstructor {
    arena: EventArena,
    cursors: HashMap<ThreadKey, EventIndex>,
    quarantined: HashSet<ThreadKey>,
    policy: RecoveryPolicy,
    stats: ReconstructStats,
}

impl StackReconstructor {
    #[must_use]
    pub fn new(policy: RecoveryPolicy) -> Self {
        Self {
            arena: EventArena::new(),
            cursors: HashMap::new(),
            quarantined: HashSet::new(),
            policy,
            stats: ReconstructStats::default(),
        }
    }

    #[must_use]
    pub fn arena(&self) -> &EventArena {
        &self.arena
    }

    #[must_use]
    pub fn stats(&self) -> ReconstructStats {
        self.stats
    }

    /// Most recently committed event of a thread
    #[must_use]
    pub fn cursor(&self, process: ProcessId, thread: ThreadId) -> Option<EventIndex> {
        self.cursors.get(&(process, thread)).copied()
    }

    #[must_use]
    pub fn is_quarantined(&self, process: ProcessId, thread: ThreadId) -> bool {
        self.quarantined.contains(&(process, thread))
    }

    /// Reserve an arena slot for a long line that is still arriving.
    pub fn reserve(&mut self) -> EventIndex {
        self.arena.reserve()
    }

    /// Give up on a reserved slot.
    pub fn abandon(&mut self, slot: EventIndex) {
        self.arena.discard(slot);
    }

    /// Place a logical line on its thread's stack.
    ///
    /// `slot` is the reservation made when the line began arriving in
    /// fragments; it is discarded if the line is rejected.
    ///
    /// # Errors
    ///
    /// Returns the reason the event was dropped: malformed payload, a depth
    /// mismatch under [`RecoveryPolicy::Quarantine`], or a quarantined thread.
    pub fn commit(
        &mut self,
        line: LogicalLine,
        slot: Option<EventIndex>,
    ) -> Result<Committed, ReconstructIssue> {
        let result = self.place(line, slot);
        if let (Err(_), Some(slot)) = (&result, slot) {
            self.arena.discard(slot);
        }
        result
    }

    fn place(
        &mut self,
        line: LogicalLine,
        slot: Option<EventIndex>,
    ) -> Result<Committed, ReconstructIssue> {
        let key = (line.process, line.thread);
        if self.quarantined.contains(&key) {
            self.stats.quarantined_events += 1;
            return Err(ReconstructIssue::Quarantined { process: line.process, thread: line.thread });
        }

        let header = split_payload_header(&line.payload);
        let payload = match line.kind {
            EventKind::BlockOpen | EventKind::BlockClose => parse_block(header.rest)
                .map(EventPayload::Block)
                .ok_or_else(|| ReconstructIssue::MalformedBlock(line.payload.clone())),
            EventKind::Inner => parse_inner(header.rest)
                .map(EventPayload::Inner)
                .ok_or_else(|| ReconstructIssue::MalformedInner(line.payload.clone())),
            other => Err(ReconstructIssue::UnassembledFragment(other.as_str().to_string())),
        }
        .inspect_err(|_| self.stats.malformed += 1)?;

        let mut issues = Vec::new();
        let caller = match self.cursors.get(&key).copied() {
            None => None,
            Some(prev) => {
                let (expected, caller) = self.expectation(prev, line.kind);
                if expected == line.depth {
                    caller
                } else {
                    self.stats.depth_mismatches += 1;
                    let issue = ReconstructIssue::DepthMismatch {
                        process: line.process,
                        thread: line.thread,
                        expected,
                        reported: line.depth,
                    };
                    match self.policy {
                        RecoveryPolicy::Resync => {
                            issues.push(issue);
                            self.resync_caller(caller, line.kind, line.depth)
                        }
                        RecoveryPolicy::Quarantine => {
                            warn!("Quarantining {} {} after depth mismatch", line.process, line.thread);
                            self.quarantined.insert(key);
                            self.stats.quarantined_threads += 1;
                            return Err(issue);
                        }
                    }
                }
            }
        };

        if line.kind == EventKind::BlockClose {
            if let EventPayload::Block(block) = &payload {
                if !self.closes(caller, &block.function, &block.object_id) {
                    self.stats.unmatched_closes += 1;
                    issues.push(ReconstructIssue::UnmatchedClose {
                        function: block.function.clone(),
                        object_id: block.object_id.clone(),
                    });
                }
            }
        }

        let index = slot.unwrap_or_else(|| self.arena.next_index());
        let event = StackEvent {
            index,
            depth: line.depth,
            process: line.process,
            thread: line.thread,
            channel: line.channel,
            kind: line.kind,
            caller,
            source: line.source,
            source_line: line.source_line,
            function_id: header.function_id.to_string(),
            code_line: header.code_line,
            payload,
        };
        if !self.arena.commit(event) {
            return Err(ReconstructIssue::UnassembledFragment(line.kind.as_str().to_string()));
        }

        debug!("Committed {index} {} {} depth {}", line.process, line.thread, line.depth);
        self.cursors.insert(key, index);
        self.stats.committed += 1;
        Ok(Committed { index, issues })
    }

    /// Expected depth of the next event and its caller, given the thread's
    /// previous event.
    fn expectation(&self, prev: EventIndex, kind: EventKind) -> (u32, Option<EventIndex>) {
        let Some(prev) = self.arena.get(prev) else {
            return (0, None);
        };
        let (enclosing, caller) = match prev.kind {
            EventKind::BlockOpen => (prev.depth, Some(prev.index)),
            EventKind::BlockClose => (
                prev.depth.saturating_sub(1),
                prev.caller.and_then(|open| self.arena.get(open)).and_then(|open| open.caller),
            ),
            _ => (prev.depth, prev.caller),
        };
        let expected = if kind == EventKind::BlockOpen { enclosing + 1 } else { enclosing };
        (expected, caller)
    }

    /// Nearest open on the chain starting at `from` whose depth matches the
    /// enclosing depth the reported depth implies.
    fn resync_caller(&self, from: Option<EventIndex>, kind: EventKind, reported: u32) -> Option<EventIndex> {
        let target = if kind == EventKind::BlockOpen { reported.checked_sub(1)? } else { reported };
        if target == 0 {
            return None;
        }
        self.arena
            .chain(from)
            .find(|event| event.kind == EventKind::BlockOpen && event.depth == target)
            .map(|event| event.index)
    }

    fn closes(&self, caller: Option<EventIndex>, function: &str, object_id: &str) -> bool {
        caller.and_then(|c| self.arena.get(c)).is_some_and(|open| {
            open.kind == EventKind::BlockOpen
                && open.block().is_some_and(|b| b.function == function && b.object_id == object_id)
        })
    }
}
