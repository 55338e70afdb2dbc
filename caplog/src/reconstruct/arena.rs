//! Event arena
//!
//! Append-only vector of slots. Events refer to their caller by
//! [`EventIndex`]; a slot reserved for a long line being reassembled stays
//! `Pending` until the line completes (`Committed`) or fails (`Discarded`).

use crate::domain::{ChannelId, EventIndex, ProcessId, SourceId, ThreadId};
use crate::ingest::{BlockInfo, EventKind, InnerInfo};
use log::warn;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPayload {
    Block(BlockInfo),
    Inner(InnerInfo),
}

/// One committed open, close or inner record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackEvent {
    pub index: EventIndex,
    pub depth: u32,
    pub process: ProcessId,
    pub thread: ThreadId,
    pub channel: ChannelId,
    pub kind: EventKind,
    pub caller: Option<EventIndex>,
    pub source: SourceId,
    pub source_line: usize,
    pub function_id: String,
    pub code_line: Option<u32>,
    pub payload: EventPayload,
}

impl StackEvent {
    #[must_use]
    pub fn block(&self) -> Option<&BlockInfo> {
        match &self.payload {
            EventPayload::Block(block) => Some(block),
            EventPayload::Inner(_) => None,
        }
    }

    #[must_use]
    pub fn inner(&self) -> Option<&InnerInfo> {
        match &self.payload {
            EventPayload::Inner(inner) => Some(inner),
            EventPayload::Block(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Pending,
    Committed(StackEvent),
    Discarded,
}

#[derive(Debug, Default)]
pub struct EventArena {
    slots: Vec<Slot>,
}

impl EventArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Index the next appended slot will get
    #[must_use]
    pub fn next_index(&self) -> EventIndex {
        EventIndex(self.slots.len())
    }

    /// Reserve a slot to be filled later by [`EventArena::commit`].
    pub fn reserve(&mut self) -> EventIndex {
        let index = self.next_index();
        self.slots.push(Slot::Pending);
        index
    }

    /// Store `event` at `event.index`: either the next free position or a
    /// `Pending` reservation. Anything else is refused.
    pub fn commit(&mut self, event: StackEvent) -> bool {
        let index = event.index.0;
        if index == self.slots.len() {
            self.slots.push(Slot::Committed(event));
            return true;
        }
        match self.slots.get_mut(index) {
            Some(slot @ Slot::Pending) => {
                *slot = Slot::Committed(event);
                true
            }
            _ => {
                warn!("Refusing to overwrite arena slot {}", event.index);
                false
            }
        }
    }

    /// Mark a reservation as failed. No effect on committed slots.
    pub fn discard(&mut self, index: EventIndex) {
        if let Some(slot @ Slot::Pending) = self.slots.get_mut(index.0) {
            *slot = Slot::Discarded;
        }
    }

    #[must_use]
    pub fn slot(&self, index: EventIndex) -> Option<&Slot> {
        self.slots.get(index.0)
    }

    #[must_use]
    pub fn get(&self, index: EventIndex) -> Option<&StackEvent> {
        match self.slots.get(index.0) {
            Some(Slot::Committed(event)) => Some(event),
            _ => None,
        }
    }

    pub fn events(&self) -> impl Iterator<Item = &StackEvent> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Committed(event) => Some(event),
            _ => None,
        })
    }

    /// Walk the caller chain starting at `start` (inclusive).
    pub fn chain(&self, start: Option<EventIndex>) -> impl Iterator<Item = &StackEvent> {
        std::iter::successors(start.and_then(|i| self.get(i)), |event| {
            event.caller.and_then(|c| self.get(c))
        })
    }
}
