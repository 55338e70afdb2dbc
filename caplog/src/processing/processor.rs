//! # Event Processing
//!
//! Walks the arena in commit order behind a cursor. Each committed event is
//! rendered to the report and handed to the validator exactly once.
//!
//! ## Slot Handling
//!
//! - `Committed` → render, validate, advance
//! - `Discarded` → advance
//! - `Pending`   → stop; a long line is still arriving and later events must
//!   wait so report order matches arena order

use super::render::render_event;
use crate::domain::EventIndex;
use crate::reconstruct::{EventArena, Slot};
use crate::validation::{NodeStatus, Validator};
use log::warn;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessorStats {
    pub rendered: u64,
    pub skipped: u64,
    pub failed_ticks: u64,
}

/// Arena cursor plus counters
#[derive(Debug, Default)]
pub struct Processor {
    cursor: usize,
    pub stats: ProcessorStats,
}

impl Processor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Next slot to be processed
    #[must_use]
    pub fn cursor(&self) -> EventIndex {
        EventIndex(self.cursor)
    }

    /// Process every slot up to the first pending one. Returns the number of
    /// events rendered.
    pub fn drain(
        &mut self,
        arena: &EventArena,
        validator: &mut Validator,
        report: &mut dyn Write,
        validation: &mut dyn Write,
    ) -> usize {
        let mut rendered = 0;
        while let Some(slot) = arena.slot(EventIndex(self.cursor)) {
            match slot {
                Slot::Pending => break,
                Slot::Discarded => self.stats.skipped += 1,
                Slot::Committed(event) => {
                    if let Err(e) = writeln!(report, "{}", render_event(event)) {
                        warn!("Failed to write report: {e}");
                    }
                    let source_name = event.source.to_string();
                    if validator.evaluate(event, &source_name, validation) == NodeStatus::Failed {
                        self.stats.failed_ticks += 1;
                    }
                    self.stats.rendered += 1;
                    rendered += 1;
                }
            }
            self.cursor += 1;
        }
        rendered
    }
}
