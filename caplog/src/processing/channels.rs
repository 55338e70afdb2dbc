//! Channel declarations seen during a run

use crate::domain::{ChannelId, ProcessId, ThreadId};
use crate::ingest::classify::ChannelLine;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelDecl {
    pub process: ProcessId,
    pub thread: ThreadId,
    pub channel: ChannelId,
    pub enabled: bool,
    pub verbosity: u32,
    pub name: String,
    pub depth: u32,
}

/// Latest declaration per `(process, channel)`, in first-seen order
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    decls: Vec<ChannelDecl>,
}

impl ChannelRegistry {
    /// Record a declaration; a redeclaration replaces the earlier one.
    pub fn declare(&mut self, process: ProcessId, thread: ThreadId, line: &ChannelLine) {
        let decl = ChannelDecl {
            process,
            thread,
            channel: line.channel,
            enabled: line.enabled(),
            verbosity: line.verbosity,
            name: line.name.clone(),
            depth: line.depth,
        };
        match self.decls.iter_mut().find(|d| d.process == process && d.channel == line.channel) {
            Some(existing) => *existing = decl,
            None => self.decls.push(decl),
        }
    }

    #[must_use]
    pub fn get(&self, process: ProcessId, channel: ChannelId) -> Option<&ChannelDecl> {
        self.decls.iter().find(|d| d.process == process && d.channel == channel)
    }

    #[must_use]
    pub fn all(&self) -> &[ChannelDecl] {
        &self.decls
    }
}
