//! Dense identifier remapping
//!
//! Raw process and thread ids are whatever the instrumented system printed.
//! They are replaced by small dense integers on first sight: processes are
//! numbered globally, threads per process. The raw text stays available for
//! reports.

use crate::domain::{ProcessId, ThreadId};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct ThreadTable {
    ids: HashMap<String, ThreadId>,
    raw: Vec<String>,
}

#[derive(Debug, Default)]
pub struct IdentifierRemapper {
    processes: HashMap<String, ProcessId>,
    raw_processes: Vec<String>,
    threads: Vec<ThreadTable>,
}

/// Raw ids of one process, for the run summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessIds {
    pub id: ProcessId,
    pub raw: String,
    pub threads: Vec<String>,
}

impl IdentifierRemapper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Dense id for a raw process id, assigning the next one if unseen.
    pub fn process(&mut self, raw: &str) -> ProcessId {
        if let Some(id) = self.processes.get(raw) {
            return *id;
        }
        let id = ProcessId(dense(self.raw_processes.len()));
        self.processes.insert(raw.to_string(), id);
        self.raw_processes.push(raw.to_string());
        self.threads.push(ThreadTable::default());
        id
    }

    /// Dense id for a raw thread id within `process`.
    pub fn thread(&mut self, process: ProcessId, raw: &str) -> ThreadId {
        let slot = process.0 as usize;
        if self.threads.len() <= slot {
            self.threads.resize_with(slot + 1, ThreadTable::default);
        }
        let table = &mut self.threads[slot];
        if let Some(id) = table.ids.get(raw) {
            return *id;
        }
        let id = ThreadId(dense(table.raw.len()));
        table.ids.insert(raw.to_string(), id);
        table.raw.push(raw.to_string());
        id
    }

    pub fn resolve(&mut self, raw_process: &str, raw_thread: &str) -> (ProcessId, ThreadId) {
        let process = self.process(raw_process);
        (process, self.thread(process, raw_thread))
    }

    #[must_use]
    pub fn raw_process(&self, process: ProcessId) -> Option<&str> {
        self.raw_processes.get(process.0 as usize).map(String::as_str)
    }

    #[must_use]
    pub fn raw_thread(&self, process: ProcessId, thread: ThreadId) -> Option<&str> {
        self.threads.get(process.0 as usize)?.raw.get(thread.0 as usize).map(String::as_str)
    }

    #[must_use]
    pub fn process_count(&self) -> usize {
        self.raw_processes.len()
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<ProcessIds> {
        self.raw_processes
            .iter()
            .enumerate()
            .map(|(i, raw)| ProcessIds {
                id: ProcessId(dense(i)),
                raw: raw.clone(),
                threads: self.threads.get(i).map(|t| t.raw.clone()).unwrap_or_default(),
            })
            .collect()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn dense(n: usize) -> u32 {
    n as u32
}
