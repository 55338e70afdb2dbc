//! Cross-event validation state
//!
//! Remembers which class each object id was constructed as, per process, so
//! later messages can be checked against it. Only the memo node mutates it.

use crate::domain::ProcessId;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub class_name: String,
}

/// Object id -> stack of classes (base constructors run before derived ones)
#[derive(Debug, Default, Clone)]
pub struct ObjectRecord {
    objects: HashMap<String, Vec<ObjectEntry>>,
}

impl ObjectRecord {
    pub fn push(&mut self, object_id: &str, class_name: &str) {
        self.objects
            .entry(object_id.to_string())
            .or_default()
            .push(ObjectEntry { class_name: class_name.to_string() });
    }

    /// Remove the most recent entry for `class_name`. Returns false when the
    /// object never had that class.
    pub fn pop(&mut self, object_id: &str, class_name: &str) -> bool {
        let Some(stack) = self.objects.get_mut(object_id) else {
            return false;
        };
        let Some(pos) = stack.iter().rposition(|e| e.class_name == class_name) else {
            return false;
        };
        stack.remove(pos);
        if stack.is_empty() {
            self.objects.remove(object_id);
        }
        true
    }

    /// Most recently pushed class of an object
    #[must_use]
    pub fn current_class(&self, object_id: &str) -> Option<&str> {
        self.objects.get(object_id)?.last().map(|e| e.class_name.as_str())
    }

    #[must_use]
    pub fn live_objects(&self) -> usize {
        self.objects.len()
    }
}

#[derive(Debug, Default)]
pub struct ValidationState {
    records: HashMap<ProcessId, ObjectRecord>,
    line_index: u64,
}

impl ValidationState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_mut(&mut self, process: ProcessId) -> &mut ObjectRecord {
        self.records.entry(process).or_default()
    }

    #[must_use]
    pub fn class_of(&self, object_id: &str, process: ProcessId) -> Option<&str> {
        self.records.get(&process)?.current_class(object_id)
    }

    /// Start evaluating the next event; returns its line index.
    pub fn advance_line(&mut self) -> u64 {
        self.line_index += 1;
        self.line_index
    }

    #[must_use]
    pub fn line_index(&self) -> u64 {
        self.line_index
    }

    #[must_use]
    pub fn live_objects(&self) -> usize {
        self.records.values().map(ObjectRecord::live_objects).sum()
    }
}
