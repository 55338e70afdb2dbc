//! Behavior-tree validation of reconstructed events
//!
//! - [`node`]: tree nodes and the per-event evaluation context
//! - [`resolver`]: lazy value resolvers and conditions
//! - [`state`]: object classes remembered across events
//! - [`scan_line`]: `label | key: [value]` message parsing
//! - [`rules`]: JSON rule files and the built-in tree

pub mod node;
pub mod resolver;
pub mod rules;
pub mod scan_line;
pub mod state;

pub use node::{EvalContext, MethodSignature, Node, NodeStatus, ValidationStats};
pub use resolver::{Condition, NodeField, Resolver, ScanField, Value};
pub use rules::{default_tree, load_rules, parse_rules, NodeSpec};
pub use scan_line::ScanLine;
pub use state::{ObjectRecord, ValidationState};

use crate::reconstruct::StackEvent;
use std::io::Write;

/// Behavior tree plus the state it accumulates over a run
#[derive(Debug)]
pub struct Validator {
    root: Node,
    state: ValidationState,
    stats: ValidationStats,
}

impl Validator {
    #[must_use]
    pub fn new(root: Node) -> Self {
        Self { root, state: ValidationState::new(), stats: ValidationStats::default() }
    }

    /// Tick the tree once for `event`, writing check results to `sink`.
    pub fn evaluate(&mut self, event: &StackEvent, source_name: &str, sink: &mut dyn Write) -> NodeStatus {
        let line_index = self.state.advance_line();
        self.stats.evaluated += 1;
        let scan_line = event.inner().and_then(|inner| ScanLine::parse(&inner.message));
        let mut ctx = EvalContext {
            event,
            scan_line: scan_line.as_ref(),
            state: &mut self.state,
            stats: &mut self.stats,
            sink,
            source_name,
            line_index,
        };
        self.root.tick(&mut ctx)
    }

    #[must_use]
    pub fn state(&self) -> &ValidationState {
        &self.state
    }

    #[must_use]
    pub fn stats(&self) -> ValidationStats {
        self.stats
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(default_tree())
    }
}
