//! # Behavior Tree Nodes
//!
//! The tree is built once per run and ticked once per committed event, so
//! nodes such as [`Node::Sequence`] keep their progress across events.
//!
//! ```text
//! RunAll ─┬─ MemoObjectPointer              (tracks constructors/destructors)
//!         └─ ConditionalExecute(label == "ObjectClass")
//!                 └─ CheckMessage(class_of(value[0]) == value[1])
//! ```

use super::resolver::Condition;
use super::scan_line::ScanLine;
use super::state::ValidationState;
use crate::ingest::EventKind;
use crate::reconstruct::StackEvent;
use log::{debug, warn};
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Success,
    Executing,
    Failed,
    Ignored,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValidationStats {
    pub evaluated: u64,
    pub checks_passed: u64,
    pub checks_failed: u64,
    pub objects_pushed: u64,
    pub objects_popped: u64,
}

/// Everything a node may look at or touch while handling one event
pub struct EvalContext<'a> {
    pub event: &'a StackEvent,
    pub scan_line: Option<&'a ScanLine>,
    pub state: &'a mut ValidationState,
    pub stats: &'a mut ValidationStats,
    /// Validation report
    pub sink: &'a mut dyn Write,
    /// Display name of the event's source
    pub source_name: &'a str,
    pub line_index: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    RunAll(Vec<Node>),
    Sequence { children: Vec<Node>, current: usize },
    ConditionalExecute { condition: Condition, child: Box<Node> },
    MemoObjectPointer,
    CheckMessage { condition: Condition, description: String },
}

impl Node {
    #[must_use]
    pub fn sequence(children: Vec<Node>) -> Self {
        Node::Sequence { children, current: 0 }
    }

    #[must_use]
    pub fn conditional(condition: Condition, child: Node) -> Self {
        Node::ConditionalExecute { condition, child: Box::new(child) }
    }

    #[must_use]
    pub fn check(condition: Condition, description: impl Into<String>) -> Self {
        Node::CheckMessage { condition, description: description.into() }
    }

    pub fn tick(&mut self, ctx: &mut EvalContext<'_>) -> NodeStatus {
        match self {
            Node::RunAll(children) => {
                let mut failed = false;
                for child in children.iter_mut() {
                    failed |= child.tick(ctx) == NodeStatus::Failed;
                }
                if failed {
                    NodeStatus::Failed
                } else {
                    NodeStatus::Executing
                }
            }
            Node::Sequence { children, current } => {
                let Some(child) = children.get_mut(*current) else {
                    return NodeStatus::Success;
                };
                match child.tick(ctx) {
                    NodeStatus::Success => {
                        *current += 1;
                        if *current == children.len() {
                            NodeStatus::Success
                        } else {
                            NodeStatus::Executing
                        }
                    }
                    NodeStatus::Failed => NodeStatus::Failed,
                    NodeStatus::Executing | NodeStatus::Ignored => NodeStatus::Executing,
                }
            }
            Node::ConditionalExecute { condition, child } => {
                if condition.holds(ctx) {
                    child.tick(ctx)
                } else {
                    NodeStatus::Ignored
                }
            }
            Node::MemoObjectPointer => memo_object_pointer(ctx),
            Node::CheckMessage { condition, description } => check_message(condition, description, ctx),
        }
    }
}

fn memo_object_pointer(ctx: &mut EvalContext<'_>) -> NodeStatus {
    let event = ctx.event;
    if event.kind != EventKind::BlockOpen {
        return NodeStatus::Ignored;
    }
    let Some(block) = event.block() else {
        return NodeStatus::Ignored;
    };
    let Some(sig) = MethodSignature::parse(&block.function) else {
        return NodeStatus::Ignored;
    };
    let record = ctx.state.record_mut(event.process);

    if sig.is_constructor() {
        debug!("{} {} constructed as {}", event.process, block.object_id, sig.class);
        record.push(&block.object_id, sig.class);
        ctx.stats.objects_pushed += 1;
        NodeStatus::Success
    } else if sig.is_destructor() && record.pop(&block.object_id, sig.class) {
        ctx.stats.objects_popped += 1;
        NodeStatus::Success
    } else {
        NodeStatus::Ignored
    }
}

fn check_message(condition: &Condition, description: &str, ctx: &mut EvalContext<'_>) -> NodeStatus {
    let passed = condition.holds(ctx);
    let event = ctx.event;
    let message = match (event.inner(), event.block()) {
        (Some(inner), _) => inner.message.as_str(),
        (None, Some(block)) => block.function.as_str(),
        (None, None) => "",
    };
    let description =
        if description.is_empty() { condition.describe() } else { description.to_string() };

    if passed {
        ctx.stats.checks_passed += 1;
    } else {
        ctx.stats.checks_failed += 1;
        warn!("Check failed at {}:{}: {description}", ctx.source_name, event.source_line);
    }
    if let Err(e) = writeln!(
        ctx.sink,
        "[{}] line={} src={}:{} {} {} {} :: {}",
        if passed { "PASS" } else { "FAIL" },
        ctx.line_index,
        ctx.source_name,
        event.source_line,
        event.process,
        event.thread,
        description,
        message,
    ) {
        warn!("Failed to write validation report: {e}");
    }

    if passed {
        NodeStatus::Success
    } else {
        NodeStatus::Failed
    }
}

/// `[return type] Class::Method(params)`, reduced to class and method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodSignature<'a> {
    pub class: &'a str,
    pub method: &'a str,
}

impl<'a> MethodSignature<'a> {
    #[must_use]
    pub fn parse(signature: &'a str) -> Option<Self> {
        let name = signature.find('(').map_or(signature, |i| &signature[..i]).trim();
        let name = strip_return_type(name);
        let split = rfind_top_level(name, "::")?;
        let class = name[..split].trim();
        let method = name[split + 2..].trim();
        (!class.is_empty() && !method.is_empty()).then_some(Self { class, method })
    }

    /// Last path segment of the class, template arguments removed
    #[must_use]
    pub fn class_base(&self) -> &'a str {
        let last = rfind_top_level(self.class, "::").map_or(self.class, |i| &self.class[i + 2..]);
        last.split('<').next().unwrap_or(last).trim()
    }

    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.method == self.class_base()
    }

    #[must_use]
    pub fn is_destructor(&self) -> bool {
        self.method.strip_prefix('~').is_some_and(|m| m.trim() == self.class_base())
    }
}

/// Drop everything up to the last space outside `<...>`.
fn strip_return_type(name: &str) -> &str {
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in name.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth -= 1,
            ' ' | '*' | '&' if depth == 0 => start = i + c.len_utf8(),
            _ => {}
        }
    }
    &name[start..]
}

fn rfind_top_level(name: &str, pat: &str) -> Option<usize> {
    let bytes = name.as_bytes();
    let mut depth = 0i32;
    let mut found = None;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' => depth += 1,
            b'>' => depth -= 1,
            _ if depth == 0 && bytes[i..].starts_with(pat.as_bytes()) => {
                found = Some(i);
                i += pat.len();
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    found
}
