//! Declarative rule files
//!
//! A rule file is a JSON description of the behavior tree:
//!
//! ```json
//! { "node": "run_all", "children": [
//!     { "node": "memo_object_pointer" },
//!     { "node": "conditional_execute",
//!       "condition": { "equals": [ { "from_scan_line": { "field": "label" } },
//!                                  { "literal": "ObjectClass" } ] },
//!       "child": { "node": "check_message", "description": "object class",
//!                  "condition": { "equals": [ ... ] } } }
//! ] }
//! ```

use super::node::Node;
use super::resolver::{Condition, NodeField, Resolver, ScanField};
use crate::domain::RuleError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum NodeSpec {
    RunAll {
        children: Vec<NodeSpec>,
    },
    Sequence {
        children: Vec<NodeSpec>,
    },
    ConditionalExecute {
        condition: Condition,
        child: Box<NodeSpec>,
    },
    MemoObjectPointer,
    CheckMessage {
        condition: Condition,
        #[serde(default)]
        description: String,
    },
}

impl NodeSpec {
    /// Build the runtime tree.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::Invalid`] for composite nodes without children.
    pub fn build(&self) -> Result<Node, RuleError> {
        Ok(match self {
            NodeSpec::RunAll { children } => Node::RunAll(build_children("run_all", children)?),
            NodeSpec::Sequence { children } => Node::sequence(build_children("sequence", children)?),
            NodeSpec::ConditionalExecute { condition, child } => {
                Node::conditional(condition.clone(), child.build()?)
            }
            NodeSpec::MemoObjectPointer => Node::MemoObjectPointer,
            NodeSpec::CheckMessage { condition, description } => {
                Node::check(condition.clone(), description.clone())
            }
        })
    }
}

fn build_children(kind: &str, children: &[NodeSpec]) -> Result<Vec<Node>, RuleError> {
    if children.is_empty() {
        return Err(RuleError::Invalid(format!("{kind} node needs at least one child")));
    }
    children.iter().map(NodeSpec::build).collect()
}

/// Parse a rule tree from JSON text.
///
/// # Errors
///
/// Malformed JSON or an invalid tree.
pub fn parse_rules(json: &str) -> Result<Node, RuleError> {
    let spec: NodeSpec = serde_json::from_str(json)?;
    spec.build()
}

/// Load a rule tree from a file.
///
/// # Errors
///
/// Unreadable file, malformed JSON or an invalid tree.
pub fn load_rules(path: &Path) -> Result<Node, RuleError> {
    let json = std::fs::read_to_string(path)
        .map_err(|source| RuleError::Read { path: path.display().to_string(), source })?;
    parse_rules(&json)
}

/// Built-in tree: remember object classes and check `ObjectClass` messages
/// against them.
#[must_use]
pub fn default_spec() -> NodeSpec {
    let label_is_object_class = Condition::Equals(
        Resolver::FromScanLine { field: ScanField::Label, index: 0 },
        Resolver::Literal("ObjectClass".to_string()),
    );
    let class_matches = Condition::Equals(
        Resolver::QueryObjectClass {
            object_id: Box::new(Resolver::FromScanLine { field: ScanField::Value, index: 0 }),
            process_id: Box::new(Resolver::FromStackNode(NodeField::ProcessId)),
        },
        Resolver::FromScanLine { field: ScanField::Value, index: 1 },
    );

    NodeSpec::RunAll {
        children: vec![
            NodeSpec::MemoObjectPointer,
            NodeSpec::ConditionalExecute {
                condition: label_is_object_class,
                child: Box::new(NodeSpec::CheckMessage {
                    condition: class_matches,
                    description: "object class matches constructor".to_string(),
                }),
            },
        ],
    }
}

#[must_use]
pub fn default_tree() -> Node {
    // Composite nodes of the built-in tree always have children.
    default_spec().build().unwrap_or(Node::MemoObjectPointer)
}
