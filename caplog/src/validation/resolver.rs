//! Value resolvers and conditions
//!
//! Resolvers are evaluated lazily against the event being validated. They
//! deserialize straight from rule files:
//!
//! ```json
//! { "equals": [ { "from_scan_line": { "field": "label", "index": 0 } },
//!               { "literal": "ObjectClass" } ] }
//! ```

use super::node::EvalContext;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A resolved value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Id(u32),
    Unset,
}

impl Value {
    /// `Unset` equals only `Unset`; everything else compares by rendered text.
    #[must_use]
    pub fn same_as(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Unset, Value::Unset) => true,
            (Value::Unset, _) | (_, Value::Unset) => false,
            (a, b) => a.to_string() == b.to_string(),
        }
    }

    fn text(value: Option<&str>) -> Self {
        value.map_or(Value::Unset, |v| Value::Text(v.to_string()))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(text) => f.write_str(text),
            Value::Id(id) => write!(f, "{id}"),
            Value::Unset => f.write_str("<unset>"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanField {
    Label,
    Key,
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeField {
    ProcessId,
    ThreadId,
    Kind,
    Function,
    ObjectId,
    Tag,
    Message,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolver {
    Literal(String),
    FromScanLine {
        field: ScanField,
        #[serde(default)]
        index: usize,
    },
    FromStackNode(NodeField),
    QueryObjectClass {
        object_id: Box<Resolver>,
        process_id: Box<Resolver>,
    },
}

impl Resolver {
    #[must_use]
    pub fn resolve(&self, ctx: &EvalContext<'_>) -> Value {
        match self {
            Resolver::Literal(text) => Value::Text(text.clone()),
            Resolver::FromScanLine { field, index } => {
                let Some(scan) = ctx.scan_line else {
                    return Value::Unset;
                };
                match field {
                    ScanField::Label => Value::Text(scan.label().to_string()),
                    ScanField::Key => Value::text(scan.key(*index)),
                    ScanField::Value => Value::text(scan.value(*index)),
                }
            }
            Resolver::FromStackNode(field) => {
                let event = ctx.event;
                match field {
                    NodeField::ProcessId => Value::Id(event.process.0),
                    NodeField::ThreadId => Value::Id(event.thread.0),
                    NodeField::Kind => Value::Text(event.kind.as_str().to_string()),
                    NodeField::Function => Value::text(event.block().map(|b| b.function.as_str())),
                    NodeField::ObjectId => Value::text(event.block().map(|b| b.object_id.as_str())),
                    NodeField::Tag => Value::text(event.inner().map(|i| i.tag.as_str())),
                    NodeField::Message => Value::text(event.inner().map(|i| i.message.as_str())),
                }
            }
            Resolver::QueryObjectClass { object_id, process_id } => {
                let object = object_id.resolve(ctx);
                let process = match process_id.resolve(ctx) {
                    Value::Id(id) => Some(id),
                    Value::Text(text) => text.trim().parse().ok(),
                    Value::Unset => None,
                };
                match (object, process) {
                    (Value::Unset, _) | (_, None) => Value::Unset,
                    (object, Some(pid)) => Value::text(
                        ctx.state.class_of(&object.to_string(), crate::domain::ProcessId(pid)),
                    ),
                }
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            Resolver::Literal(text) => format!("{text:?}"),
            Resolver::FromScanLine { field: ScanField::Label, .. } => "scan.label".to_string(),
            Resolver::FromScanLine { field: ScanField::Key, index } => format!("scan.key[{index}]"),
            Resolver::FromScanLine { field: ScanField::Value, index } => format!("scan.value[{index}]"),
            Resolver::FromStackNode(field) => format!("event.{field:?}").to_lowercase(),
            Resolver::QueryObjectClass { object_id, process_id } => {
                format!("class_of({}, {})", object_id.describe(), process_id.describe())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Equals(Resolver, Resolver),
    Not(Box<Condition>),
}

impl Condition {
    #[must_use]
    pub fn holds(&self, ctx: &EvalContext<'_>) -> bool {
        match self {
            Condition::Equals(lhs, rhs) => lhs.resolve(ctx).same_as(&rhs.resolve(ctx)),
            Condition::Not(inner) => !inner.holds(ctx),
        }
    }

    /// Human-readable form used when a check has no description
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Condition::Equals(lhs, rhs) => format!("{} == {}", lhs.describe(), rhs.describe()),
            Condition::Not(inner) => format!("!({})", inner.describe()),
        }
    }
}
