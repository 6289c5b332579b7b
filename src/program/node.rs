//! Program tree model.
//!
//! A program is a forest of block chains. Each [`ProgramNode`] has a kind, the
//! field values the editor stored for it, and an optional `next` link to the
//! following block. Loop kinds additionally own a `body` chain.
//!
//! Field values are kept exactly as the editor produced them ([`FieldValue`]) and
//! every field is optional. Converting a field into its domain type happens in
//! the `fields` accessors at interpretation time, so a malformed block is
//! reported as a node error instead of failing the whole program load. Block
//! types the interpreter does not know load as [`NodeKind::Unsupported`] and
//! keep their `next` link.
//!
//! # Serialized form
//!
//! ```json
//! { "sequences": [
//!   { "type": "repeat", "times": 4,
//!     "body": { "type": "move", "direction": "forward",
//!               "next": { "type": "wait", "seconds": 1 } } }
//! ] }
//! ```

use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

use crate::hardware::Direction;

/// A raw field value as stored by the block editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A number field.
    Number(f64),
    /// A text or dropdown field.
    Text(String),
    /// Any other JSON value; never a valid field.
    Other(Value),
}

impl FieldValue {
    /// Numeric view of the value; text is parsed leniently (surrounding whitespace
    /// ignored), the way number fields round-trip through the editor.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse().ok(),
            FieldValue::Other(_) => None,
        }
    }

    /// Textual view of the value.
    pub fn to_text(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                format!("{}", *n as i64)
            }
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Other(value) => value.to_string(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<u32> for FieldValue {
    fn from(n: u32) -> Self {
        FieldValue::Number(f64::from(n))
    }
}

impl From<u16> for FieldValue {
    fn from(n: u16) -> Self {
        FieldValue::Number(f64::from(n))
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

/// Serialized `type` tags of the block kinds the interpreter understands.
const KNOWN_TYPES: [&str; 7] = [
    "move",
    "stop",
    "wait",
    "set_speed",
    "repeat",
    "repeat_counted",
    "print",
];

/// The kind of a block together with its fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    /// Drive in a direction until told otherwise.
    Move {
        /// `forward`, `backward`, `left` or `right`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        direction: Option<FieldValue>,
    },
    /// Stop the motors.
    Stop,
    /// Pause the program.
    Wait {
        /// Seconds to wait.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seconds: Option<FieldValue>,
    },
    /// Set the motor speed.
    SetSpeed {
        /// Speed in `0..=1023`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speed: Option<FieldValue>,
    },
    /// Loop whose count is a literal field on the block.
    #[serde(rename = "repeat")]
    RepeatFixed {
        /// Iteration count.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        times: Option<FieldValue>,
        /// First block of the loop body.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<Box<ProgramNode>>,
    },
    /// Loop whose count comes from an attached number input; absent input means once.
    RepeatCounted {
        /// Iteration count, if a number input is attached.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        times: Option<FieldValue>,
        /// First block of the loop body.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<Box<ProgramNode>>,
    },
    /// Show a message in the event log.
    Print {
        /// Text to show.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<FieldValue>,
    },
    /// A block type the interpreter does not know, kept verbatim.
    #[serde(skip)]
    Unsupported {
        /// The block's `type` tag (empty if it had none).
        type_name: String,
        /// Every other key of the block except `next`.
        fields: Map<String, Value>,
    },
}

impl NodeKind {
    /// Display name used in events and errors.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Move { .. } => "Move",
            NodeKind::Stop => "Stop",
            NodeKind::Wait { .. } => "Wait",
            NodeKind::SetSpeed { .. } => "Speed",
            NodeKind::RepeatFixed { .. } => "Repeat",
            NodeKind::RepeatCounted { .. } => "Repeat",
            NodeKind::Print { .. } => "Print",
            NodeKind::Unsupported { .. } => "Unsupported",
        }
    }

    fn from_object(mut object: Map<String, Value>) -> serde_json::Result<Self> {
        let type_name = match object.get("type") {
            Some(Value::String(name)) => name.clone(),
            _ => String::new(),
        };
        if KNOWN_TYPES.contains(&type_name.as_str()) {
            return serde_json::from_value(Value::Object(object));
        }
        object.remove("type");
        Ok(NodeKind::Unsupported {
            type_name,
            fields: object,
        })
    }

    fn to_object(&self) -> serde_json::Result<Map<String, Value>> {
        if let NodeKind::Unsupported { type_name, fields } = self {
            let mut object = fields.clone();
            object.insert("type".to_string(), Value::String(type_name.clone()));
            return Ok(object);
        }
        match serde_json::to_value(self)? {
            Value::Object(object) => Ok(object),
            other => Err(<serde_json::Error as serde::ser::Error>::custom(format!(
                "block serialized as {other} instead of an object"
            ))),
        }
    }
}

/// One block plus the link to the block that follows it.
///
/// Serialized as the kind's object with an extra `next` key.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramNode {
    /// What the block does.
    pub kind: NodeKind,
    /// The following block in the same sequence.
    pub next: Option<Box<ProgramNode>>,
}

impl Serialize for ProgramNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut object = self.kind.to_object().map_err(S::Error::custom)?;
        if let Some(next) = &self.next {
            let next = serde_json::to_value(next).map_err(S::Error::custom)?;
            object.insert("next".to_string(), next);
        }
        object.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ProgramNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut object = Map::<String, Value>::deserialize(deserializer)?;
        let next = match object.remove("next") {
            None | Some(Value::Null) => None,
            Some(next) => Some(Box::new(
                serde_json::from_value::<ProgramNode>(next).map_err(D::Error::custom)?,
            )),
        };
        let kind = NodeKind::from_object(object).map_err(D::Error::custom)?;
        Ok(Self { kind, next })
    }
}

impl ProgramNode {
    /// A block of `kind` with no successor.
    pub fn new(kind: NodeKind) -> Self {
        Self { kind, next: None }
    }

    /// Move block.
    pub fn moving(direction: Direction) -> Self {
        Self::new(NodeKind::Move {
            direction: Some(FieldValue::from(direction.as_str())),
        })
    }

    /// Stop block.
    pub fn stop() -> Self {
        Self::new(NodeKind::Stop)
    }

    /// Wait block.
    pub fn wait(seconds: f64) -> Self {
        Self::new(NodeKind::Wait {
            seconds: Some(FieldValue::from(seconds)),
        })
    }

    /// Speed block.
    pub fn set_speed(speed: u16) -> Self {
        Self::new(NodeKind::SetSpeed {
            speed: Some(FieldValue::from(speed)),
        })
    }

    /// Fixed-count loop over `body`.
    pub fn repeat(times: u32, body: Vec<ProgramNode>) -> Self {
        Self::new(NodeKind::RepeatFixed {
            times: Some(FieldValue::from(times)),
            body: chain(body).map(Box::new),
        })
    }

    /// Loop whose count comes from a number input; `None` models a missing input.
    pub fn repeat_counted(times: Option<u32>, body: Vec<ProgramNode>) -> Self {
        Self::new(NodeKind::RepeatCounted {
            times: times.map(FieldValue::from),
            body: chain(body).map(Box::new),
        })
    }

    /// Print block.
    pub fn print(message: impl Into<String>) -> Self {
        Self::new(NodeKind::Print {
            message: Some(FieldValue::Text(message.into())),
        })
    }

    /// Set the next link, replacing any existing one.
    pub fn with_next(mut self, next: ProgramNode) -> Self {
        self.next = Some(Box::new(next));
        self
    }

    /// The following block, if any.
    pub fn next(&self) -> Option<&ProgramNode> {
        self.next.as_deref()
    }

    /// First node of the loop body, if this is a loop with a body.
    pub fn body(&self) -> Option<&ProgramNode> {
        match &self.kind {
            NodeKind::RepeatFixed { body, .. } | NodeKind::RepeatCounted { body, .. } => {
                body.as_deref()
            }
            _ => None,
        }
    }

    /// This node followed by every node reachable through `next` links.
    pub fn iter_chain(&self) -> Chain<'_> {
        Chain {
            current: Some(self),
        }
    }

    /// Number of nodes in this chain, including loop bodies.
    pub fn count_nodes(&self) -> usize {
        self.iter_chain()
            .map(|node| 1 + node.body().map_or(0, ProgramNode::count_nodes))
            .sum()
    }
}

/// Iterator over a next-linked chain.
pub struct Chain<'a> {
    current: Option<&'a ProgramNode>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a ProgramNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.current?;
        self.current = node.next();
        Some(node)
    }
}

/// Link `nodes` into one chain, in order. Existing `next` links are replaced.
pub fn chain(nodes: Vec<ProgramNode>) -> Option<ProgramNode> {
    nodes.into_iter().rev().fold(None, |next, mut node| {
        node.next = next.map(Box::new);
        Some(node)
    })
}

/// An ordered collection of independent top-level sequences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    #[serde(default)]
    sequences: Vec<ProgramNode>,
}

impl Program {
    /// An empty program.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a program where each inner `Vec` becomes one top-level sequence.
    /// Empty inner vectors are skipped.
    pub fn from_sequences(sequences: Vec<Vec<ProgramNode>>) -> Self {
        Self {
            sequences: sequences.into_iter().filter_map(chain).collect(),
        }
    }

    /// Append an already linked sequence.
    pub fn push_root(&mut self, root: ProgramNode) {
        self.sequences.push(root);
    }

    /// Append `nodes` as a new top-level sequence.
    pub fn push_sequence(&mut self, nodes: Vec<ProgramNode>) {
        if let Some(root) = chain(nodes) {
            self.sequences.push(root);
        }
    }

    /// First node of each top-level sequence, in execution order.
    pub fn sequences(&self) -> &[ProgramNode] {
        &self.sequences
    }

    /// True when there is no sequence to run.
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Total number of nodes, loop bodies included.
    pub fn node_count(&self) -> usize {
        self.sequences.iter().map(ProgramNode::count_nodes).sum()
    }
}
