//! Keyed structures: the JSON-shaped trees that hold cached query results.
//!
//! A `KeyedStructure` is an ordered map from string key to `serde_json::Value`.
//! Every value falls into exactly one `NodeKind`:
//! - `Branch`: a nested object, walked recursively
//! - `Sequence`: an array, always treated as one atomic leaf
//! - `Scalar`: null, bool, number or string
//!
//! Key order is insertion order (serde_json `preserve_order`), and replacing
//! the value of an existing key keeps its position.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PathError;

/// Ordered string-keyed map of JSON values.
pub type KeyedStructure = Map<String, Value>;

/// Separator used in the textual form of a `FieldPath`.
const PATH_SEPARATOR: char = '.';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Branch,
    Sequence,
    Scalar,
}

impl NodeKind {
    pub fn of(value: &Value) -> Self {
        Node::classify(value).kind()
    }

    /// Sequences and scalars are both leaves.
    pub fn is_leaf(self) -> bool {
        !matches!(self, NodeKind::Branch)
    }
}

/// A borrowed value tagged with its kind.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Branch(&'a KeyedStructure),
    Sequence(&'a [Value]),
    Scalar(&'a Value),
}

impl<'a> Node<'a> {
    pub fn classify(value: &'a Value) -> Self {
        match value {
            Value::Object(map) => Node::Branch(map),
            Value::Array(items) => Node::Sequence(items),
            scalar => Node::Scalar(scalar),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Branch(_) => NodeKind::Branch,
            Node::Sequence(_) => NodeKind::Sequence,
            Node::Scalar(_) => NodeKind::Scalar,
        }
    }
}

/// A path of object keys into a keyed structure, written `users.nodes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// The empty path, addressing the structure itself.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse `a.b.c`. Blank input is the root path, matching `Display`.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        let mut segments = Vec::new();
        for segment in trimmed.split(PATH_SEPARATOR) {
            if segment.is_empty() {
                return Err(PathError::EmptySegment(trimmed.to_string()));
            }
            segments.push(segment.to_string());
        }
        Ok(Self(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, segment: impl Into<String>) {
        self.0.push(segment.into());
    }

    pub fn pop(&mut self) -> Option<String> {
        self.0.pop()
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut path = self.clone();
        path.push(segment);
        path
    }

    /// Split into the parent path and the final key.
    pub fn split_last(&self) -> Option<(&[String], &String)> {
        self.0.split_last().map(|(last, parent)| (parent, last))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", PATH_SEPARATOR)?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FieldPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.to_string()
    }
}

/// Look up the value at `path`. The root path has no value of its own.
pub fn get_path<'a>(structure: &'a KeyedStructure, path: &FieldPath) -> Option<&'a Value> {
    let (parent, last) = path.split_last()?;
    let mut current = structure;
    for segment in parent {
        current = current.get(segment)?.as_object()?;
    }
    current.get(last)
}

/// Set the value at `path`, creating intermediate objects as needed.
///
/// An intermediate that exists but is not an object is replaced by one.
pub fn set_path(
    structure: &mut KeyedStructure,
    path: &FieldPath,
    value: Value,
) -> Result<(), PathError> {
    let (parent, last) = path.split_last().ok_or(PathError::Empty)?;
    set_in(structure, parent, last, value);
    Ok(())
}

fn set_in(map: &mut KeyedStructure, parent: &[String], last: &str, value: Value) {
    let Some((head, rest)) = parent.split_first() else {
        map.insert(last.to_string(), value);
        return;
    };
    let slot = map
        .entry(head.clone())
        .or_insert_with(|| Value::Object(KeyedStructure::new()));
    if let Value::Object(child) = slot {
        set_in(child, rest, last, value);
    } else {
        let mut child = KeyedStructure::new();
        set_in(&mut child, rest, last, value);
        *slot = Value::Object(child);
    }
}
