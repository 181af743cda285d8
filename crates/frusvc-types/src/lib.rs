//! `frusvc-types` – shared vocabulary of the FRU inventory service.
//!
//! Every other crate in the workspace speaks in terms of these types:
//!
//! - [`PropertyValue`] – the scalar stored under a property key of a node.
//! - [`NodeDescription`] – one node-creation directive produced by a
//!   description parser and consumed by the object tree.
//! - [`ObjectSnapshot`] – an owned copy of a node handed back to callers.
//! - [`FruError`] / [`Fault`] – the fault taxonomy and its wire payload.
//! - [`path`] – helpers for '/'-delimited object paths.

pub mod path;

use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A scalar property value attached to a tree node.
///
/// Serialized untagged, so a JSON document simply writes `true`, `42`,
/// `1.5` or `"text"`. Variant order matters: an integer is tried as `i64`,
/// then `u64`, and only a number with a fraction or exponent becomes a
/// `Float`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Integer(i64),
    /// Integers above `i64::MAX`.
    Unsigned(u64),
    Float(f64),
    Text(String),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(v) => write!(f, "{v}"),
            PropertyValue::Integer(v) => write!(f, "{v}"),
            PropertyValue::Unsigned(v) => write!(f, "{v}"),
            PropertyValue::Float(v) => write!(f, "{v}"),
            PropertyValue::Text(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Integer(v)
    }
}

impl From<u64> for PropertyValue {
    fn from(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(small) => PropertyValue::Integer(small),
            Err(_) => PropertyValue::Unsigned(v),
        }
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Float(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Text(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Text(v)
    }
}

/// Property map of a node. Ordered so snapshots and logs are stable.
pub type Properties = BTreeMap<String, PropertyValue>;

/// A node-creation directive: one node to create plus, recursively, the
/// nodes to create beneath it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct NodeDescription {
    /// Name of the node relative to its parent (a single path segment).
    pub name: String,
    /// Scalar properties of the node.
    #[serde(default)]
    pub properties: Properties,
    /// Nodes to create beneath this one, in creation order.
    #[serde(default)]
    pub children: Vec<NodeDescription>,
}

impl NodeDescription {
    /// A childless node with no properties.
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Properties::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style: add a property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Builder-style: append a child directive.
    pub fn with_child(mut self, child: NodeDescription) -> Self {
        self.children.push(child);
        self
    }

    /// Number of nodes this directive creates, itself included.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(NodeDescription::node_count).sum::<usize>()
    }
}

/// Owned copy of a single tree node, safe to hold after the call that
/// produced it has returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    pub path: String,
    pub properties: Properties,
    /// Names of the direct children, sorted.
    pub children: Vec<String>,
}

/// Kind of a fault, without the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultKind {
    NotFound,
    Conflict,
    InvalidDescription,
    InternalError,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FaultKind::NotFound => "NotFound",
            FaultKind::Conflict => "Conflict",
            FaultKind::InvalidDescription => "InvalidDescription",
            FaultKind::InternalError => "InternalError",
        };
        f.write_str(s)
    }
}

/// Fault payload returned to a remote caller: a kind plus a human-readable
/// message, nothing more.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
}

/// Error type shared by the tree, the description parser and the service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FruError {
    /// The referenced path is not in the tree.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The path an operation would create already exists.
    #[error("object already exists: {0}")]
    Conflict(String),

    /// The description document (or call) is malformed.
    #[error("invalid description: {0}")]
    InvalidDescription(String),

    /// A structural invariant of the tree was found violated.
    #[error("internal error: {0}")]
    Internal(String),
}

impl FruError {
    pub fn kind(&self) -> FaultKind {
        match self {
            FruError::NotFound(_) => FaultKind::NotFound,
            FruError::Conflict(_) => FaultKind::Conflict,
            FruError::InvalidDescription(_) => FaultKind::InvalidDescription,
            FruError::Internal(_) => FaultKind::InternalError,
        }
    }

    /// The message carried by the error, without the kind prefix.
    pub fn reason(&self) -> &str {
        match self {
            FruError::NotFound(s)
            | FruError::Conflict(s)
            | FruError::InvalidDescription(s)
            | FruError::Internal(s) => s,
        }
    }

    /// Convert into the wire payload.
    pub fn to_fault(&self) -> Fault {
        Fault {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

impl From<FruError> for Fault {
    fn from(err: FruError) -> Self {
        err.to_fault()
    }
}
