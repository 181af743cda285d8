//! `frusvc-description` – turns description documents into node directives.
//!
//! A description document is the structured text a hardware-discovery
//! producer hands to the service when a FRU appears. The service only needs
//! it decomposed into [`NodeDescription`] directives; the
//! [`DescriptionParser`] trait is that seam, and [`JsonDescriptionParser`] is
//! the implementation used in production.
//!
//! # Document format
//!
//! Either a single node object or a non-empty array of them:
//!
//! ```json
//! {
//!   "name": "slot1",
//!   "properties": { "vendor": "acme", "present": true },
//!   "children": [ { "name": "dev0" }, { "name": "dev1" } ]
//! }
//! ```
//!
//! Validation happens entirely here, before the object tree is touched:
//! JSON syntax, field names, scalar-only properties, node names, sibling
//! uniqueness, and the [`DescriptionLimits`].

use std::collections::HashSet;

use frusvc_types::{FruError, NodeDescription, path};
use schemars::schema::RootSchema;
use schemars::schema_for;
use serde_json::Value;
use tracing::debug;

/// Default maximum nesting depth of a description (top-level nodes are at
/// depth 1).
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Default maximum number of nodes a single description may create.
pub const DEFAULT_MAX_NODES: usize = 4096;

/// Turns an opaque document into node-creation directives.
///
/// Implementations must reject the whole document on the first problem:
/// a returned directive list is always complete.
pub trait DescriptionParser: Send + Sync {
    fn parse(&self, document: &str) -> Result<Vec<NodeDescription>, FruError>;
}

/// Upper bounds applied to every parsed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptionLimits {
    pub max_depth: usize,
    pub max_nodes: usize,
}

impl Default for DescriptionLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_nodes: DEFAULT_MAX_NODES,
        }
    }
}

/// [`DescriptionParser`] for JSON documents.
#[derive(Debug, Clone, Default)]
pub struct JsonDescriptionParser {
    limits: DescriptionLimits,
}

impl JsonDescriptionParser {
    /// Parser with [`DescriptionLimits::default`].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: DescriptionLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> DescriptionLimits {
        self.limits
    }
}

impl DescriptionParser for JsonDescriptionParser {
    fn parse(&self, document: &str) -> Result<Vec<NodeDescription>, FruError> {
        let value: Value = serde_json::from_str(document)
            .map_err(|e| FruError::InvalidDescription(format!("not valid JSON: {e}")))?;

        let nodes = match value {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    decode_node(item).map_err(|e| {
                        FruError::InvalidDescription(format!("entry {i}: {e}"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            Value::Object(_) => vec![decode_node(value).map_err(FruError::InvalidDescription)?],
            other => {
                return Err(FruError::InvalidDescription(format!(
                    "expected an object or an array of objects, found {}",
                    json_type(&other)
                )));
            }
        };

        validate(&nodes, &self.limits)?;
        debug!(
            top_level = nodes.len(),
            total = nodes.iter().map(NodeDescription::node_count).sum::<usize>(),
            "description parsed"
        );
        Ok(nodes)
    }
}

/// Check directives that did not come through a parser (or re-check ones
/// that did) against the same rules a parsed document must satisfy.
///
/// # Errors
///
/// [`FruError::InvalidDescription`] naming the first offending node.
pub fn validate(nodes: &[NodeDescription], limits: &DescriptionLimits) -> Result<(), FruError> {
    if nodes.is_empty() {
        return Err(FruError::InvalidDescription(
            "description contains no nodes".into(),
        ));
    }

    let mut total = 0usize;
    // (siblings, depth, location of their parent)
    let mut pending: Vec<(&[NodeDescription], usize, String)> = vec![(nodes, 1, String::new())];

    while let Some((siblings, depth, parent)) = pending.pop() {
        if depth > limits.max_depth {
            return Err(FruError::InvalidDescription(format!(
                "nesting deeper than {} levels under '{parent}'",
                limits.max_depth
            )));
        }

        let mut names = HashSet::with_capacity(siblings.len());
        for node in siblings {
            let location = format!("{parent}/{}", node.name);
            path::validate_name(&node.name).map_err(|e| {
                FruError::InvalidDescription(format!("at '{location}': {}", e.reason()))
            })?;
            if !names.insert(node.name.as_str()) {
                return Err(FruError::InvalidDescription(format!(
                    "duplicate node name at '{location}'"
                )));
            }
            if node.properties.keys().any(String::is_empty) {
                return Err(FruError::InvalidDescription(format!(
                    "empty property key at '{location}'"
                )));
            }

            total += 1;
            if total > limits.max_nodes {
                return Err(FruError::InvalidDescription(format!(
                    "description creates more than {} nodes",
                    limits.max_nodes
                )));
            }

            if !node.children.is_empty() {
                pending.push((node.children.as_slice(), depth + 1, location));
            }
        }
    }
    Ok(())
}

/// JSON Schema of a single node directive, for producers that want to
/// validate documents before sending them.
pub fn description_schema() -> RootSchema {
    schema_for!(NodeDescription)
}

fn decode_node(value: Value) -> Result<NodeDescription, String> {
    serde_json::from_value(value).map_err(|e| e.to_string())
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frusvc_types::PropertyValue;

    fn parse(doc: &str) -> Result<Vec<NodeDescription>, FruError> {
        JsonDescriptionParser::new().parse(doc)
    }

    fn is_invalid(result: Result<Vec<NodeDescription>, FruError>) -> bool {
        matches!(result, Err(FruError::InvalidDescription(_)))
    }

    #[test]
    fn parses_single_nested_node() {
        let nodes = parse(
            r#"{"name": "slot1", "children": [{"name": "dev0"}, {"name": "dev1"}]}"#,
        )
        .unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name, "slot1");
        assert_eq!(nodes[0].children.len(), 2);
        assert_eq!(nodes[0].node_count(), 3);
    }

    #[test]
    fn parses_array_of_nodes() {
        let nodes = parse(r#"[{"name": "psu0"}, {"name": "psu1"}]"#).unwrap();
        let names: Vec<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["psu0", "psu1"]);
    }

    #[test]
    fn parses_scalar_properties() {
        let nodes = parse(
            r#"{"name": "fan0", "properties": {"rpm": 9000, "ok": true, "model": "x1", "load": 0.5}}"#,
        )
        .unwrap();
        let props = &nodes[0].properties;
        assert_eq!(props["rpm"], PropertyValue::Integer(9000));
        assert_eq!(props["ok"], PropertyValue::Bool(true));
        assert_eq!(props["model"], PropertyValue::Text("x1".into()));
        assert_eq!(props["load"], PropertyValue::Float(0.5));
    }

    #[test]
    fn u64_max_property_is_kept_exactly() {
        let nodes = parse(
            r#"{"name": "eeprom", "properties": {"serial": 18446744073709551615, "offset": -4}}"#,
        )
        .unwrap();
        let props = &nodes[0].properties;
        assert_eq!(props["serial"], PropertyValue::Unsigned(u64::MAX));
        assert_eq!(props["offset"], PropertyValue::Integer(-4));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(is_invalid(parse(r#"{"name": "slot1""#)));
        assert!(is_invalid(parse("")));
    }

    #[test]
    fn rejects_non_object_documents() {
        assert!(is_invalid(parse("42")));
        assert!(is_invalid(parse(r#""slot1""#)));
        assert!(is_invalid(parse("null")));
    }

    #[test]
    fn rejects_empty_array() {
        assert!(is_invalid(parse("[]")));
    }

    #[test]
    fn rejects_missing_name() {
        assert!(is_invalid(parse(r#"{"properties": {}}"#)));
    }

    #[test]
    fn rejects_non_scalar_property_deep_in_tree() {
        let doc = r#"{"name": "slot1", "children": [
            {"name": "dev0"},
            {"name": "dev1", "properties": {"bad": [1, 2]}}
        ]}"#;
        assert!(is_invalid(parse(doc)));
    }

    #[test]
    fn rejects_bad_name_in_array_entry() {
        let err = parse(r#"[{"name": "ok"}, {"name": "not/ok"}]"#).unwrap_err();
        assert!(err.to_string().contains("not/ok"));
    }

    #[test]
    fn rejects_duplicate_sibling_names() {
        let doc = r#"{"name": "slot1", "children": [{"name": "dev0"}, {"name": "dev0"}]}"#;
        let err = parse(doc).unwrap_err();
        assert!(matches!(err, FruError::InvalidDescription(ref m) if m.contains("/slot1/dev0")));
    }

    #[test]
    fn same_name_under_different_parents_is_fine() {
        let doc = r#"[{"name": "a", "children": [{"name": "dev0"}]},
                      {"name": "b", "children": [{"name": "dev0"}]}]"#;
        assert_eq!(parse(doc).unwrap().len(), 2);
    }

    #[test]
    fn enforces_depth_limit() {
        let parser = JsonDescriptionParser::with_limits(DescriptionLimits {
            max_depth: 2,
            max_nodes: 100,
        });
        assert!(parser.parse(r#"{"name": "a", "children": [{"name": "b"}]}"#).is_ok());
        let too_deep = r#"{"name": "a", "children": [{"name": "b", "children": [{"name": "c"}]}]}"#;
        assert!(is_invalid(parser.parse(too_deep)));
    }

    #[test]
    fn parser_reports_its_limits() {
        assert_eq!(JsonDescriptionParser::new().limits(), DescriptionLimits::default());
        let limits = DescriptionLimits {
            max_depth: 4,
            max_nodes: 16,
        };
        assert_eq!(JsonDescriptionParser::with_limits(limits).limits(), limits);
    }

    #[test]
    fn enforces_node_limit() {
        let parser = JsonDescriptionParser::with_limits(DescriptionLimits {
            max_depth: 8,
            max_nodes: 3,
        });
        assert!(parser.parse(r#"[{"name": "a"}, {"name": "b"}, {"name": "c"}]"#).is_ok());
        assert!(is_invalid(
            parser.parse(r#"[{"name": "a"}, {"name": "b"}, {"name": "c"}, {"name": "d"}]"#)
        ));
    }

    #[test]
    fn validate_rejects_empty_property_key() {
        let node = NodeDescription::leaf("slot1").with_property("", 1i64);
        assert!(matches!(
            validate(&[node], &DescriptionLimits::default()),
            Err(FruError::InvalidDescription(_))
        ));
    }

    #[test]
    fn schema_names_directive_fields() {
        let schema = serde_json::to_value(description_schema()).unwrap();
        let text = schema.to_string();
        assert!(text.contains("name"));
        assert!(text.contains("properties"));
        assert!(text.contains("children"));
    }
}
