// node.rs — Declarative attribute/value tree.
//
// A Node is the interchange format for reactor descriptions, goals and
// observations: a tag, string attributes, and ordered children. It maps
// directly onto JSON (and TOML) through serde:
//
//   { "tag": "Goal",
//     "attributes": { "on": "state", "predicate": "At" },
//     "children": [ { "tag": "Variable", "attributes": { "name": "x" },
//                     "children": [ { "tag": "int", "attributes": { "value": "3" } } ] } ] }

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// One element of a description tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Element tag (e.g. "Goal", "Variable", "date", or a reactor kind).
    pub tag: String,

    /// Attributes, kept sorted so exported trees are stable.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,

    /// Child elements in document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl Node {
    /// Create a node with no attributes or children.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Set an attribute and return self.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Append a child and return self.
    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl ToString) {
        self.attributes.insert(key.into(), value.to_string());
    }

    pub fn push_child(&mut self, child: Node) {
        self.children.push(child);
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Get an attribute that must be present.
    pub fn require_attr(&self, key: &str) -> Result<&str, DomainError> {
        self.attr(key).ok_or_else(|| DomainError::MissingAttribute {
            node: self.tag.clone(),
            attribute: key.to_string(),
        })
    }

    /// Parse an optional attribute with `FromStr`.
    pub fn parse_attr<T>(&self, key: &str) -> Result<Option<T>, DomainError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.attr(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|e: T::Err| self.invalid_attr(key, raw, e)),
        }
    }

    /// Build an `InvalidAttribute` error for this node.
    pub fn invalid_attr(&self, key: &str, value: &str, reason: impl Display) -> DomainError {
        DomainError::InvalidAttribute {
            node: self.tag.clone(),
            attribute: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    /// First child with the given tag.
    pub fn child(&self, tag: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.tag == tag)
    }

    /// All children with the given tag.
    pub fn children_tagged<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter(move |c| c.tag == tag)
    }

    pub fn from_json(text: &str) -> Result<Self, DomainError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, DomainError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_and_accessors() {
        let node = Node::new("Relay")
            .with_attr("name", "relay-1")
            .with_attr("latency", 3)
            .with_child(Node::new("Timeline").with_attr("name", "state"));

        assert_eq!(node.attr("name"), Some("relay-1"));
        assert_eq!(node.parse_attr::<u32>("latency").unwrap(), Some(3));
        assert_eq!(node.parse_attr::<u32>("absent").unwrap(), None);
        assert_eq!(node.child("Timeline").unwrap().attr("name"), Some("state"));
        assert_eq!(node.children_tagged("Timeline").count(), 1);
    }

    #[test]
    fn missing_and_invalid_attributes_are_typed() {
        let node = Node::new("Relay").with_attr("latency", "soon");
        assert!(matches!(
            node.require_attr("name"),
            Err(DomainError::MissingAttribute { .. })
        ));
        assert!(matches!(
            node.parse_attr::<u32>("latency"),
            Err(DomainError::InvalidAttribute { .. })
        ));
    }

    #[test]
    fn json_omits_empty_collections() {
        let node = Node::new("int").with_attr("value", 4);
        let json = serde_json::to_string(&node).unwrap();
        assert!(!json.contains("children"));

        let restored = Node::from_json(&json).unwrap();
        assert_eq!(restored, node);
    }

    #[test]
    fn json_without_attributes_parses() {
        let node = Node::from_json(r#"{"tag": "bool"}"#).unwrap();
        assert_eq!(node.tag, "bool");
        assert!(node.attributes.is_empty());
    }
}
