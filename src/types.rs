use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};

/// One authored dialogue node, as produced by the external loader.
///
/// Matches the JSON node-record shape (`title` / `tags` / `body`); extra
/// fields in a record are ignored.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Node {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    pub body: String,
}

/// A loaded script: node titles mapped to their records.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(from = "Vec<Node>", into = "Vec<Node>")]
pub struct Document {
    nodes: HashMap<String, Node>,
}

impl Document {
    pub fn new() -> Self {
        Document::default()
    }

    /// Parse a document from the JSON array-of-records form.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Document(e.to_string()))
    }

    /// Insert a node, replacing any previous node with the same title.
    pub fn insert(&mut self, node: Node) -> Option<Node> {
        self.nodes.insert(node.title.clone(), node)
    }

    pub fn get(&self, title: &str) -> Option<&Node> {
        self.nodes.get(title)
    }

    pub fn contains(&self, title: &str) -> bool {
        self.nodes.contains_key(title)
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl From<Vec<Node>> for Document {
    fn from(records: Vec<Node>) -> Self {
        records.into_iter().collect()
    }
}

impl From<Document> for Vec<Node> {
    fn from(document: Document) -> Self {
        document.nodes.into_values().collect()
    }
}

impl FromIterator<Node> for Document {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        let mut document = Document::new();
        for node in iter {
            document.insert(node);
        }
        document
    }
}

/// One unit of output pulled from a running node.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Step {
    /// A rendered dialogue line.
    Text { text: String },
    /// A choice prompt; the run suspends until `select` picks one label.
    Options { options: Vec<String> },
    /// A command a registered handler chose to surface to the host.
    Command { command: CommandCall },
}

/// A `<<name args>>` statement, with the argument text kept raw.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CommandCall {
    pub name: String,
    pub args: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_from_json_records() {
        let doc = Document::from_json(
            r#"[
                {"title": "Start", "tags": "intro", "body": "Hello"},
                {"title": "End", "tags": "", "body": "Bye"}
            ]"#,
        )
        .expect("valid document");

        assert_eq!(doc.len(), 2);
        assert_eq!(doc.get("Start").map(|n| n.body.as_str()), Some("Hello"));
        assert_eq!(doc.get("End").map(|n| n.tags.as_deref()), Some(Some("")));
        assert!(!doc.contains("Middle"));
    }

    #[test]
    fn document_ignores_unknown_record_fields() {
        let doc = Document::from_json(
            r#"[{"title": "A", "body": "text", "position": {"x": 0, "y": 0}}]"#,
        )
        .expect("extra fields are ignored");
        assert!(doc.contains("A"));
    }

    #[test]
    fn document_rejects_malformed_json() {
        assert!(matches!(
            Document::from_json("{\"title\": \"not an array\"}"),
            Err(Error::Document(_))
        ));
    }

    #[test]
    fn step_serializes_tagged() {
        let step = Step::Options {
            options: vec!["a".to_string(), "b".to_string()],
        };
        let json = serde_json::to_value(&step).expect("serializable");
        assert_eq!(json["type"], "options");
        assert_eq!(json["options"][1], "b");
    }
}
