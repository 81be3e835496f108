use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::error::ExplorerError;

/// Attributes tried, in order, when resolving a node's display label.
const LABEL_PRIORITY: [&str; 4] = ["title", "name", "text", "canonical_name"];

/// Composite node identity. Ids are only unique within a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey {
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
}

impl NodeKey {
    pub fn new(node_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node_type, self.id)
    }
}

impl FromStr for NodeKey {
    type Err = ExplorerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((node_type, id)) if !node_type.trim().is_empty() && !id.trim().is_empty() => {
                Ok(NodeKey::new(node_type.trim(), id.trim()))
            }
            _ => Err(ExplorerError::InvalidNodeKey(s.to_string())),
        }
    }
}

/// Ids arrive as strings or numbers depending on the backing table.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "node id must be a string or number, got {}",
            other
        ))),
    }
}

/// A typed graph entity with arbitrary scalar/array attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(flatten)]
    pub attrs: Map<String, Value>,
}

impl Node {
    pub fn new(node_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            id: id.into(),
            attrs: Map::new(),
        }
    }

    /// Builder-style attribute setter
    #[cfg(test)]
    pub fn with_attr(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }

    pub fn key(&self) -> NodeKey {
        NodeKey::new(self.node_type.clone(), self.id.clone())
    }

    /// Display label: title, name, text, canonical name, then the raw id.
    pub fn label(&self) -> String {
        LABEL_PRIORITY
            .iter()
            .filter_map(|attr| self.attrs.get(*attr))
            .filter_map(|value| match value {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            })
            .next()
            .unwrap_or_else(|| self.id.clone())
    }

    /// Topic the node was collected under, if the provider tagged one.
    pub fn topic_scope(&self) -> Option<String> {
        self.attrs
            .get("topic_scope")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from)
    }
}

/// A typed, optionally labeled relation between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeKey,
    pub to: NodeKey,
    #[serde(rename = "type", default)]
    pub edge_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
}

impl Edge {
    pub fn new(from: NodeKey, to: NodeKey, edge_type: impl Into<String>) -> Self {
        Self {
            from,
            to,
            edge_type: edge_type.into(),
            predicate: None,
        }
    }

    #[cfg(test)]
    pub fn with_predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }

    pub fn relation(&self) -> &str {
        if self.edge_type.is_empty() {
            "related"
        } else {
            &self.edge_type
        }
    }

    /// Predicate when present, otherwise the relation type.
    pub fn label(&self) -> &str {
        self.predicate
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| self.relation())
    }
}

/// Raw payload handed over by a graph source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphData {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

/// The merged dataset of one view session.
///
/// Node keys are unique (last write wins); duplicate edges collapse.
/// Every mutation bumps `revision`, which downstream caches key on.
#[derive(Debug, Default)]
pub struct GraphStore {
    nodes: Vec<Node>,
    node_index: HashMap<NodeKey, usize>,
    edges: Vec<Edge>,
    edge_set: HashSet<Edge>,
    revision: u64,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn from_data(data: GraphData) -> Self {
        let mut store = Self::new();
        store.merge(data);
        store
    }

    /// Install a fresh fetch result, dropping previous nodes and edges.
    pub fn replace(&mut self, data: GraphData) {
        self.nodes.clear();
        self.node_index.clear();
        self.edges.clear();
        self.edge_set.clear();
        self.merge(data);
    }

    /// Append a fetch result to the current dataset.
    pub fn merge(&mut self, data: GraphData) {
        for node in data.nodes {
            let key = node.key();
            match self.node_index.get(&key) {
                Some(&idx) => self.nodes[idx] = node,
                None => {
                    self.node_index.insert(key, self.nodes.len());
                    self.nodes.push(node);
                }
            }
        }

        for edge in data.edges {
            if self.edge_set.insert(edge.clone()) {
                self.edges.push(edge);
            }
        }

        self.revision += 1;
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn get(&self, key: &NodeKey) -> Option<&Node> {
        self.node_index.get(key).map(|&idx| &self.nodes[idx])
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}
