use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("duplicate node id `{0}`")]
    DuplicateNodeId(String),
    #[error("node with empty id (name `{0}`)")]
    EmptyNodeId(String),
    #[error("duplicate edge id `{0}`")]
    DuplicateEdgeId(String),
    #[error("unknown node `{0}`")]
    UnknownNode(String),
    #[error("invalid diagram JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A system or subsystem block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
    #[serde(default)]
    pub color: String,
    #[serde(default, alias = "reqs")]
    pub req_count: u32,
}

impl Node {
    pub fn leaf(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            children: Vec::new(),
            color: String::new(),
            req_count: 0,
        }
    }

    pub fn with_children(id: &str, name: &str, children: Vec<Node>) -> Self {
        Self {
            children,
            ..Self::leaf(id, name)
        }
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

/// A directed interface between two blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    #[serde(alias = "sourceNodeId")]
    pub source: String,
    #[serde(alias = "targetNodeId")]
    pub target: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface_type: Option<String>,
    /// Attached data the engine carries but never reads.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Edge {
    pub fn new(id: &str, source: &str, target: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            name: name.to_string(),
            interface_type: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn type_key(&self) -> &str {
        self.interface_type.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagram {
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Diagram {
    pub fn from_json(input: &str) -> Result<Self, ModelError> {
        let diagram: Diagram = serde_json::from_str(input)?;
        diagram.validate()?;
        Ok(diagram)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        fn walk<'a>(nodes: &'a [Node], seen: &mut BTreeSet<&'a str>) -> Result<(), ModelError> {
            for node in nodes {
                if node.id.is_empty() {
                    return Err(ModelError::EmptyNodeId(node.name.clone()));
                }
                if !seen.insert(node.id.as_str()) {
                    return Err(ModelError::DuplicateNodeId(node.id.clone()));
                }
                walk(&node.children, seen)?;
            }
            Ok(())
        }
        let mut seen = BTreeSet::new();
        walk(&self.nodes, &mut seen)?;

        let mut edge_ids = BTreeSet::new();
        for edge in &self.edges {
            if !edge_ids.insert(edge.id.as_str()) {
                return Err(ModelError::DuplicateEdgeId(edge.id.clone()));
            }
        }
        Ok(())
    }

    /// Next free `INT-<n>` style id, one past the highest numeric suffix.
    pub fn next_edge_id(&self, prefix: &str) -> String {
        let max = self
            .edges
            .iter()
            .filter_map(|edge| edge.id.rsplit('-').next())
            .filter_map(|suffix| suffix.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        format!("{prefix}-{}", max + 1)
    }
}

/// Lookup tables derived from the static node tree. Built once per tree; the
/// tree does not change during a session.
#[derive(Debug, Clone)]
pub struct DiagramIndex {
    preorder: Vec<String>,
    parent: HashMap<String, String>,
    depth: HashMap<String, usize>,
    children: HashMap<String, Vec<String>>,
    descendants: HashMap<String, Vec<String>>,
    names: HashMap<String, String>,
    roots: Vec<String>,
}

impl DiagramIndex {
    pub fn new(nodes: &[Node]) -> Self {
        let mut index = Self {
            preorder: Vec::new(),
            parent: HashMap::new(),
            depth: HashMap::new(),
            children: HashMap::new(),
            descendants: HashMap::new(),
            names: HashMap::new(),
            roots: nodes.iter().map(|node| node.id.clone()).collect(),
        };
        for node in nodes {
            index.visit(node, None, 0);
        }
        index
    }

    fn visit(&mut self, node: &Node, parent: Option<&str>, depth: usize) -> Vec<String> {
        self.preorder.push(node.id.clone());
        if let Some(parent) = parent {
            self.parent.insert(node.id.clone(), parent.to_string());
        }
        self.depth.insert(node.id.clone(), depth);
        self.names.insert(node.id.clone(), node.name.clone());
        self.children.insert(
            node.id.clone(),
            node.children.iter().map(|child| child.id.clone()).collect(),
        );
        let mut below = Vec::new();
        for child in &node.children {
            below.push(child.id.clone());
            below.extend(self.visit(child, Some(&node.id), depth + 1));
        }
        self.descendants.insert(node.id.clone(), below.clone());
        below
    }

    pub fn contains(&self, id: &str) -> bool {
        self.depth.contains_key(id)
    }

    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Every node id, parents before children, siblings in input order.
    pub fn preorder(&self) -> &[String] {
        &self.preorder
    }

    pub fn parent(&self, id: &str) -> Option<&str> {
        self.parent.get(id).map(String::as_str)
    }

    pub fn depth(&self, id: &str) -> usize {
        self.depth.get(id).copied().unwrap_or(0)
    }

    pub fn name(&self, id: &str) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn children(&self, id: &str) -> &[String] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_children(&self, id: &str) -> bool {
        !self.children(id).is_empty()
    }

    /// All descendants of `id` in preorder, excluding `id` itself.
    pub fn descendants(&self, id: &str) -> &[String] {
        self.descendants.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(parent) = current {
            out.push(parent.to_string());
            current = self.parent(parent);
        }
        out
    }

    /// `id` itself or any of its descendants.
    pub fn in_subtree(&self, root: &str, id: &str) -> bool {
        if root == id {
            return true;
        }
        let mut current = self.parent(id);
        while let Some(parent) = current {
            if parent == root {
                return true;
            }
            current = self.parent(parent);
        }
        false
    }

    /// Every node that has children, usable as an "expand everything" set.
    pub fn containers(&self) -> BTreeSet<String> {
        self.preorder
            .iter()
            .filter(|id| self.has_children(id))
            .cloned()
            .collect()
    }
}
