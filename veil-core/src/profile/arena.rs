//! Owned arena holding a parsed profile document
//!
//! Every node lives in one `Vec<Node>` and refers to its children by index,
//! so memoized lookups can store plain `NodeId`s without borrowing.

use std::collections::BTreeMap;

use serde_json::{Map, Number, Value};

/// Index of a node inside a [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// The document root is always allocated first
    pub const ROOT: NodeId = NodeId(0);

    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<NodeId>),
    Object(BTreeMap<String, NodeId>),
}

impl Node {
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Null => "null",
            Node::Bool(_) => "boolean",
            Node::Number(_) => "number",
            Node::String(_) => "string",
            Node::Array(_) => "array",
            Node::Object(_) => "object",
        }
    }
}

/// Flattened, immutable document tree
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    pub fn from_value(value: &Value) -> Self {
        let mut doc = Document { nodes: Vec::new() };
        doc.insert(value);
        doc
    }

    fn insert(&mut self, value: &Value) -> NodeId {
        // Reserve the slot before descending so parents precede children.
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::Null);

        let node = match value {
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Bool(*b),
            Value::Number(n) => Node::Number(n.clone()),
            Value::String(s) => Node::String(s.clone()),
            Value::Array(items) => Node::Array(items.iter().map(|v| self.insert(v)).collect()),
            Value::Object(map) => Node::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.insert(v)))
                    .collect(),
            ),
        };
        self.nodes[id.index()] = node;
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn root(&self) -> &Node {
        self.node(NodeId::ROOT)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Child of a map node. Non-map parents have no children by key.
    pub fn child(&self, parent: NodeId, key: &str) -> Option<NodeId> {
        match self.node(parent) {
            Node::Object(map) => map.get(key).copied(),
            _ => None,
        }
    }

    pub fn to_value(&self, id: NodeId) -> Value {
        match self.node(id) {
            Node::Null => Value::Null,
            Node::Bool(b) => Value::Bool(*b),
            Node::Number(n) => Value::Number(n.clone()),
            Node::String(s) => Value::String(s.clone()),
            Node::Array(items) => Value::Array(items.iter().map(|c| self.to_value(*c)).collect()),
            Node::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (k, c) in map {
                    out.insert(k.clone(), self.to_value(*c));
                }
                Value::Object(out)
            }
        }
    }

    pub fn get(&self, id: NodeId) -> NodeRef<'_> {
        NodeRef { doc: self, id }
    }
}

/// Borrowed view of one node, valid for as long as its document
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    doc: &'a Document,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn node(&self) -> &'a Node {
        self.doc.node(self.id)
    }

    pub fn kind(&self) -> &'static str {
        self.node().kind()
    }

    pub fn is_null(&self) -> bool {
        matches!(self.node(), Node::Null)
    }

    pub fn as_str(&self) -> Option<&'a str> {
        match self.node() {
            Node::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.node() {
            Node::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self.node() {
            Node::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.node() {
            Node::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// Child by key when this node is a map
    pub fn get(&self, key: &str) -> Option<NodeRef<'a>> {
        self.doc.child(self.id, key).map(|id| self.doc.get(id))
    }

    /// Elements when this node is an array
    pub fn elements(&self) -> Option<impl Iterator<Item = NodeRef<'a>> + 'a> {
        let doc = self.doc;
        match self.node() {
            Node::Array(items) => Some(items.iter().map(move |id| doc.get(*id))),
            _ => None,
        }
    }

    /// Keys when this node is a map
    pub fn keys(&self) -> Option<impl Iterator<Item = &'a str> + 'a> {
        match self.node() {
            Node::Object(map) => Some(map.keys().map(|k| k.as_str())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        self.doc.to_value(self.id)
    }
}

impl std::fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .finish()
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.doc, other.doc) && self.id == other.id
    }
}
