//! Resolved schema model
//!
//! The query engine does not compile a schema language; it consumes a
//! resolved model describing the shape of the tree: containers, keyed
//! lists, leaves with optional default literals, leaf-lists,
//! namespaces, and config/state flags. Container existence is derived
//! from this model, not from the store, so a branch whose leaves are
//! all defaulted still exists for filter matching.

use crate::path::TreePath;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_true() -> bool {
    true
}

/// What kind of node a schema entry declares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SchemaKind {
    /// A container of named children.
    #[default]
    Container,
    /// A list of instances, each addressed by the value of its key leaf.
    List { key: String },
    /// A scalar leaf, optionally with a schema default.
    Leaf {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<String>,
    },
    /// An ordered multiset of scalar values under one name.
    LeafList,
}

/// One node of the resolved schema tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaNode {
    pub name: String,

    /// Namespace URI; inherited from the parent when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// False for state (non-configuration) nodes, which get-config
    /// excludes.
    #[serde(default = "default_true")]
    pub config: bool,

    #[serde(default)]
    pub kind: SchemaKind,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SchemaNode>,
}

impl SchemaNode {
    pub fn container(name: &str) -> Self {
        SchemaNode {
            name: name.to_string(),
            namespace: None,
            config: true,
            kind: SchemaKind::Container,
            children: Vec::new(),
        }
    }

    pub fn list(name: &str, key: &str) -> Self {
        SchemaNode {
            name: name.to_string(),
            namespace: None,
            config: true,
            kind: SchemaKind::List {
                key: key.to_string(),
            },
            children: Vec::new(),
        }
    }

    pub fn leaf(name: &str) -> Self {
        SchemaNode {
            name: name.to_string(),
            namespace: None,
            config: true,
            kind: SchemaKind::Leaf { default: None },
            children: Vec::new(),
        }
    }

    pub fn leaf_list(name: &str) -> Self {
        SchemaNode {
            name: name.to_string(),
            namespace: None,
            config: true,
            kind: SchemaKind::LeafList,
            children: Vec::new(),
        }
    }

    pub fn with_default(mut self, literal: &str) -> Self {
        self.kind = SchemaKind::Leaf {
            default: Some(literal.to_string()),
        };
        self
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }

    /// Mark the node (and everything beneath it) as state data.
    pub fn state(mut self) -> Self {
        self.config = false;
        self
    }

    pub fn child(mut self, node: SchemaNode) -> Self {
        self.children.push(node);
        self
    }

    pub fn find_child(&self, name: &str) -> Option<&SchemaNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn is_leafy(&self) -> bool {
        matches!(self.kind, SchemaKind::Leaf { .. } | SchemaKind::LeafList)
    }

    /// The default literal, for leaf nodes that declare one.
    pub fn default_literal(&self) -> Option<&str> {
        match &self.kind {
            SchemaKind::Leaf { default } => default.as_deref(),
            _ => None,
        }
    }

    /// The key leaf name, for lists.
    pub fn list_key(&self) -> Option<&str> {
        match &self.kind {
            SchemaKind::List { key } => Some(key.as_str()),
            _ => None,
        }
    }
}

/// A schema node resolved against a concrete data path.
#[derive(Debug, Clone, Copy)]
pub struct Resolved<'a> {
    pub node: &'a SchemaNode,
    /// Effective namespace after inheritance.
    pub namespace: &'a str,
    /// True when the node is the key leaf of its enclosing list.
    pub is_key: bool,
}

/// The resolved schema: a forest of module roots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub roots: Vec<SchemaNode>,
}

impl Schema {
    pub fn new(roots: Vec<SchemaNode>) -> Self {
        Schema { roots }
    }

    pub fn find_root(&self, name: &str) -> Option<&SchemaNode> {
        self.roots.iter().find(|r| r.name == name)
    }

    /// Resolve a data path against the schema.
    ///
    /// List-instance segments are consumed transparently: the segment
    /// after a list names the instance and stays on the list's child
    /// schema. Returns None if the path does not fit the model.
    pub fn resolve(&self, path: &TreePath) -> Option<Resolved<'_>> {
        let mut segments = path.segments().iter();
        let first = segments.next()?;
        let mut node = self.find_root(first)?;
        let mut namespace = node.namespace.as_deref().unwrap_or("");
        let mut is_key = false;

        while let Some(segment) = segments.next() {
            if let SchemaKind::List { key } = &node.kind {
                // This segment is the instance name; the next one (if
                // any) addresses within the instance.
                let instance_child = match segments.next() {
                    Some(child) => child,
                    None => {
                        // Path ends at the instance itself.
                        return Some(Resolved {
                            node,
                            namespace,
                            is_key: false,
                        });
                    }
                };
                let key = key.clone();
                node = node.find_child(instance_child)?;
                is_key = node.name == key;
            } else {
                node = node.find_child(segment)?;
                is_key = false;
            }
            if let Some(ns) = &node.namespace {
                namespace = ns;
            }
        }

        Some(Resolved {
            node,
            namespace,
            is_key,
        })
    }

    /// Convert a data path to its schema pattern path, with
    /// list-instance segments stripped: `interfaces/interface/eth0/mtu`
    /// becomes `interfaces/interface/mtu`.
    pub fn pattern_of(&self, path: &TreePath) -> Option<String> {
        let mut pattern = Vec::new();
        let mut segments = path.segments().iter();
        let first = segments.next()?;
        let mut node = self.find_root(first)?;
        pattern.push(node.name.as_str());

        while let Some(segment) = segments.next() {
            if matches!(node.kind, SchemaKind::List { .. }) {
                // Skip the instance segment.
                let child = match segments.next() {
                    Some(child) => child,
                    None => return Some(pattern.join("/")),
                };
                node = node.find_child(child)?;
            } else {
                node = node.find_child(segment)?;
            }
            pattern.push(node.name.as_str());
        }

        Some(pattern.join("/"))
    }

    /// Build the default-value table for every leaf in the model.
    pub fn default_table(&self) -> DefaultTable {
        let mut entries = HashMap::new();
        let mut stack: Vec<(Vec<String>, &SchemaNode)> = self
            .roots
            .iter()
            .map(|r| (vec![r.name.clone()], r))
            .collect();
        while let Some((pattern, node)) = stack.pop() {
            if let Some(literal) = node.default_literal() {
                entries.insert(pattern.join("/"), literal.to_string());
            }
            for child in &node.children {
                let mut next = pattern.clone();
                next.push(child.name.clone());
                stack.push((next, child));
            }
        }
        DefaultTable { entries }
    }
}

/// Path-pattern to default-literal lookup.
///
/// A default declared for `interfaces/interface/mtu` applies to every
/// instance `interfaces/interface/<name>/mtu`.
#[derive(Debug, Clone, Default)]
pub struct DefaultTable {
    entries: HashMap<String, String>,
}

impl DefaultTable {
    /// Look up the default literal, resolving the data path through
    /// list-instance segments via the schema.
    pub fn default_for(&self, schema: &Schema, path: &TreePath) -> Option<&str> {
        let pattern = schema.pattern_of(path)?;
        self.entries.get(&pattern).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
