//! Defaults-aware rendering
//!
//! Turns the selected paths from filter matching into a result tree,
//! resolving every leaf through the default table and applying the
//! requested disclosure mode to decide what is included.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::filter::{MatchOutcome, SelectorKind};
use crate::path::TreePath;
use crate::schema::{DefaultTable, Schema, SchemaKind, SchemaNode};
use crate::store::{Snapshot, ValueState};

/// How defaulted leaves are disclosed in the result.
///
/// Without an explicit mode the result carries only what was written,
/// which is the `Explicit` behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WithDefaults {
    /// Every leaf with an effective value, written or defaulted.
    ReportAll,
    /// Only values that differ from the schema default.
    Trim,
    /// Only explicitly written values, even when equal to the default.
    #[default]
    Explicit,
}

impl WithDefaults {
    /// Parse a wire-level mode string. Anything outside the supported
    /// set is rejected, including the tagged reporting extension.
    pub fn parse(mode: &str) -> Result<Self, QueryError> {
        match mode {
            "report-all" => Ok(WithDefaults::ReportAll),
            "trim" => Ok(WithDefaults::Trim),
            "explicit" => Ok(WithDefaults::Explicit),
            other => Err(QueryError::UnsupportedMode(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WithDefaults::ReportAll => "report-all",
            WithDefaults::Trim => "trim",
            WithDefaults::Explicit => "explicit",
        }
    }
}

impl fmt::Display for WithDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One element of a rendered result tree.
///
/// `namespace` is set only where the element introduces a namespace
/// different from its parent, mirroring where an xmlns declaration
/// would appear on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DataNode>,
}

impl DataNode {
    pub fn element(name: &str) -> Self {
        DataNode {
            name: name.to_string(),
            ..DataNode::default()
        }
    }

    pub fn leaf(name: &str, value: &str) -> Self {
        DataNode {
            name: name.to_string(),
            value: Some(value.to_string()),
            ..DataNode::default()
        }
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }

    pub fn child(mut self, node: DataNode) -> Self {
        self.children.push(node);
        self
    }
}

/// Selections folded into a trie so rendering can walk the schema in
/// declaration order while honoring per-path selectors.
#[derive(Debug, Default)]
struct SelectionTrie {
    kind: Option<SelectorKind>,
    children: BTreeMap<String, SelectionTrie>,
}

impl SelectionTrie {
    fn build(outcome: &MatchOutcome) -> Self {
        let mut root = SelectionTrie::default();
        for selection in &outcome.selections {
            let mut node = &mut root;
            for segment in selection.path.segments() {
                node = node.children.entry(segment.clone()).or_default();
            }
            // FullSubtree covers everything LeafOnly would.
            node.kind = match (node.kind, selection.kind) {
                (Some(SelectorKind::FullSubtree), _) | (_, SelectorKind::FullSubtree) => {
                    Some(SelectorKind::FullSubtree)
                }
                _ => Some(SelectorKind::LeafOnly),
            };
        }
        root
    }
}

/// Renders selections into result subtrees under one disclosure mode.
pub struct DefaultsRenderer<'a> {
    schema: &'a Schema,
    snapshot: &'a Snapshot,
    defaults: &'a DefaultTable,
    mode: WithDefaults,
    config_only: bool,
}

impl<'a> DefaultsRenderer<'a> {
    pub fn new(
        schema: &'a Schema,
        snapshot: &'a Snapshot,
        defaults: &'a DefaultTable,
        mode: WithDefaults,
        config_only: bool,
    ) -> Self {
        DefaultsRenderer {
            schema,
            snapshot,
            defaults,
            mode,
            config_only,
        }
    }

    /// Render the selected paths as top-level result elements, in
    /// schema declaration order.
    pub fn render(&self, outcome: &MatchOutcome) -> Vec<DataNode> {
        let trie = SelectionTrie::build(outcome);
        let mut rendered = Vec::new();
        for root in &self.schema.roots {
            if let Some(sub) = trie.children.get(&root.name) {
                let path = TreePath::from_segments([root.name.as_str()]);
                rendered.extend(self.render_node(root, "", &path, sub, false));
            }
        }
        rendered
    }

    fn render_node(
        &self,
        snode: &SchemaNode,
        inherited_ns: &str,
        path: &TreePath,
        trie: &SelectionTrie,
        is_key: bool,
    ) -> Vec<DataNode> {
        if self.config_only && !snode.config {
            return Vec::new();
        }
        if trie.kind == Some(SelectorKind::FullSubtree) {
            return self.render_subtree(snode, inherited_ns, path, is_key, true);
        }
        let own_ns = snode.namespace.as_deref().unwrap_or(inherited_ns);
        match &snode.kind {
            SchemaKind::Leaf { .. } => self.render_leaf(snode, inherited_ns, path, is_key),
            SchemaKind::LeafList => self.render_leaf_list(snode, inherited_ns, path),
            SchemaKind::Container => {
                let mut children = Vec::new();
                for csnode in &snode.children {
                    if let Some(sub) = trie.children.get(&csnode.name) {
                        children.extend(self.render_node(
                            csnode,
                            own_ns,
                            &path.join(&csnode.name),
                            sub,
                            false,
                        ));
                    }
                }
                if children.is_empty() {
                    return Vec::new();
                }
                let mut node = self.element(snode, inherited_ns);
                node.children = children;
                vec![node]
            }
            SchemaKind::List { key } => {
                let mut rendered = Vec::new();
                for (instance, sub) in &trie.children {
                    let instance_path = path.join(instance);
                    if sub.kind == Some(SelectorKind::FullSubtree) {
                        rendered.extend(self.render_instance(
                            snode,
                            key,
                            inherited_ns,
                            &instance_path,
                            instance,
                        ));
                        continue;
                    }
                    let mut children = Vec::new();
                    for csnode in &snode.children {
                        if let Some(csub) = sub.children.get(&csnode.name) {
                            children.extend(self.render_node(
                                csnode,
                                own_ns,
                                &instance_path.join(&csnode.name),
                                csub,
                                csnode.name == *key,
                            ));
                        }
                    }
                    if !children.is_empty() {
                        let mut node = self.element(snode, inherited_ns);
                        node.children = children;
                        rendered.push(node);
                    }
                }
                rendered
            }
        }
    }

    /// Render a full subtree beneath a selected node. `selected` keeps
    /// the element even when every leaf below it is suppressed.
    fn render_subtree(
        &self,
        snode: &SchemaNode,
        inherited_ns: &str,
        path: &TreePath,
        is_key: bool,
        selected: bool,
    ) -> Vec<DataNode> {
        if self.config_only && !snode.config {
            return Vec::new();
        }
        let own_ns = snode.namespace.as_deref().unwrap_or(inherited_ns);
        match &snode.kind {
            SchemaKind::Leaf { .. } => self.render_leaf(snode, inherited_ns, path, is_key),
            SchemaKind::LeafList => self.render_leaf_list(snode, inherited_ns, path),
            SchemaKind::Container => {
                let mut children = Vec::new();
                for csnode in &snode.children {
                    children.extend(self.render_subtree(
                        csnode,
                        own_ns,
                        &path.join(&csnode.name),
                        false,
                        false,
                    ));
                }
                if children.is_empty() && !selected {
                    return Vec::new();
                }
                let mut node = self.element(snode, inherited_ns);
                node.children = children;
                vec![node]
            }
            SchemaKind::List { key } => {
                let mut rendered = Vec::new();
                for instance in self.snapshot.children(path) {
                    rendered.extend(self.render_instance(
                        snode,
                        key,
                        inherited_ns,
                        &path.join(&instance),
                        &instance,
                    ));
                }
                rendered
            }
        }
    }

    /// One list instance, key leaf first in schema order, with every
    /// other child rendered per the mode.
    fn render_instance(
        &self,
        snode: &SchemaNode,
        key: &str,
        inherited_ns: &str,
        instance_path: &TreePath,
        instance: &str,
    ) -> Vec<DataNode> {
        let own_ns = snode.namespace.as_deref().unwrap_or(inherited_ns);
        let mut children = Vec::new();
        for csnode in &snode.children {
            if csnode.name == key {
                let mut node = self.element(csnode, own_ns);
                node.value = Some(instance.to_string());
                children.push(node);
            } else {
                children.extend(self.render_subtree(
                    csnode,
                    own_ns,
                    &instance_path.join(&csnode.name),
                    false,
                    false,
                ));
            }
        }
        let mut node = self.element(snode, inherited_ns);
        node.children = children;
        vec![node]
    }

    fn render_leaf(
        &self,
        snode: &SchemaNode,
        inherited_ns: &str,
        path: &TreePath,
        is_key: bool,
    ) -> Vec<DataNode> {
        if is_key {
            // The key is the instance segment and is never suppressed.
            let parent = path.parent();
            let Some(instance) = parent.last().map(str::to_string) else {
                return Vec::new();
            };
            let mut node = self.element(snode, inherited_ns);
            node.value = Some(instance);
            return vec![node];
        }
        let default = self.defaults.default_for(self.schema, path);
        let value = match self.snapshot.get(path) {
            ValueState::Explicit(v) => match self.mode {
                WithDefaults::Trim if default == Some(v.as_str()) => return Vec::new(),
                _ => v,
            },
            ValueState::Absent => match (self.mode, default) {
                (WithDefaults::ReportAll, Some(d)) => d.to_string(),
                _ => return Vec::new(),
            },
        };
        let mut node = self.element(snode, inherited_ns);
        node.value = Some(value);
        vec![node]
    }

    /// Leaf-list entries are an ordered multiset of explicit values;
    /// defaults never apply, so every mode renders them all.
    fn render_leaf_list(
        &self,
        snode: &SchemaNode,
        inherited_ns: &str,
        path: &TreePath,
    ) -> Vec<DataNode> {
        self.snapshot
            .children(path)
            .into_iter()
            .map(|value| {
                let mut node = self.element(snode, inherited_ns);
                node.value = Some(value);
                node
            })
            .collect()
    }

    fn element(&self, snode: &SchemaNode, inherited_ns: &str) -> DataNode {
        let mut node = DataNode::element(&snode.name);
        match snode.namespace.as_deref() {
            Some(ns) if ns != inherited_ns => node.namespace = Some(ns.to_string()),
            _ => {}
        }
        node
    }
}
