//! Selection filters
//!
//! Evaluates a selection filter against the schema, a store snapshot,
//! and the mount table, producing the set of selected paths with their
//! selector kinds, plus the branches that must be forwarded to remote
//! stores. The session layer parses wire XML or an xpath string into
//! the typed forms consumed here.

use crate::error::QueryError;
use crate::path::TreePath;
use crate::proxy::MountTable;
use crate::schema::{Schema, SchemaKind, SchemaNode};
use crate::store::Snapshot;
use serde::{Deserialize, Serialize};

/// One element of a subtree filter.
///
/// An empty element selects the node (and, for containers, everything
/// beneath it); an element with text restricts matching list instances
/// or leaf values; an empty leaf element among siblings selects just
/// that leaf.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FilterNode>,
}

impl FilterNode {
    pub fn new(name: &str) -> Self {
        FilterNode {
            name: name.to_string(),
            ..FilterNode::default()
        }
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn child(mut self, node: FilterNode) -> Self {
        self.children.push(node);
        self
    }

    /// Non-empty text content, if any. Empty text is treated the same
    /// as no text at all.
    fn text_value(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.is_empty())
    }

    fn namespace_matches(&self, effective: &str) -> bool {
        match self.namespace.as_deref() {
            // Unqualified filter elements match the ambient namespace.
            None => true,
            Some(ns) => ns == effective,
        }
    }
}

/// A parsed selection filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Subtree-shaped filter: the element trees below the filter
    /// element, possibly several roots.
    Subtree(Vec<FilterNode>),
    /// Slash-delimited path naming a node directly; selects that node
    /// and its whole subtree, wildcarded over list instances.
    Path(String),
}

/// How a selected path should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SelectorKind {
    /// The node and everything beneath it.
    FullSubtree,
    /// Just this leaf (siblings pruned, key leaves excepted).
    LeafOnly,
}

/// A selected path together with its selector kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Selection {
    pub path: TreePath,
    pub kind: SelectorKind,
}

/// A filter branch that crossed a mount point and must be answered by
/// the remote store behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBranch {
    /// The list path the remote subtree re-attaches under. The dispatch
    /// key segment is elided from the merged result.
    pub mount_point: TreePath,
    pub endpoint: String,
    /// Remainder of the filter below the mount.
    pub filter: Vec<FilterNode>,
}

/// The outcome of filter evaluation.
#[derive(Debug, Default)]
pub struct MatchOutcome {
    pub selections: Vec<Selection>,
    pub remote: Vec<RemoteBranch>,
}

impl MatchOutcome {
    fn select(&mut self, path: TreePath, kind: SelectorKind) {
        self.selections.push(Selection { path, kind });
    }

    fn finish(mut self) -> Self {
        // Stable order, and a FullSubtree selection supersedes a
        // LeafOnly one at the same path.
        self.selections.sort();
        self.selections.dedup_by(|b, a| a.path == b.path);
        self.remote.sort_by(|a, b| {
            (&a.mount_point, &a.endpoint).cmp(&(&b.mount_point, &b.endpoint))
        });
        self.remote.dedup();
        self
    }
}

/// Evaluates filters against one snapshot of the tree.
pub struct FilterMatcher<'a> {
    schema: &'a Schema,
    snapshot: &'a Snapshot,
    mounts: &'a MountTable,
}

impl<'a> FilterMatcher<'a> {
    pub fn new(schema: &'a Schema, snapshot: &'a Snapshot, mounts: &'a MountTable) -> Self {
        FilterMatcher {
            schema,
            snapshot,
            mounts,
        }
    }

    /// Evaluate a filter to its selected paths and remote branches.
    pub fn select(&self, filter: &Filter) -> Result<MatchOutcome, QueryError> {
        let mut out = MatchOutcome::default();
        match filter {
            Filter::Subtree(roots) => {
                for fnode in roots {
                    self.match_root(fnode, &mut out)?;
                }
            }
            Filter::Path(raw) => self.match_path(raw, &mut out)?,
        }
        self.add_covered_mounts(&mut out);
        Ok(out.finish())
    }

    /// Select every schema root in full, for filterless gets.
    pub fn select_all(&self) -> MatchOutcome {
        let mut out = MatchOutcome::default();
        for root in &self.schema.roots {
            out.select(
                TreePath::from_segments([root.name.as_str()]),
                SelectorKind::FullSubtree,
            );
        }
        self.add_covered_mounts(&mut out);
        out.finish()
    }

    /// A full-subtree selection above a mount point implicitly selects
    /// the whole mounted branch; forward it with an empty remainder.
    fn add_covered_mounts(&self, out: &mut MatchOutcome) {
        for mount in self.mounts.iter() {
            if mount.prefix.len() < 2 {
                continue;
            }
            let mount_point = mount.prefix.parent();
            let covered = out.selections.iter().any(|s| {
                s.kind == SelectorKind::FullSubtree && mount.prefix.starts_with(&s.path)
            });
            let already = out
                .remote
                .iter()
                .any(|b| b.mount_point == mount_point && b.endpoint == mount.endpoint);
            if covered && !already {
                out.remote.push(RemoteBranch {
                    mount_point,
                    endpoint: mount.endpoint.clone(),
                    filter: Vec::new(),
                });
            }
        }
    }

    fn match_root(&self, fnode: &FilterNode, out: &mut MatchOutcome) -> Result<(), QueryError> {
        let root = match self.schema.find_root(&fnode.name) {
            Some(root) => root,
            // Unknown filter elements select nothing.
            None => return Ok(()),
        };
        let namespace = root.namespace.as_deref().unwrap_or("");
        if !fnode.namespace_matches(namespace) {
            return Ok(());
        }
        let path = TreePath::from_segments([root.name.as_str()]);
        self.match_node(root, namespace, path, fnode, out)
    }

    fn match_node(
        &self,
        snode: &SchemaNode,
        namespace: &str,
        path: TreePath,
        fnode: &FilterNode,
        out: &mut MatchOutcome,
    ) -> Result<(), QueryError> {
        match &snode.kind {
            SchemaKind::Leaf { .. } => {
                match fnode.text_value() {
                    // Content match: select the leaf iff the stored
                    // value equals the filter text.
                    Some(text) => {
                        if self.snapshot.value(&path) == Some(text) {
                            out.select(path, SelectorKind::LeafOnly);
                        }
                    }
                    None => out.select(path, SelectorKind::LeafOnly),
                }
                Ok(())
            }
            SchemaKind::LeafList => {
                match fnode.text_value() {
                    Some(text) => {
                        if self.snapshot.children(&path).iter().any(|v| v == text) {
                            out.select(path, SelectorKind::LeafOnly);
                        }
                    }
                    None => out.select(path, SelectorKind::LeafOnly),
                }
                Ok(())
            }
            SchemaKind::Container => {
                if fnode.children.is_empty() {
                    out.select(path, SelectorKind::FullSubtree);
                    return Ok(());
                }
                for child in &fnode.children {
                    if let Some(csnode) = snode.find_child(&child.name) {
                        let cns = csnode.namespace.as_deref().unwrap_or(namespace);
                        if !child.namespace_matches(cns) {
                            continue;
                        }
                        self.match_node(csnode, cns, path.join(&csnode.name), child, out)?;
                    }
                }
                Ok(())
            }
            SchemaKind::List { key } => {
                if fnode.children.is_empty() {
                    out.select(path, SelectorKind::FullSubtree);
                    return Ok(());
                }
                self.match_list(snode, key, namespace, path, fnode, out)
            }
        }
    }

    /// Restrict list instances by any key match, then prune leaves
    /// within the survivors per the remaining selectors.
    fn match_list(
        &self,
        snode: &SchemaNode,
        key: &str,
        namespace: &str,
        list_path: TreePath,
        fnode: &FilterNode,
        out: &mut MatchOutcome,
    ) -> Result<(), QueryError> {
        let mut key_restriction: Option<&str> = None;
        let mut predicates: Vec<(&SchemaNode, &str)> = Vec::new();
        let mut selectors: Vec<&SchemaNode> = Vec::new();
        let mut deeper: Vec<(&SchemaNode, &FilterNode)> = Vec::new();

        for child in &fnode.children {
            let csnode = match snode.find_child(&child.name) {
                Some(csnode) => csnode,
                None => continue,
            };
            let cns = csnode.namespace.as_deref().unwrap_or(namespace);
            if !child.namespace_matches(cns) {
                continue;
            }
            if csnode.is_leafy() {
                match child.text_value() {
                    Some(text) if csnode.name == key => key_restriction = Some(text),
                    Some(text) => predicates.push((csnode, text)),
                    None => selectors.push(csnode),
                }
            } else {
                deeper.push((csnode, child));
            }
        }

        let mut instances = self.snapshot.children(&list_path);
        for (dispatch, _) in self.mounts.dispatch_keys(&list_path) {
            if !instances.contains(&dispatch) {
                instances.push(dispatch);
            }
        }
        instances.sort();

        for instance in instances {
            if let Some(expected) = key_restriction {
                if instance != expected {
                    continue;
                }
            }
            let instance_path = list_path.join(&instance);

            if let Some(endpoint) = self.mounts.endpoint_at(&instance_path) {
                // The dispatch key routed us to a remote store; forward
                // everything except the key restriction itself.
                let remainder: Vec<FilterNode> = fnode
                    .children
                    .iter()
                    .filter(|c| !(c.name == key && c.text_value().is_some()))
                    .cloned()
                    .collect();
                out.remote.push(RemoteBranch {
                    mount_point: list_path.clone(),
                    endpoint: endpoint.to_string(),
                    filter: remainder,
                });
                continue;
            }

            let matches = predicates.iter().all(|(leaf, text)| match leaf.kind {
                SchemaKind::LeafList => self
                    .snapshot
                    .children(&instance_path.join(&leaf.name))
                    .iter()
                    .any(|v| v == *text),
                _ => self.snapshot.value(&instance_path.join(&leaf.name)) == Some(*text),
            });
            if !matches {
                continue;
            }

            if selectors.is_empty() && deeper.is_empty() {
                out.select(instance_path, SelectorKind::FullSubtree);
                continue;
            }

            // The key leaf is always part of a selected instance.
            out.select(instance_path.join(key), SelectorKind::LeafOnly);
            for leaf in &selectors {
                if leaf.name != key {
                    out.select(instance_path.join(&leaf.name), SelectorKind::LeafOnly);
                }
            }
            for (csnode, child) in &deeper {
                let cns = csnode.namespace.as_deref().unwrap_or(namespace);
                self.match_node(
                    csnode,
                    cns,
                    instance_path.join(&csnode.name),
                    child,
                    out,
                )?;
            }
        }
        Ok(())
    }

    fn match_path(&self, raw: &str, out: &mut MatchOutcome) -> Result<(), QueryError> {
        if !raw.starts_with('/') {
            return Err(QueryError::MalformedFilter(format!(
                "path filter must be absolute: {:?}",
                raw
            )));
        }
        let trimmed = raw.trim_end_matches('/');
        if trimmed.is_empty() {
            // "/" selects the whole tree.
            for root in &self.schema.roots {
                out.select(
                    TreePath::from_segments([root.name.as_str()]),
                    SelectorKind::FullSubtree,
                );
            }
            return Ok(());
        }
        let segments: Vec<&str> = trimmed[1..].split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(QueryError::MalformedFilter(format!(
                "empty segment in path filter: {:?}",
                raw
            )));
        }

        let first = segments[0];
        if first == "*" {
            if segments.len() > 1 {
                return Err(QueryError::MalformedFilter(
                    "wildcard must be the final path segment".to_string(),
                ));
            }
            for root in &self.schema.roots {
                out.select(
                    TreePath::from_segments([root.name.as_str()]),
                    SelectorKind::FullSubtree,
                );
            }
            return Ok(());
        }
        let root = self.schema.find_root(first).ok_or_else(|| {
            QueryError::MalformedFilter(format!("unknown element {:?} in path filter", first))
        })?;
        let path = TreePath::from_segments([root.name.as_str()]);
        self.expand_path(root, path, &segments[1..], out)
    }

    fn expand_path(
        &self,
        snode: &SchemaNode,
        path: TreePath,
        segments: &[&str],
        out: &mut MatchOutcome,
    ) -> Result<(), QueryError> {
        let Some(&segment) = segments.first() else {
            let kind = if snode.is_leafy() {
                SelectorKind::LeafOnly
            } else {
                SelectorKind::FullSubtree
            };
            out.select(path, kind);
            return Ok(());
        };

        if segment == "*" {
            if segments.len() > 1 {
                return Err(QueryError::MalformedFilter(
                    "wildcard must be the final path segment".to_string(),
                ));
            }
            // A trailing wildcard selects everything beneath, which is
            // the node's full subtree.
            return self.expand_path(snode, path, &[], out);
        }

        match &snode.kind {
            SchemaKind::Container => {
                let child = snode.find_child(segment).ok_or_else(|| {
                    QueryError::MalformedFilter(format!(
                        "unknown element {:?} in path filter",
                        segment
                    ))
                })?;
                self.expand_path(child, path.join(segment), &segments[1..], out)
            }
            SchemaKind::List { key } => {
                // Path filters carry no key restriction: wildcard over
                // every instance present in the tree.
                let child = snode.find_child(segment).ok_or_else(|| {
                    QueryError::MalformedFilter(format!(
                        "unknown element {:?} in path filter",
                        segment
                    ))
                })?;
                for instance in self.snapshot.children(&path) {
                    let instance_path = path.join(&instance);
                    out.select(instance_path.join(key), SelectorKind::LeafOnly);
                    self.expand_path(
                        child,
                        instance_path.join(segment),
                        &segments[1..],
                        out,
                    )?;
                }
                Ok(())
            }
            SchemaKind::Leaf { .. } | SchemaKind::LeafList => Err(QueryError::MalformedFilter(
                format!("element {:?} below a leaf in path filter", segment),
            )),
        }
    }
}
