//! Path addressing for the configuration tree
//!
//! Every node in the datastore is identified by an ordered sequence of
//! segments. Paths parse from the slash-delimited form used on the wire
//! ("/interfaces/interface/eth0/mtu") and order lexicographically by
//! segment, which is also the store's iteration order.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An absolute path into the configuration tree.
///
/// The empty path addresses the tree root.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TreePath(Vec<String>);

impl TreePath {
    /// The tree root.
    pub fn root() -> Self {
        TreePath(Vec::new())
    }

    /// Build a path from owned segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TreePath(segments.into_iter().map(Into::into).collect())
    }

    /// Parse a slash-delimited absolute path.
    ///
    /// A single "/" is the root. Empty segments ("//") are rejected; a
    /// trailing slash is tolerated.
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        if !raw.starts_with('/') {
            return Err(StoreError::InvalidPath(format!(
                "path must be absolute: {:?}",
                raw
            )));
        }
        let trimmed = raw.trim_end_matches('/');
        if trimmed.is_empty() {
            return Ok(TreePath::root());
        }
        let mut segments = Vec::new();
        for segment in trimmed[1..].split('/') {
            if segment.is_empty() {
                return Err(StoreError::InvalidPath(format!(
                    "empty segment in path: {:?}",
                    raw
                )));
            }
            segments.push(segment.to_string());
        }
        Ok(TreePath(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Return a new path with one more segment appended.
    pub fn join(&self, segment: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        TreePath(segments)
    }

    /// The path with the final segment removed; root if already root.
    pub fn parent(&self) -> Self {
        let mut segments = self.0.clone();
        segments.pop();
        TreePath(segments)
    }

    pub fn starts_with(&self, prefix: &TreePath) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }

    /// Segments remaining below `prefix`, or None if this path is not
    /// under it.
    pub fn strip_prefix(&self, prefix: &TreePath) -> Option<TreePath> {
        if self.starts_with(prefix) {
            Some(TreePath(self.0[prefix.0.len()..].to_vec()))
        } else {
            None
        }
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.0 {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}
