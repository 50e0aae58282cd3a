//! TreeStore
//!
//! In-memory hierarchical key-value tree holding explicitly written
//! leaf values. The map is immutable and swapped atomically on write,
//! so every query reads one consistent snapshot for its whole duration
//! while writes stay serialized behind the lock.
//!
//! Writing the empty string is defined as clearing: a leaf can never
//! hold an explicit empty value, it simply returns to the absent state
//! and its schema default (if any) takes over.

use crate::error::StoreError;
use crate::path::TreePath;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Whether a leaf was ever written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueState {
    /// Never written; the effective value is the schema default, if one
    /// exists.
    Absent,
    /// Written with this value, even when it happens to equal the
    /// default.
    Explicit(String),
}

type Leaves = BTreeMap<TreePath, String>;

/// The writable datastore.
#[derive(Debug, Default)]
pub struct TreeStore {
    leaves: RwLock<Arc<Leaves>>,
}

impl TreeStore {
    pub fn new() -> Self {
        TreeStore::default()
    }

    /// Capture a consistent read-only view of the tree.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            leaves: Arc::clone(&self.leaves.read()),
        }
    }

    /// Write a leaf value. An empty literal is equivalent to `clear`.
    pub fn write(&self, path: &TreePath, literal: &str) -> Result<(), StoreError> {
        if path.is_empty() {
            return Err(StoreError::InvalidPath(
                "cannot write to the tree root".to_string(),
            ));
        }
        let mut guard = self.leaves.write();
        let mut next = (**guard).clone();
        if literal.is_empty() {
            next.remove(path);
        } else {
            next.insert(path.clone(), literal.to_string());
        }
        *guard = Arc::new(next);
        Ok(())
    }

    /// Reset a leaf to the absent state. Clearing a leaf that was never
    /// written is a no-op, not an error.
    pub fn clear(&self, path: &TreePath) -> Result<(), StoreError> {
        self.write(path, "")
    }

    /// Remove every leaf at or below a prefix. Exposed for the edit
    /// collaborator's subtree delete.
    pub fn prune(&self, prefix: &TreePath) {
        let mut guard = self.leaves.write();
        let mut next = (**guard).clone();
        next.retain(|path, _| !path.starts_with(prefix));
        *guard = Arc::new(next);
    }

    /// Bulk-load fixture data.
    pub fn load<'a, I>(&self, entries: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (path, literal) in entries {
            self.write(&TreePath::parse(path)?, literal)?;
        }
        Ok(())
    }

    pub fn get(&self, path: &TreePath) -> ValueState {
        self.snapshot().get(path)
    }

    pub fn exists(&self, path: &TreePath) -> bool {
        self.snapshot().exists(path)
    }

    pub fn children(&self, path: &TreePath) -> Vec<String> {
        self.snapshot().children(path)
    }
}

/// A consistent read-only view of the tree, valid for the lifetime of
/// one query regardless of concurrent writes.
#[derive(Debug, Clone)]
pub struct Snapshot {
    leaves: Arc<Leaves>,
}

impl Snapshot {
    /// The value state of a leaf.
    pub fn get(&self, path: &TreePath) -> ValueState {
        match self.leaves.get(path) {
            Some(value) => ValueState::Explicit(value.clone()),
            None => ValueState::Absent,
        }
    }

    /// The explicitly written value, if any.
    pub fn value(&self, path: &TreePath) -> Option<&str> {
        self.leaves.get(path).map(String::as_str)
    }

    /// True when a leaf is stored at or below the path.
    pub fn exists(&self, path: &TreePath) -> bool {
        self.leaves.range(path.clone()..).next().map_or(false, |(p, _)| p.starts_with(path))
    }

    /// Distinct child segments directly below a path, in iteration
    /// (lexicographic) order.
    pub fn children(&self, path: &TreePath) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for (leaf, _) in self.leaves.range(path.clone()..) {
            if !leaf.starts_with(path) {
                break;
            }
            if let Some(segment) = leaf.segments().get(path.len()) {
                if out.last().map(String::as_str) != Some(segment.as_str()) {
                    out.push(segment.clone());
                }
            }
        }
        out
    }

    /// All leaves in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&TreePath, &str)> {
        self.leaves.iter().map(|(p, v)| (p, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }
}
