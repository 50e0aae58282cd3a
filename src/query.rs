//! Query orchestration
//!
//! Validates the request, runs filter matching against one snapshot,
//! renders the local selections under the requested disclosure mode,
//! then answers and merges any remote branches. Remote subtrees attach
//! under their mount point as anonymous instance elements, with the
//! dispatch key elided.

use std::sync::Arc;

use tracing::debug;

use crate::error::QueryError;
use crate::filter::{Filter, FilterMatcher, RemoteBranch};
use crate::proxy::ProxyResolver;
use crate::render::{DataNode, DefaultsRenderer, WithDefaults};
use crate::schema::{DefaultTable, Schema};
use crate::store::TreeStore;

/// The datastore every query reads from. Writable datastores beyond
/// it are not supported.
pub const RUNNING: &str = "running";

/// One parsed query, as handed over by the session layer.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub datastore: String,
    pub filter: Option<Filter>,
    pub mode: WithDefaults,
    /// Restrict the result to configuration, excluding state subtrees.
    pub config_only: bool,
}

impl QueryRequest {
    pub fn new(filter: Option<Filter>) -> Self {
        QueryRequest {
            datastore: RUNNING.to_string(),
            filter,
            mode: WithDefaults::default(),
            config_only: false,
        }
    }

    pub fn with_datastore(mut self, datastore: &str) -> Self {
        self.datastore = datastore.to_string();
        self
    }

    pub fn with_mode(mut self, mode: WithDefaults) -> Self {
        self.mode = mode;
        self
    }

    pub fn config_only(mut self) -> Self {
        self.config_only = true;
        self
    }
}

/// A successful query result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// The filtered, defaults-resolved result tree.
    Data(Vec<DataNode>),
    /// Nothing matched; the reply carries an empty data element.
    Empty,
}

impl QueryOutcome {
    pub fn is_empty(&self) -> bool {
        matches!(self, QueryOutcome::Empty)
    }
}

/// Evaluates queries over one schema, store, and mount configuration.
pub struct QueryEngine {
    schema: Schema,
    defaults: DefaultTable,
    store: Arc<TreeStore>,
    proxy: ProxyResolver,
}

impl QueryEngine {
    pub fn new(schema: Schema, store: Arc<TreeStore>, proxy: ProxyResolver) -> Self {
        let defaults = schema.default_table();
        QueryEngine {
            schema,
            defaults,
            store,
            proxy,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn store(&self) -> &Arc<TreeStore> {
        &self.store
    }

    /// Run one query to completion against a single store snapshot.
    pub fn run(&self, request: &QueryRequest) -> Result<QueryOutcome, QueryError> {
        if request.datastore != RUNNING {
            return Err(QueryError::UnsupportedDatastore(request.datastore.clone()));
        }

        let snapshot = self.store.snapshot();
        let matcher = FilterMatcher::new(&self.schema, &snapshot, self.proxy.mounts());
        let matched = match &request.filter {
            Some(filter) => matcher.select(filter)?,
            None => matcher.select_all(),
        };
        debug!(
            datastore = %request.datastore,
            selections = matched.selections.len(),
            remote = matched.remote.len(),
            mode = %request.mode,
            config_only = request.config_only,
            "query matched"
        );

        let renderer = DefaultsRenderer::new(
            &self.schema,
            &snapshot,
            &self.defaults,
            request.mode,
            request.config_only,
        );
        let mut roots = renderer.render(&matched);

        for branch in &matched.remote {
            let data = self.proxy.forward(branch, request.mode, request.config_only);
            self.merge_remote(&mut roots, branch, data);
        }

        if roots.is_empty() {
            return Ok(QueryOutcome::Empty);
        }
        Ok(QueryOutcome::Data(roots))
    }

    /// Attach a remote branch beneath its mount point. Ancestor
    /// containers are created as needed; the remote subtree becomes an
    /// anonymous instance element named after the mount-point list,
    /// with no key leaf.
    fn merge_remote(&self, roots: &mut Vec<DataNode>, branch: &RemoteBranch, data: Vec<DataNode>) {
        let segments = branch.mount_point.segments();
        let Some((list_name, ancestors)) = segments.split_last() else {
            return;
        };

        let mut snode = match self.schema.find_root(segments.first().map(String::as_str).unwrap_or("")) {
            Some(root) => root,
            None => return,
        };
        let mut inherited_ns = String::new();

        let mut cursor = roots;
        for (depth, segment) in ancestors.iter().enumerate() {
            if depth > 0 {
                snode = match snode.find_child(segment) {
                    Some(child) => child,
                    None => return,
                };
            }
            let own_ns = snode.namespace.clone().unwrap_or_else(|| inherited_ns.clone());
            let position = cursor.iter().position(|n| n.name == *segment);
            let index = match position {
                Some(index) => index,
                None => {
                    let mut node = DataNode::element(segment);
                    if own_ns != inherited_ns {
                        node.namespace = Some(own_ns.clone());
                    }
                    cursor.push(node);
                    cursor.len() - 1
                }
            };
            inherited_ns = own_ns;
            cursor = &mut cursor[index].children;
        }

        let mut instance = DataNode::element(list_name);
        instance.children = data;
        cursor.push(instance);
    }
}
