//! Mount table and remote forwarding
//!
//! A mount attaches a remote store beneath a list instance: the
//! instance segment is the dispatch key, consumed by routing and
//! elided from merged results. Remote failures degrade to an empty
//! branch rather than failing the whole query.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, ProxyError};
use crate::filter::{FilterNode, RemoteBranch};
use crate::path::TreePath;
use crate::render::{DataNode, WithDefaults};

/// One mount: a tree prefix routed to a remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    /// List-instance path whose final segment is the dispatch key.
    pub prefix: TreePath,
    pub endpoint: String,
}

/// All configured mounts, ordered by prefix.
#[derive(Debug, Clone, Default)]
pub struct MountTable {
    mounts: Vec<Mount>,
}

impl MountTable {
    pub fn new(mut mounts: Vec<Mount>) -> Self {
        mounts.sort_by(|a, b| (&a.prefix, &a.endpoint).cmp(&(&b.prefix, &b.endpoint)));
        MountTable { mounts }
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mount> {
        self.mounts.iter()
    }

    /// The endpoint mounted exactly at `path`, if any.
    pub fn endpoint_at(&self, path: &TreePath) -> Option<&str> {
        self.mounts
            .iter()
            .find(|m| &m.prefix == path)
            .map(|m| m.endpoint.as_str())
    }

    /// Dispatch keys mounted directly under a list path, with their
    /// endpoints, in table order.
    pub fn dispatch_keys(&self, list_path: &TreePath) -> Vec<(String, String)> {
        self.mounts
            .iter()
            .filter(|m| {
                m.prefix.len() == list_path.len() + 1 && m.prefix.starts_with(list_path)
            })
            .filter_map(|m| {
                m.prefix
                    .last()
                    .map(|key| (key.to_string(), m.endpoint.clone()))
            })
            .collect()
    }
}

/// The query forwarded to a remote store for one branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteQuery {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter: Vec<FilterNode>,
    pub mode: WithDefaults,
    #[serde(default)]
    pub config_only: bool,
}

/// Transport used to answer remote branches.
pub trait RemoteStore: Send + Sync {
    fn query(&self, endpoint: &str, request: &RemoteQuery) -> Result<Vec<DataNode>, ProxyError>;
}

/// HTTP transport for remote stores, one JSON POST per branch.
pub struct HttpRemoteStore {
    client: reqwest::blocking::Client,
}

impl HttpRemoteStore {
    pub fn new(timeout: Duration) -> Result<Self, ConfigError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("http client: {e}")))?;
        Ok(HttpRemoteStore { client })
    }

    fn classify(endpoint: &str, err: reqwest::Error) -> ProxyError {
        if err.is_timeout() {
            ProxyError::Timeout {
                endpoint: endpoint.to_string(),
            }
        } else if err.is_connect() {
            ProxyError::Unreachable {
                endpoint: endpoint.to_string(),
                reason: err.to_string(),
            }
        } else {
            ProxyError::BadResponse {
                endpoint: endpoint.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

impl RemoteStore for HttpRemoteStore {
    fn query(&self, endpoint: &str, request: &RemoteQuery) -> Result<Vec<DataNode>, ProxyError> {
        let response = self
            .client
            .post(endpoint)
            .json(request)
            .send()
            .map_err(|e| Self::classify(endpoint, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProxyError::BadResponse {
                endpoint: endpoint.to_string(),
                reason: format!("status {status}"),
            });
        }
        response.json().map_err(|e| ProxyError::BadResponse {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Routes remote branches to their transports and absorbs failures.
pub struct ProxyResolver {
    mounts: MountTable,
    remote: Arc<dyn RemoteStore>,
}

impl ProxyResolver {
    pub fn new(mounts: MountTable, remote: Arc<dyn RemoteStore>) -> Self {
        ProxyResolver { mounts, remote }
    }

    /// A resolver with no mounts; every query is answered locally.
    pub fn unmounted() -> Self {
        ProxyResolver {
            mounts: MountTable::default(),
            remote: Arc::new(NullRemoteStore),
        }
    }

    pub fn mounts(&self) -> &MountTable {
        &self.mounts
    }

    /// Answer one remote branch. An unreachable or misbehaving remote
    /// yields an empty branch, never a query failure.
    pub fn forward(
        &self,
        branch: &RemoteBranch,
        mode: WithDefaults,
        config_only: bool,
    ) -> Vec<DataNode> {
        let request = RemoteQuery {
            filter: branch.filter.clone(),
            mode,
            config_only,
        };
        match self.remote.query(&branch.endpoint, &request) {
            Ok(data) => data,
            Err(err) => {
                warn!(
                    endpoint = %branch.endpoint,
                    mount_point = %branch.mount_point,
                    error = %err,
                    "remote branch unavailable, returning empty branch"
                );
                Vec::new()
            }
        }
    }
}

/// Transport that answers nothing, for mountless deployments.
struct NullRemoteStore;

impl RemoteStore for NullRemoteStore {
    fn query(&self, endpoint: &str, _request: &RemoteQuery) -> Result<Vec<DataNode>, ProxyError> {
        Err(ProxyError::Unreachable {
            endpoint: endpoint.to_string(),
            reason: "no remote transport configured".to_string(),
        })
    }
}
