//! Mount dispatch and remote merge behavior.
//!
//! The merge-and-elide-key contract at mount boundaries: the remote
//! subtree attaches under the mount-point list as an anonymous
//! instance element, the dispatch key never appears, and remote
//! failures degrade to an empty branch.

use std::sync::Arc;

use canopy::error::ProxyError;
use canopy::filter::{Filter, FilterNode};
use canopy::proxy::{Mount, MountTable, RemoteQuery, RemoteStore};
use canopy::query::{QueryOutcome, QueryRequest};
use canopy::render::{DataNode, WithDefaults};
use canopy::TreePath;
use parking_lot::Mutex;

use super::support::{descend, engine_with, find, leaf_value};

struct FakeRemote {
    requests: Mutex<Vec<(String, RemoteQuery)>>,
    reply: Vec<DataNode>,
}

impl FakeRemote {
    fn replying(reply: Vec<DataNode>) -> Arc<Self> {
        Arc::new(FakeRemote {
            requests: Mutex::new(Vec::new()),
            reply,
        })
    }
}

impl RemoteStore for FakeRemote {
    fn query(&self, endpoint: &str, request: &RemoteQuery) -> Result<Vec<DataNode>, ProxyError> {
        self.requests
            .lock()
            .push((endpoint.to_string(), request.clone()));
        Ok(self.reply.clone())
    }
}

struct DeadRemote;

impl RemoteStore for DeadRemote {
    fn query(&self, endpoint: &str, _request: &RemoteQuery) -> Result<Vec<DataNode>, ProxyError> {
        Err(ProxyError::Unreachable {
            endpoint: endpoint.to_string(),
            reason: "connection refused".to_string(),
        })
    }
}

fn mounts() -> MountTable {
    MountTable::new(vec![
        Mount {
            prefix: TreePath::parse("/test/settings/users/remote-rick").unwrap(),
            endpoint: "http://127.0.0.1:8310".to_string(),
        },
        Mount {
            prefix: TreePath::parse("/test/settings/users/remote-anna").unwrap(),
            endpoint: "http://127.0.0.1:8311".to_string(),
        },
    ])
}

fn remote_reply() -> Vec<DataNode> {
    vec![DataNode::leaf("age", "29")]
}

#[test]
fn test_dispatch_key_is_elided_from_merge() {
    let remote = FakeRemote::replying(remote_reply());
    let engine = engine_with(mounts(), remote.clone());

    let filter = Filter::Subtree(vec![FilterNode::new("test").child(
        FilterNode::new("settings").child(
            FilterNode::new("users")
                .child(FilterNode::new("name").with_text("remote-rick"))
                .child(FilterNode::new("age")),
        ),
    )]);
    let outcome = engine.run(&QueryRequest::new(Some(filter))).unwrap();
    let QueryOutcome::Data(roots) = outcome else {
        panic!("expected data");
    };

    let settings = descend(&roots[0], &["settings"]).unwrap();
    let users: Vec<&DataNode> = settings.children.iter().filter(|c| c.name == "users").collect();
    assert_eq!(users.len(), 1);
    // No key leaf on the merged instance, just the remote answer.
    assert!(find(users[0], "name").is_none());
    assert_eq!(leaf_value(users[0], "age"), Some("29"));

    let requests = remote.requests.lock();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, "http://127.0.0.1:8310");
    // The key restriction was consumed by dispatch.
    assert_eq!(requests[0].1.filter, vec![FilterNode::new("age")]);
}

#[test]
fn test_mode_and_config_only_are_forwarded() {
    let remote = FakeRemote::replying(remote_reply());
    let engine = engine_with(mounts(), remote.clone());

    let filter = Filter::Subtree(vec![FilterNode::new("test").child(
        FilterNode::new("settings").child(
            FilterNode::new("users")
                .child(FilterNode::new("name").with_text("remote-anna")),
        ),
    )]);
    engine
        .run(
            &QueryRequest::new(Some(filter))
                .with_mode(WithDefaults::ReportAll)
                .config_only(),
        )
        .unwrap();

    let requests = remote.requests.lock();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].1.mode, WithDefaults::ReportAll);
    assert!(requests[0].1.config_only);
}

#[test]
fn test_merge_order_is_deterministic() {
    let remote = FakeRemote::replying(remote_reply());
    let engine = engine_with(mounts(), remote.clone());

    // Both mounted instances plus the local ones.
    let filter = Filter::Subtree(vec![FilterNode::new("test").child(
        FilterNode::new("settings").child(FilterNode::new("users")),
    )]);
    let outcome = engine.run(&QueryRequest::new(Some(filter))).unwrap();
    let QueryOutcome::Data(roots) = outcome else {
        panic!("expected data");
    };
    let settings = descend(&roots[0], &["settings"]).unwrap();
    let users: Vec<&DataNode> = settings.children.iter().filter(|c| c.name == "users").collect();
    // Local instances first in path order, then remote branches in
    // (mount point, endpoint) order.
    assert_eq!(users.len(), 4);
    assert_eq!(leaf_value(users[0], "name"), Some("alfred"));
    assert_eq!(leaf_value(users[1], "name"), Some("bob"));
    assert!(find(users[2], "name").is_none());
    assert!(find(users[3], "name").is_none());

    let requests = remote.requests.lock();
    let endpoints: Vec<&str> = requests.iter().map(|(e, _)| e.as_str()).collect();
    assert_eq!(
        endpoints,
        ["http://127.0.0.1:8310", "http://127.0.0.1:8311"]
    );
}

#[test]
fn test_unreachable_remote_yields_empty_branch() {
    let engine = engine_with(mounts(), Arc::new(DeadRemote));

    let filter = Filter::Subtree(vec![FilterNode::new("test").child(
        FilterNode::new("settings").child(
            FilterNode::new("users")
                .child(FilterNode::new("name").with_text("remote-rick")),
        ),
    )]);
    let outcome = engine.run(&QueryRequest::new(Some(filter))).unwrap();
    let QueryOutcome::Data(roots) = outcome else {
        panic!("expected data");
    };
    let settings = descend(&roots[0], &["settings"]).unwrap();
    let users: Vec<&DataNode> = settings.children.iter().filter(|c| c.name == "users").collect();
    assert_eq!(users.len(), 1);
    assert!(users[0].children.is_empty());
}

#[test]
fn test_full_get_queries_every_mount() {
    let remote = FakeRemote::replying(remote_reply());
    let engine = engine_with(mounts(), remote.clone());

    engine.run(&QueryRequest::new(None)).unwrap();

    let requests = remote.requests.lock();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|(_, q)| q.filter.is_empty()));
}
