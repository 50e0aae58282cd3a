//! Property-based tests for determinism guarantees

use std::sync::Arc;

use canopy::proxy::ProxyResolver;
use canopy::query::{QueryEngine, QueryRequest};
use canopy::schema::{Schema, SchemaNode};
use canopy::store::TreeStore;
use canopy::TreePath;
use proptest::prelude::*;

fn inventory_schema() -> Schema {
    Schema::new(vec![SchemaNode::container("inventory").child(
        SchemaNode::list("item", "name")
            .child(SchemaNode::leaf("name"))
            .child(SchemaNode::leaf("qty").with_default("0")),
    )])
}

fn segment() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,7}"
}

/// Query output must not depend on the order leaves were written.
#[test]
fn test_query_result_independent_of_write_order() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &proptest::collection::btree_map(segment(), "[0-9]{1,4}", 1..8),
            |items| {
                let forward = TreeStore::new();
                let reverse = TreeStore::new();
                for (name, qty) in &items {
                    forward
                        .load([
                            (format!("/inventory/item/{name}/name").as_str(), name.as_str()),
                            (format!("/inventory/item/{name}/qty").as_str(), qty.as_str()),
                        ])
                        .unwrap();
                }
                for (name, qty) in items.iter().rev() {
                    reverse
                        .load([
                            (format!("/inventory/item/{name}/qty").as_str(), qty.as_str()),
                            (format!("/inventory/item/{name}/name").as_str(), name.as_str()),
                        ])
                        .unwrap();
                }

                let run = |store: TreeStore| {
                    let engine = QueryEngine::new(
                        inventory_schema(),
                        Arc::new(store),
                        ProxyResolver::unmounted(),
                    );
                    engine.run(&QueryRequest::new(None)).unwrap()
                };
                assert_eq!(run(forward), run(reverse));
                Ok(())
            },
        )
        .unwrap();
}

/// Path parsing round-trips through display.
#[test]
fn test_path_roundtrip_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &proptest::collection::vec(segment(), 1..6),
            |segments| {
                let raw = format!("/{}", segments.join("/"));
                let path = TreePath::parse(&raw).unwrap();
                assert_eq!(path.to_string(), raw);
                assert_eq!(path.segments().len(), segments.len());
                Ok(())
            },
        )
        .unwrap();
}

/// Snapshot child enumeration is always sorted and duplicate-free.
#[test]
fn test_children_sorted_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &proptest::collection::vec(segment(), 1..16),
            |names| {
                let store = TreeStore::new();
                for name in &names {
                    let path = TreePath::parse(&format!("/inventory/item/{name}/name")).unwrap();
                    store.write(&path, name).unwrap();
                }
                let list = TreePath::parse("/inventory/item").unwrap();
                let children = store.snapshot().children(&list);
                let mut sorted = children.clone();
                sorted.sort();
                sorted.dedup();
                assert_eq!(children, sorted);
                Ok(())
            },
        )
        .unwrap();
}
