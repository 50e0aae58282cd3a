//! Shared fixtures: a data model and seed data exercising defaults,
//! namespaces, lists, leaf-lists, and state subtrees.

use std::sync::Arc;

use canopy::proxy::{MountTable, ProxyResolver, RemoteStore};
use canopy::query::QueryEngine;
use canopy::render::DataNode;
use canopy::schema::{Schema, SchemaNode};
use canopy::store::TreeStore;

pub const TEST_NS: &str = "http://test.com/ns/yang/testing";
pub const ANIMAL_TYPES_NS: &str = "http://test.com/ns/yang/animal-types";

pub fn test_schema() -> Schema {
    Schema::new(vec![SchemaNode::container("test")
        .with_namespace(TEST_NS)
        .child(
            SchemaNode::container("settings")
                .child(SchemaNode::leaf("debug").with_default("disable"))
                .child(SchemaNode::leaf("enable").with_default("false"))
                .child(SchemaNode::leaf("priority"))
                .child(SchemaNode::leaf("readonly").with_default("yes"))
                .child(
                    SchemaNode::container("time")
                        .child(SchemaNode::leaf("active").with_default("false")),
                )
                .child(
                    SchemaNode::list("users", "name")
                        .child(SchemaNode::leaf("name"))
                        .child(SchemaNode::leaf("age"))
                        .child(SchemaNode::leaf_list("groups")),
                )
                .child(SchemaNode::leaf("volume")),
        )
        .child(
            SchemaNode::container("state")
                .state()
                .child(SchemaNode::leaf("counter"))
                .child(
                    SchemaNode::container("uptime")
                        .child(SchemaNode::leaf("days"))
                        .child(SchemaNode::leaf("hours"))
                        .child(SchemaNode::leaf("minutes"))
                        .child(SchemaNode::leaf("seconds")),
                ),
        )
        .child(
            SchemaNode::container("animals").child(
                SchemaNode::list("animal", "name")
                    .child(SchemaNode::leaf("name"))
                    .child(
                        SchemaNode::leaf("type")
                            .with_namespace(ANIMAL_TYPES_NS)
                            .with_default("big"),
                    )
                    .child(
                        SchemaNode::list("food", "name")
                            .child(SchemaNode::leaf("name"))
                            .child(SchemaNode::leaf("type")),
                    )
                    .child(
                        SchemaNode::container("toys").child(SchemaNode::leaf_list("toy")),
                    ),
            ),
        )])
}

pub fn seeded_store() -> Arc<TreeStore> {
    let store = TreeStore::new();
    store
        .load([
            ("/test/settings/debug", "enable"),
            ("/test/settings/enable", "true"),
            ("/test/settings/priority", "1"),
            ("/test/settings/volume", "1"),
            ("/test/settings/users/alfred/name", "alfred"),
            ("/test/settings/users/alfred/age", "87"),
            ("/test/settings/users/alfred/groups/2", "2"),
            ("/test/settings/users/alfred/groups/23", "23"),
            ("/test/settings/users/bob/name", "bob"),
            ("/test/settings/users/bob/age", "34"),
            ("/test/state/counter", "42"),
            ("/test/state/uptime/days", "5"),
            ("/test/state/uptime/hours", "50"),
            ("/test/state/uptime/minutes", "30"),
            ("/test/state/uptime/seconds", "20"),
            ("/test/animals/animal/cat/name", "cat"),
            ("/test/animals/animal/dog/name", "dog"),
            ("/test/animals/animal/dog/type", "little"),
            ("/test/animals/animal/hamster/name", "hamster"),
            ("/test/animals/animal/hamster/type", "little"),
            ("/test/animals/animal/hamster/food/banana/name", "banana"),
            ("/test/animals/animal/hamster/food/banana/type", "fruit"),
            ("/test/animals/animal/hamster/food/nuts/name", "nuts"),
            ("/test/animals/animal/hamster/food/nuts/type", "kibble"),
            ("/test/animals/animal/parrot/name", "parrot"),
            ("/test/animals/animal/parrot/type", "big"),
            ("/test/animals/animal/parrot/toys/toy/puzzles", "puzzles"),
            ("/test/animals/animal/parrot/toys/toy/rings", "rings"),
        ])
        .unwrap();
    Arc::new(store)
}

pub fn engine() -> QueryEngine {
    QueryEngine::new(test_schema(), seeded_store(), ProxyResolver::unmounted())
}

pub fn engine_with(mounts: MountTable, remote: Arc<dyn RemoteStore>) -> QueryEngine {
    QueryEngine::new(
        test_schema(),
        seeded_store(),
        ProxyResolver::new(mounts, remote),
    )
}

/// The first child with the given name, if any.
pub fn find<'a>(node: &'a DataNode, name: &str) -> Option<&'a DataNode> {
    node.children.iter().find(|c| c.name == name)
}

/// A descendant addressed by element names, ignoring list instances
/// beyond the first matching element at each step.
pub fn descend<'a>(node: &'a DataNode, names: &[&str]) -> Option<&'a DataNode> {
    let mut cursor = node;
    for name in names {
        cursor = find(cursor, name)?;
    }
    Some(cursor)
}

pub fn leaf_value<'a>(node: &'a DataNode, name: &str) -> Option<&'a str> {
    find(node, name).and_then(|c| c.value.as_deref())
}

/// The list instance whose key leaf equals `key_value`.
pub fn instance<'a>(parent: &'a DataNode, list: &str, key_value: &str) -> Option<&'a DataNode> {
    parent
        .children
        .iter()
        .filter(|c| c.name == list)
        .find(|c| leaf_value(c, "name") == Some(key_value))
}
