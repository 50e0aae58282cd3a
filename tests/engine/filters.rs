//! Subtree and path filter behavior at the engine level.

use canopy::error::QueryError;
use canopy::filter::{Filter, FilterNode};
use canopy::query::{QueryOutcome, QueryRequest};
use canopy::render::{DataNode, WithDefaults};

use super::support::{descend, engine, find, instance, leaf_value, ANIMAL_TYPES_NS, TEST_NS};

fn run(filter: Filter) -> QueryOutcome {
    engine()
        .run(&QueryRequest::new(Some(filter)).with_mode(WithDefaults::Explicit))
        .unwrap()
}

fn data(outcome: QueryOutcome) -> Vec<DataNode> {
    match outcome {
        QueryOutcome::Data(roots) => roots,
        QueryOutcome::Empty => panic!("expected data, got the empty marker"),
    }
}

#[test]
fn test_filterless_get_returns_everything() {
    let outcome = engine().run(&QueryRequest::new(None)).unwrap();
    let roots = data(outcome);
    assert_eq!(roots.len(), 1);
    let test = &roots[0];
    assert_eq!(test.namespace.as_deref(), Some(TEST_NS));
    assert!(find(test, "settings").is_some());
    assert!(find(test, "state").is_some());
    assert!(find(test, "animals").is_some());
}

#[test]
fn test_content_predicate_on_non_key_leaf() {
    // Selects only the animals whose type matches.
    let filter = Filter::Subtree(vec![FilterNode::new("test").child(
        FilterNode::new("animals").child(
            FilterNode::new("animal").child(FilterNode::new("type").with_text("little")),
        ),
    )]);
    let roots = data(run(filter));
    let animals = descend(&roots[0], &["animals"]).unwrap();
    let names: Vec<&str> = animals
        .children
        .iter()
        .filter_map(|c| leaf_value(c, "name"))
        .collect();
    assert_eq!(names, ["dog", "hamster"]);
}

#[test]
fn test_predicate_plus_selector_prunes_within_match() {
    let filter = Filter::Subtree(vec![FilterNode::new("test").child(
        FilterNode::new("animals").child(
            FilterNode::new("animal")
                .child(FilterNode::new("type").with_text("little"))
                .child(FilterNode::new("name")),
        ),
    )]);
    let roots = data(run(filter));
    let animals = descend(&roots[0], &["animals"]).unwrap();
    let dog = instance(animals, "animal", "dog").unwrap();
    // Only the selected leaf plus the key leaf, which coincide here.
    assert_eq!(dog.children.len(), 1);
    assert_eq!(leaf_value(dog, "name"), Some("dog"));
}

#[test]
fn test_nested_list_filtering() {
    let filter = Filter::Subtree(vec![FilterNode::new("test").child(
        FilterNode::new("animals").child(
            FilterNode::new("animal")
                .child(FilterNode::new("name").with_text("hamster"))
                .child(
                    FilterNode::new("food")
                        .child(FilterNode::new("name").with_text("banana")),
                ),
        ),
    )]);
    let roots = data(run(filter));
    let animals = descend(&roots[0], &["animals"]).unwrap();
    let hamster = instance(animals, "animal", "hamster").unwrap();
    let banana = instance(hamster, "food", "banana").unwrap();
    assert_eq!(leaf_value(banana, "type"), Some("fruit"));
    assert!(instance(hamster, "food", "nuts").is_none());
}

#[test]
fn test_unknown_subtree_element_selects_nothing() {
    let filter = Filter::Subtree(vec![
        FilterNode::new("test").child(FilterNode::new("wires"))
    ]);
    let outcome = run(filter);
    assert!(outcome.is_empty());
}

#[test]
fn test_qualified_namespace_must_match() {
    let matching = Filter::Subtree(vec![FilterNode::new("test")
        .with_namespace(TEST_NS)
        .child(FilterNode::new("settings"))]);
    assert!(!run(matching).is_empty());

    let mismatched = Filter::Subtree(vec![FilterNode::new("test")
        .with_namespace(ANIMAL_TYPES_NS)
        .child(FilterNode::new("settings"))]);
    assert!(run(mismatched).is_empty());
}

#[test]
fn test_path_filter_selects_subtree() {
    let roots = data(run(Filter::Path("/test/settings".to_string())));
    let settings = descend(&roots[0], &["settings"]).unwrap();
    assert_eq!(leaf_value(settings, "debug"), Some("enable"));
}

#[test]
fn test_path_filter_wildcards_list_instances() {
    let roots = data(run(Filter::Path("/test/settings/users/age".to_string())));
    let settings = descend(&roots[0], &["settings"]).unwrap();
    let alfred = instance(settings, "users", "alfred").unwrap();
    let bob = instance(settings, "users", "bob").unwrap();
    assert_eq!(leaf_value(alfred, "age"), Some("87"));
    assert_eq!(leaf_value(bob, "age"), Some("34"));
    assert!(find(alfred, "groups").is_none());
}

#[test]
fn test_path_filter_unknown_element_is_malformed() {
    let err = engine()
        .run(&QueryRequest::new(Some(Filter::Path(
            "/test/settings/frequency".to_string(),
        ))))
        .unwrap_err();
    assert!(matches!(err, QueryError::MalformedFilter(_)));
    assert_eq!(err.tag().as_str(), "malformed-message");
}

#[test]
fn test_path_filter_must_be_absolute() {
    let err = engine()
        .run(&QueryRequest::new(Some(Filter::Path(
            "test/settings".to_string(),
        ))))
        .unwrap_err();
    assert!(matches!(err, QueryError::MalformedFilter(_)));
}

#[test]
fn test_key_restricted_filter_without_instance_is_empty() {
    let filter = Filter::Subtree(vec![FilterNode::new("test").child(
        FilterNode::new("animals").child(
            FilterNode::new("animal").child(FilterNode::new("name").with_text("unicorn")),
        ),
    )]);
    assert!(run(filter).is_empty());
}

#[test]
fn test_selected_container_exists_without_stored_leaves() {
    // Nothing under time was ever written; the container still exists
    // structurally because the model declares it.
    let filter = Filter::Subtree(vec![FilterNode::new("test").child(
        FilterNode::new("settings").child(FilterNode::new("time")),
    )]);
    let roots = data(run(filter));
    let time = descend(&roots[0], &["settings", "time"]).unwrap();
    assert!(time.children.is_empty());
}

#[test]
fn test_config_only_excludes_state_subtrees() {
    let outcome = engine()
        .run(
            &QueryRequest::new(Some(Filter::Subtree(vec![FilterNode::new("test")])))
                .config_only(),
        )
        .unwrap();
    let roots = data(outcome);
    let test = &roots[0];
    assert!(find(test, "settings").is_some());
    assert!(find(test, "state").is_none());
}

#[test]
fn test_config_only_state_filter_is_empty() {
    let filter = Filter::Subtree(vec![
        FilterNode::new("test").child(FilterNode::new("state"))
    ]);
    let outcome = engine()
        .run(&QueryRequest::new(Some(filter)).config_only())
        .unwrap();
    assert!(outcome.is_empty());
}
