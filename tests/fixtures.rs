//! # Fixture-Based Tests for the Alder AVL Tree
//!
//! These tests load tree configurations and contents from JSON documents,
//! the way an application would embed a tree section in its own config
//! file, and check the resulting trees through the public API.

use alder::{AvlTree, DuplicatePolicy, Error, Insertion, Mode, TreeConfig, TreeFlags};
use serde::Deserialize;

// ===========================================================================
// Config Fixtures
// ===========================================================================

#[test]
fn empty_document_yields_defaults() {
	let config: TreeConfig = serde_json::from_str("{}").unwrap();
	assert_eq!(config, TreeConfig::default());
	assert_eq!(config.duplicates, DuplicatePolicy::Allow);
	assert!(config.free_on_remove);
	assert!(config.parallel);
	assert_eq!(config.job_units, None);
	assert!(config.flags().is_empty());
}

#[test]
fn partial_document_keeps_other_defaults() {
	let config: TreeConfig = serde_json::from_str(r#"{ "stack_capacity": 128 }"#).unwrap();
	assert_eq!(config.stack_capacity, 128);
	assert_eq!(config, TreeConfig::default().with_stack_capacity(128));
}

#[test]
fn policies_use_snake_case_names() {
	let cases = [
		("allow", DuplicatePolicy::Allow),
		("reject", DuplicatePolicy::Reject),
		("ignore", DuplicatePolicy::Ignore),
		("replace", DuplicatePolicy::Replace),
	];
	for (name, policy) in cases {
		let json = format!(r#"{{ "duplicates": "{name}" }}"#);
		let config: TreeConfig = serde_json::from_str(&json).unwrap();
		assert_eq!(config.duplicates, policy, "policy {name}");
	}

	// Variant names are case sensitive
	assert!(serde_json::from_str::<TreeConfig>(r#"{ "duplicates": "Reject" }"#).is_err());
}

#[test]
fn switches_map_to_flags() {
	let config: TreeConfig =
		serde_json::from_str(r#"{ "free_on_remove": false, "parallel": false, "job_units": 3 }"#)
			.unwrap();
	assert_eq!(config.flags(), TreeFlags::NO_FREE_ON_REMOVE | TreeFlags::PARALLEL_DISABLED);

	let tree: AvlTree<u32> = AvlTree::with_config(config).unwrap();
	assert_eq!(tree.flags(), TreeFlags::NO_FREE_ON_REMOVE | TreeFlags::PARALLEL_DISABLED);
	assert_eq!(tree.job_units(), 3);
}

// ===========================================================================
// Tree Fixtures
// ===========================================================================

/// A tree document: configuration plus the keys to insert, in order.
#[derive(Deserialize)]
struct Fixture {
	#[serde(default)]
	config: TreeConfig,
	keys: Vec<String>,
}

impl Fixture {
	fn load(json: &str) -> (AvlTree<String>, Vec<Result<Insertion<String>, Error>>) {
		let fixture: Fixture = serde_json::from_str(json).unwrap();
		let mut tree = AvlTree::with_config(fixture.config).unwrap();
		let outcomes = fixture.keys.into_iter().map(|key| tree.insert(key)).collect();
		tree.assert_invariants();
		(tree, outcomes)
	}
}

const SAMPLE: &str = r#"{
	"config": { "duplicates": "reject" },
	"keys": ["0005", "0002", "0003", "0008", "0001"]
}"#;

#[test]
fn sample_tree_lookup() {
	let (tree, outcomes) = Fixture::load(SAMPLE);
	assert!(outcomes.iter().all(|o| matches!(o, Ok(Insertion::Inserted))));

	assert_eq!(tree.len(), 5);
	assert!(tree.contains(&"0003".to_string()));
	assert!(!tree.contains(&"0004".to_string()));
	assert_eq!(tree.min().map(String::as_str), Some("0001"));
	assert_eq!(tree.max().map(String::as_str), Some("0008"));
}

#[test]
fn sample_tree_shape() {
	let (tree, _) = Fixture::load(SAMPLE);

	// 0005, 0002 then 0003 forces a left-right rotation at the root
	assert_eq!(tree.to_vec(Mode::BREADTH).unwrap(), vec!["0003", "0002", "0005", "0001", "0008"]);
	assert_eq!(tree.depth(), 3);
}

#[test]
fn sample_tree_remove_key() {
	let (mut tree, _) = Fixture::load(SAMPLE);

	assert_eq!(tree.remove(&"0003".to_string()).unwrap(), Some("0003".to_string()));
	tree.assert_invariants();
	assert_eq!(tree.to_vec(Mode::INFIX).unwrap(), vec!["0001", "0002", "0005", "0008"]);
	assert!(matches!(tree.remove(&"0003".to_string()), Err(Error::NotFound)));
}

#[test]
fn fixture_with_repeated_keys_follows_policy() {
	let json = r#"{
		"config": { "duplicates": "reject" },
		"keys": ["b", "a", "b", "c", "a"]
	}"#;
	let (tree, outcomes) = Fixture::load(json);
	let rejected = outcomes.iter().filter(|o| matches!(o, Err(Error::Duplicate))).count();
	assert_eq!(rejected, 2);
	assert_eq!(tree.to_vec(Mode::INFIX).unwrap(), vec!["a", "b", "c"]);

	// Without a config section duplicates are stored side by side
	let json = r#"{ "keys": ["b", "a", "b", "c", "a"] }"#;
	let (tree, _) = Fixture::load(json);
	assert_eq!(tree.to_vec(Mode::INFIX).unwrap(), vec!["a", "a", "b", "b", "c"]);
}
