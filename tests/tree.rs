//! End-to-end scenarios exercising the library surface from outside the
//! crate: pool lifecycle, the two growable containers, and the tree.

use pmtree::{Error, PersistentPool, TreeObject, TreeSchema};
use std::collections::HashMap;
use tempfile::NamedTempFile;

fn kv(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[test]
fn create_reopen_verify_root() {
    let f = NamedTempFile::new().unwrap();
    let path = f.path().to_path_buf();
    let size = 20u64 << 20;
    {
        let pool = PersistentPool::create(&path, size, "end-to-end").unwrap();
        assert_eq!(pool.size(), size);
        assert!(pool.new_pool());
        let schema = TreeSchema::new(vec!["k".into()]);
        TreeObject::create(&pool, schema).unwrap();
        pool.close();
    }
    let pool = PersistentPool::open(&path, "end-to-end").unwrap();
    assert_eq!(pool.size(), size);
    assert!(!pool.new_pool());
    let tree = TreeObject::open(&pool).unwrap();
    assert!(tree.valid());
}

#[test]
fn tree_insert_and_print_nests_branches_to_a_leaf() {
    let f = NamedTempFile::new().unwrap();
    let pool = PersistentPool::create(f.path(), 1 << 20, "end-to-end").unwrap();
    let schema = TreeSchema::new(vec!["key1".into(), "key2".into(), "key3".into()]);
    let mut tree = TreeObject::create(&pool, schema).unwrap();

    tree.add_node(&kv(&[("key1", "value1"), ("key2", "value2"), ("key3", "value3")]), b"data 1234").unwrap();

    let dump = tree.print_tree().unwrap();
    let key1_pos = dump.find("key1 = value1").unwrap();
    let key2_pos = dump.find("key2 = value2").unwrap();
    let key3_pos = dump.find("key3 = value3").unwrap();
    assert!(key1_pos < key2_pos && key2_pos < key3_pos);
    assert!(dump.contains("9 bytes"));

    let found = tree.lookup(&kv(&[("key1", "value1"), ("key2", "value2"), ("key3", "value3")])).unwrap();
    assert_eq!(found, vec![b"data 1234".to_vec()]);
}

#[test]
fn tree_duplicate_path_is_rejected() {
    let f = NamedTempFile::new().unwrap();
    let pool = PersistentPool::create(f.path(), 1 << 20, "end-to-end").unwrap();
    let schema = TreeSchema::new(vec!["key1".into(), "key2".into(), "key3".into()]);
    let mut tree = TreeObject::create(&pool, schema).unwrap();
    let path = kv(&[("key1", "value1"), ("key2", "value2"), ("key3", "value3")]);

    tree.add_node(&path, b"first").unwrap();
    let err = tree.add_node(&path, b"second").unwrap_err();
    assert!(matches!(err, Error::LeafExists(_)));
}

#[test]
fn tree_underspecified_lookup_matches_every_distinct_middle_value() {
    let f = NamedTempFile::new().unwrap();
    let pool = PersistentPool::create(f.path(), 1 << 20, "end-to-end").unwrap();
    let schema = TreeSchema::new(vec!["key1".into(), "key2".into(), "key3".into()]);
    let mut tree = TreeObject::create(&pool, schema).unwrap();

    tree.add_node(&kv(&[("key1", "value1"), ("key2", "a"), ("key3", "value3")]), b"a-data").unwrap();
    tree.add_node(&kv(&[("key1", "value1"), ("key2", "b"), ("key3", "value3")]), b"b-data").unwrap();
    tree.add_node(&kv(&[("key1", "value1"), ("key2", "c"), ("key3", "value3")]), b"c-data").unwrap();

    let found = tree.lookup(&kv(&[("key1", "value1"), ("key3", "value3")])).unwrap();
    assert_eq!(found, vec![b"a-data".to_vec(), b"b-data".to_vec(), b"c-data".to_vec()]);

    let none = tree.lookup(&kv(&[("key1", "value1"), ("key2", "bad"), ("key3", "value3")])).unwrap();
    assert!(none.is_empty());
}

#[test]
fn reopening_with_a_different_layout_name_is_rejected() {
    let f = NamedTempFile::new().unwrap();
    {
        let pool = PersistentPool::create(f.path(), 1 << 16, "layout-a").unwrap();
        let schema = TreeSchema::new(vec!["k".into()]);
        TreeObject::create(&pool, schema).unwrap();
    }
    let err = PersistentPool::open(f.path(), "layout-b").unwrap_err();
    assert!(matches!(err, Error::OpenError { .. }));
}
