//! Pool root object: a tag, an embedded schema, and a handle to the tree's
//! single top node.
//!
//! Grounded on `original_source/src/pmem/tree/TreeRoot.cc`: the root's tag
//! marks a pool file as holding a tree (`valid()` checks it plus a
//! non-null schema) and `addNode`/`lookup`/`printTree` forward to the tree
//! proper via one retained node handle. That node is a sentinel branch
//! (empty key/value, never matched against) whose own `children` vector
//! holds one entry per distinct value of the schema's first key, so
//! several first-key values coexist exactly the way any other branch's
//! children do — no separate sibling-list type is needed at the root.

use crate::buffer::PersistentBuffer;
use crate::ctor::AtomicConstructor;
use crate::error::{Error, Result};
use crate::fixedstr::FixedStr;
use crate::handle::{Handle, PersistentType};
use crate::pool::{fnv1a, PersistentPool};
use crate::tree::node::{lookup_among, print_tree_among, NodeCtor, TreeNode};
use crate::tree::schema::TreeSchema;
use std::collections::HashMap;
use std::sync::Arc;

/// Tag written into every tree root so a pool opened generically can
/// recognize it holds this layout before trusting anything else in it.
pub const ROOT_TAG: &str = "999TREE9";

#[repr(C)]
pub struct TreeRootData {
    tag: FixedStr<9>,
    schema: PersistentBuffer,
    root_node: Handle<TreeNode>,
}

impl PersistentType for TreeRootData {
    const TYPE_ID: u64 = fnv1a(b"pmtree::tree::root::TreeRootData");
}

struct RootCtor<'a> {
    schema_json: &'a str,
}

impl<'a> AtomicConstructor<TreeRootData> for RootCtor<'a> {
    fn build(&self, object: &mut TreeRootData) -> Result<()> {
        object.tag = FixedStr::new(ROOT_TAG)?;
        object.root_node = Handle::null();
        object.root_node.allocate_in_place(&NodeCtor::branch("", ""))?;
        object.schema = PersistentBuffer::null();
        object.schema.allocate_in_place(self.schema_json.as_bytes())
    }
}

/// The tree itself: a pool's root object plus the schema parsed out of it.
pub struct TreeObject {
    pool: Arc<PersistentPool>,
    root: Handle<TreeRootData>,
    schema: TreeSchema,
}

impl TreeObject {
    /// Install a tree as `pool`'s root object. Fails if the pool already
    /// has a root (a pool holds at most one tree).
    pub fn create(pool: &Arc<PersistentPool>, schema: TreeSchema) -> Result<Self> {
        let json = schema.json_str()?;
        let root = pool.create_root(&RootCtor { schema_json: &json })?;
        Ok(Self { pool: pool.clone(), root, schema })
    }

    /// Open an existing tree from `pool`'s root object, validating the tag
    /// and parsing the embedded schema back out.
    pub fn open(pool: &Arc<PersistentPool>) -> Result<Self> {
        let root = pool
            .get_root::<TreeRootData>()?
            .ok_or_else(|| Error::OpenError { path: pool.path().display().to_string(), reason: "pool has no root object".into() })?;
        let data = root.get()?;
        if data.tag.as_str() != ROOT_TAG {
            return Err(Error::OpenError {
                path: pool.path().display().to_string(),
                reason: format!("root tag \"{}\" is not a tree root", data.tag.as_str()),
            });
        }
        let json_bytes = data.schema.as_bytes()?;
        let json = std::str::from_utf8(json_bytes).map_err(|e| Error::OpenError {
            path: pool.path().display().to_string(),
            reason: format!("schema is not valid UTF-8: {}", e),
        })?;
        let schema = TreeSchema::from_json_str(json)?;
        Ok(Self { pool: pool.clone(), root, schema })
    }

    pub fn valid(&self) -> bool {
        self.root.valid()
            && self
                .root
                .get()
                .map(|d| d.tag.as_str() == ROOT_TAG && !d.schema.is_null() && !d.root_node.is_null())
                .unwrap_or(false)
    }

    pub fn schema(&self) -> &TreeSchema {
        &self.schema
    }

    /// Insert `data` at the path named by `keyvals`, which must supply
    /// exactly one value per schema key (any order; re-ordered to schema
    /// order before the tree sees it).
    pub fn add_node(&mut self, keyvals: &HashMap<String, String>, data: &[u8]) -> Result<()> {
        let ordered = self.schema.process_insert_key(keyvals)?;
        let root_data = self.root.get()?;
        root_data.root_node.get_mut()?.add_node(&self.pool, &ordered, data)
    }

    /// Collect every leaf's data blob beneath the path named by `keyvals`,
    /// a possibly empty, possibly partial (and possibly non-prefix)
    /// key/value dictionary. An empty map returns every leaf in the tree.
    pub fn lookup(&self, keyvals: &HashMap<String, String>) -> Result<Vec<Vec<u8>>> {
        let filter = self.schema.process_lookup_filter(keyvals)?;
        let root_data = self.root.get()?;
        let root_node = root_data.root_node.get()?;
        let mut out = Vec::new();
        lookup_among(&root_node.children, &filter, &mut out)?;
        Ok(out)
    }

    pub fn print_tree(&self) -> Result<String> {
        let root_data = self.root.get()?;
        let root_node = root_data.root_node.get()?;
        let mut out = String::new();
        print_tree_among(&root_node.children, 0, &mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn kv(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn create_insert_lookup_print_round_trip() {
        let f = NamedTempFile::new().unwrap();
        let pool = PersistentPool::create(f.path(), 1 << 20, "tree-layout").unwrap();
        let schema = TreeSchema::new(vec!["country".into(), "city".into()]);
        let mut tree = TreeObject::create(&pool, schema).unwrap();

        tree.add_node(&kv(&[("country", "UK"), ("city", "Reading")]), b"reading-data").unwrap();
        tree.add_node(&kv(&[("country", "UK"), ("city", "London")]), b"london-data").unwrap();
        tree.add_node(&kv(&[("country", "FR"), ("city", "Paris")]), b"paris-data").unwrap();

        let uk = tree.lookup(&kv(&[("country", "UK")])).unwrap();
        assert_eq!(uk.len(), 2);

        let all = tree.lookup(&HashMap::new()).unwrap();
        assert_eq!(all.len(), 3);

        let dump = tree.print_tree().unwrap();
        assert!(dump.contains("country = UK"));
        assert!(dump.contains("city = Reading"));
    }

    #[test]
    fn reopen_recovers_schema_and_data() {
        let f = NamedTempFile::new().unwrap();
        let path = f.path().to_path_buf();
        {
            let pool = PersistentPool::create(&path, 1 << 20, "tree-layout").unwrap();
            let schema = TreeSchema::new(vec!["k".into()]);
            let mut tree = TreeObject::create(&pool, schema).unwrap();
            tree.add_node(&kv(&[("k", "v1")]), b"payload").unwrap();
            pool.close();
        }
        let pool = PersistentPool::open(&path, "tree-layout").unwrap();
        let tree = TreeObject::open(&pool).unwrap();
        assert!(tree.valid());
        assert_eq!(tree.schema().keys(), &["k".to_string()]);
        let found = tree.lookup(&kv(&[("k", "v1")])).unwrap();
        assert_eq!(found, vec![b"payload".to_vec()]);
    }

    #[test]
    fn lookup_can_skip_a_middle_key() {
        let f = NamedTempFile::new().unwrap();
        let pool = PersistentPool::create(f.path(), 1 << 20, "tree-layout").unwrap();
        let schema = TreeSchema::new(vec!["key1".into(), "key2".into(), "key3".into()]);
        let mut tree = TreeObject::create(&pool, schema).unwrap();

        tree.add_node(&kv(&[("key1", "value1"), ("key2", "a"), ("key3", "value3")]), b"first").unwrap();
        tree.add_node(&kv(&[("key1", "value1"), ("key2", "b"), ("key3", "value3")]), b"second").unwrap();
        tree.add_node(&kv(&[("key1", "value1"), ("key2", "c"), ("key3", "value3")]), b"third").unwrap();

        let found = tree.lookup(&kv(&[("key1", "value1"), ("key3", "value3")])).unwrap();
        assert_eq!(found, vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]);

        let empty = tree.lookup(&kv(&[("key1", "value1"), ("key2", "bad"), ("key3", "value3")])).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn reinserting_same_path_is_rejected() {
        let f = NamedTempFile::new().unwrap();
        let pool = PersistentPool::create(f.path(), 1 << 20, "tree-layout").unwrap();
        let schema = TreeSchema::new(vec!["k".into()]);
        let mut tree = TreeObject::create(&pool, schema).unwrap();
        tree.add_node(&kv(&[("k", "v1")]), b"a").unwrap();
        let err = tree.add_node(&kv(&[("k", "v1")]), b"b").unwrap_err();
        assert!(matches!(err, Error::LeafExists(_)));
    }
}
