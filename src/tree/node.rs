//! Recursive branch/leaf node: a branch carries a key name, a value for
//! that key, and a list of child nodes keyed by the next schema key name;
//! a leaf carries a key/value pair at the final depth plus an opaque data
//! blob.
//!
//! Grounded on `original_source/src/pmem/tree/TreeNode.cc`: `addNode` scans
//! a node's children for one whose (key, value) matches the next keychain
//! segment, recursing into it if found or creating a fresh child node
//! otherwise, and rejects re-inserting a path that already terminates in a
//! leaf with `LeafExistsError`. `lookup` recurses the same way, either
//! filtered by a caller-supplied partial keychain or collecting every leaf
//! beneath a node. Siblings are required to share the same key *name*
//! (the schema key at that depth) and be distinguished by `value`.

use crate::buffer::PersistentBuffer;
use crate::ctor::AtomicConstructor;
use crate::error::{Error, Result};
use crate::fixedstr::FixedStr;
use crate::handle::{Handle, PersistentType};
use crate::pool::{fnv1a, PersistentPool};
use crate::vector::Vector;

#[repr(C)]
pub struct TreeNode {
    key: FixedStr<12>,
    value: FixedStr<12>,
    is_leaf: u8,
    pub(crate) children: Vector<TreeNode>,
    data: PersistentBuffer,
}

impl PersistentType for TreeNode {
    const TYPE_ID: u64 = fnv1a(b"pmtree::tree::node::TreeNode");
}

pub(crate) struct NodeCtor<'a> {
    key: &'a str,
    value: &'a str,
    leaf_data: Option<&'a [u8]>,
}

impl<'a> NodeCtor<'a> {
    fn leaf(key: &'a str, value: &'a str, data: &'a [u8]) -> Self {
        Self { key, value, leaf_data: Some(data) }
    }

    /// A branch with no data of its own, only a name/value and children.
    /// Used both for ordinary interior nodes and for the tree's sentinel
    /// root node (key/value both empty — never matched against, only its
    /// `children` are ever addressed).
    pub(crate) fn branch(key: &'a str, value: &'a str) -> Self {
        Self { key, value, leaf_data: None }
    }
}

impl<'a> AtomicConstructor<TreeNode> for NodeCtor<'a> {
    fn build(&self, object: &mut TreeNode) -> Result<()> {
        object.key = FixedStr::new(self.key)?;
        object.value = FixedStr::new(self.value)?;
        object.children = Vector::null();
        object.data = PersistentBuffer::null();
        match self.leaf_data {
            Some(data) => {
                object.is_leaf = 1;
                object.data.allocate_in_place(data)?;
            }
            None => {
                object.is_leaf = 0;
            }
        }
        Ok(())
    }
}

/// Shared by [`TreeNode::add_node`] and the tree's sentinel root node, both
/// of which forward into a `Vector<TreeNode>` of same-depth siblings
/// distinguished by `value`.
pub(crate) fn add_node_among(
    children: &mut Vector<TreeNode>,
    pool: &PersistentPool,
    ordered: &[(String, String)],
    data: &[u8],
) -> Result<()> {
    let (key, value) = &ordered[0];
    let mut existing: Option<Handle<TreeNode>> = None;
    for i in 0..children.size() {
        let h = children.get(i)?;
        let node = h.get()?;
        if node.key.as_str() == key && node.value.as_str() == value {
            existing = Some(h);
            break;
        }
    }

    if ordered.len() == 1 {
        if existing.is_some() {
            return Err(Error::LeafExists(format!("{}={}", key, value)));
        }
        children.push_back_ctr(pool, &NodeCtor::leaf(key, value, data))
    } else if let Some(h) = existing {
        let node = h.get_mut()?;
        if node.is_leaf() {
            return Err(Error::LeafExists(format!("{}={}", key, value)));
        }
        add_node_among(&mut node.children, pool, &ordered[1..], data)
    } else {
        children.push_back_ctr(pool, &NodeCtor::branch(key, value))?;
        let idx = children.size() - 1;
        let h = children.get(idx)?;
        let node = h.get_mut()?;
        add_node_among(&mut node.children, pool, &ordered[1..], data)
    }
}

/// Walk every child at the current depth, accepting those that match
/// `filter[0]` (or all of them, if `filter[0]` is `None` or the filter is
/// exhausted), and recurse one level deeper through the rest of `filter`.
/// `filter` is depth-aligned to the schema (see
/// `TreeSchema::process_lookup_filter`): a `None` entry at a given depth is
/// a wildcard, letting a lookup pin an outer and inner key while leaving a
/// key in between unconstrained.
pub(crate) fn lookup_among(
    children: &Vector<TreeNode>,
    filter: &[Option<String>],
    out: &mut Vec<Vec<u8>>,
) -> Result<()> {
    for i in 0..children.size() {
        let h = children.get(i)?;
        h.get()?.collect(filter, out)?;
    }
    Ok(())
}

pub(crate) fn print_tree_among(children: &Vector<TreeNode>, depth: usize, out: &mut String) -> Result<()> {
    for i in 0..children.size() {
        let h = children.get(i)?;
        h.get()?.print_tree_into(depth, out)?;
    }
    Ok(())
}

impl TreeNode {
    pub fn key(&self) -> &str {
        self.key.as_str()
    }

    pub fn value(&self) -> &str {
        self.value.as_str()
    }

    pub fn is_leaf(&self) -> bool {
        self.is_leaf == 1
    }

    pub fn data(&self) -> Result<&[u8]> {
        self.data.as_bytes()
    }

    /// Add `data` beneath this node's children, keyed by `ordered` (the
    /// caller has already matched any leading segment of `ordered` against
    /// this node itself; the tree's sentinel root node calls this with the
    /// full `ordered` list, since it has no key/value of its own to match).
    pub fn add_node(&mut self, pool: &PersistentPool, ordered: &[(String, String)], data: &[u8]) -> Result<()> {
        if self.is_leaf() {
            return Err(Error::LeafExists(format!("{}={}", self.key(), self.value())));
        }
        add_node_among(&mut self.children, pool, ordered, data)
    }

    fn collect(&self, filter: &[Option<String>], out: &mut Vec<Vec<u8>>) -> Result<()> {
        if let Some(Some(v)) = filter.first() {
            if self.value.as_str() != v {
                return Ok(());
            }
        }
        let rest = if filter.is_empty() { filter } else { &filter[1..] };
        if self.is_leaf() {
            out.push(self.data.as_bytes()?.to_vec());
            Ok(())
        } else {
            lookup_among(&self.children, rest, out)
        }
    }

    pub fn lookup(&self, filter: &[Option<String>]) -> Result<Vec<Vec<u8>>> {
        let mut out = Vec::new();
        self.collect(filter, &mut out)?;
        Ok(out)
    }

    fn print_tree_into(&self, depth: usize, out: &mut String) -> Result<()> {
        let indent = "  ".repeat(depth);
        if self.is_leaf() {
            out.push_str(&format!("{}{} = {} -> {} bytes\n", indent, self.key(), self.value(), self.data.len()?));
            Ok(())
        } else {
            out.push_str(&format!("{}{} = {}\n", indent, self.key(), self.value()));
            print_tree_among(&self.children, depth + 1, out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PersistentPool;
    use tempfile::NamedTempFile;

    fn ordered(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn filter(values: &[&str]) -> Vec<Option<String>> {
        values.iter().map(|v| Some(v.to_string())).collect()
    }

    #[test]
    fn two_level_insert_and_lookup() {
        let f = NamedTempFile::new().unwrap();
        let pool = PersistentPool::create(f.path(), 1 << 20, "layout").unwrap();
        // The children vector must live inside the pool for `allocate_in_place`
        // to resolve it, so route it through a root carrier object.
        #[repr(C)]
        struct Carrier {
            children: Vector<TreeNode>,
        }
        impl PersistentType for Carrier {
            const TYPE_ID: u64 = fnv1a(b"pmtree::tree::node::tests::Carrier");
        }
        let ctor = crate::ctor::FnConstructor::new(|c: &mut Carrier| {
            c.children = Vector::null();
            Ok(())
        });
        let root = pool.create_root(&ctor).unwrap();
        let carrier = root.get_mut().unwrap();
        add_node_among(&mut carrier.children, &pool, &ordered(&[("country", "UK"), ("city", "Reading")]), b"blob-1").unwrap();
        add_node_among(&mut carrier.children, &pool, &ordered(&[("country", "UK"), ("city", "London")]), b"blob-2").unwrap();
        add_node_among(&mut carrier.children, &pool, &ordered(&[("country", "FR"), ("city", "Paris")]), b"blob-3").unwrap();

        let mut found = Vec::new();
        lookup_among(&carrier.children, &filter(&["UK"]), &mut found).unwrap();
        assert_eq!(found.len(), 2);

        let mut all = Vec::new();
        lookup_among(&carrier.children, &[], &mut all).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn duplicate_leaf_path_is_rejected() {
        let f = NamedTempFile::new().unwrap();
        let pool = PersistentPool::create(f.path(), 1 << 20, "layout").unwrap();
        #[repr(C)]
        struct Carrier {
            children: Vector<TreeNode>,
        }
        impl PersistentType for Carrier {
            const TYPE_ID: u64 = fnv1a(b"pmtree::tree::node::tests::Carrier2");
        }
        let ctor = crate::ctor::FnConstructor::new(|c: &mut Carrier| {
            c.children = Vector::null();
            Ok(())
        });
        let root = pool.create_root(&ctor).unwrap();
        let carrier = root.get_mut().unwrap();
        add_node_among(&mut carrier.children, &pool, &ordered(&[("k", "v")]), b"first").unwrap();
        let err = add_node_among(&mut carrier.children, &pool, &ordered(&[("k", "v")]), b"second").unwrap_err();
        assert!(matches!(err, Error::LeafExists(_)));
    }
}
