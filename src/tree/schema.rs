//! Ordered key-name list a tree is indexed by, with a JSON on-disk
//! representation.
//!
//! Grounded on `original_source/src/pmem/tree/TreeSchema.cc`:
//! `processInsertKey` checks a caller-supplied key/value dictionary has
//! exactly the schema's arity and every named key, then re-orders it to
//! match schema order before it reaches the tree; `json_str()` is a plain
//! JSON array round trip of the key names.

use crate::error::{Error, Result};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TreeSchema {
    keys: Vec<String>,
}

impl TreeSchema {
    pub fn new(keys: Vec<String>) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn depth(&self) -> usize {
        self.keys.len()
    }

    pub fn json_str(&self) -> Result<String> {
        serde_json::to_string(&self.keys).map_err(|e| Error::SeriousBug(e.to_string()))
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let keys: Vec<String> =
            serde_json::from_str(s).map_err(|e| Error::UserError(format!("malformed schema JSON: {}", e)))?;
        Ok(Self { keys })
    }

    /// Validate `input` has exactly one value per schema key, and return
    /// `(key, value)` pairs in schema order. Every rejection here is a
    /// caller mistake, not a library bug, hence [`Error::UserError`].
    pub fn process_insert_key(&self, input: &HashMap<String, String>) -> Result<Vec<(String, String)>> {
        if input.len() != self.keys.len() {
            return Err(Error::UserError(format!(
                "insert expects {} keys ({:?}), got {}",
                self.keys.len(),
                self.keys,
                input.len()
            )));
        }
        let mut ordered = Vec::with_capacity(self.keys.len());
        for key in &self.keys {
            match input.get(key) {
                Some(value) => ordered.push((key.clone(), value.clone())),
                None => return Err(Error::UserError(format!("insert is missing required key \"{}\"", key))),
            }
        }
        Ok(ordered)
    }

    /// Build a schema-ordered, depth-aligned lookup filter from a (possibly
    /// partial, possibly non-prefix) key/value dictionary: `filter[i]` is
    /// `Some(value)` if `input` names the key at schema depth `i`, `None`
    /// (match any value) otherwise. Unlike [`Self::process_insert_key`],
    /// `input` need not cover every key, and the keys it does cover need
    /// not form a prefix — a lookup can pin the first and last key of a
    /// three-level schema while leaving the middle one a wildcard.
    pub fn process_lookup_filter(&self, input: &HashMap<String, String>) -> Result<Vec<Option<String>>> {
        for key in input.keys() {
            if !self.keys.iter().any(|k| k == key) {
                return Err(Error::UserError(format!("\"{}\" is not a key in this schema ({:?})", key, self.keys)));
            }
        }
        Ok(self.keys.iter().map(|k| input.get(k).cloned()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> TreeSchema {
        TreeSchema::new(vec!["country".into(), "city".into()])
    }

    #[test]
    fn json_round_trips() {
        let s = schema();
        let json = s.json_str().unwrap();
        let back = TreeSchema::from_json_str(&json).unwrap();
        assert_eq!(s, back);
    }

    #[test]
    fn process_insert_key_reorders_to_schema_order() {
        let s = schema();
        let mut input = HashMap::new();
        input.insert("city".to_string(), "Reading".to_string());
        input.insert("country".to_string(), "UK".to_string());
        let ordered = s.process_insert_key(&input).unwrap();
        assert_eq!(ordered, vec![("country".to_string(), "UK".to_string()), ("city".to_string(), "Reading".to_string())]);
    }

    #[test]
    fn process_insert_key_rejects_wrong_arity() {
        let s = schema();
        let mut input = HashMap::new();
        input.insert("country".to_string(), "UK".to_string());
        assert!(matches!(s.process_insert_key(&input).unwrap_err(), Error::UserError(_)));
    }

    #[test]
    fn process_lookup_filter_allows_gaps_in_the_middle() {
        let s = TreeSchema::new(vec!["key1".into(), "key2".into(), "key3".into()]);
        let mut input = HashMap::new();
        input.insert("key1".to_string(), "value1".to_string());
        input.insert("key3".to_string(), "value3".to_string());
        let filter = s.process_lookup_filter(&input).unwrap();
        assert_eq!(filter, vec![Some("value1".to_string()), None, Some("value3".to_string())]);
    }

    #[test]
    fn process_insert_key_rejects_unknown_keys() {
        let s = schema();
        let mut input = HashMap::new();
        input.insert("country".to_string(), "UK".to_string());
        input.insert("postcode".to_string(), "RG1".to_string());
        assert!(matches!(s.process_insert_key(&input).unwrap_err(), Error::UserError(_)));
    }
}
