//! DID (decentralized identifier) sub-engine, spec.md §4.3.4.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DidEntry {
    pub address: String,
    pub document: Vec<u8>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DidManager {
    entries: BTreeMap<String, DidEntry>,
}

impl DidManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// One DID document per account. Setting over an existing document
    /// updates it; `is_new` tells the caller whether to bump owner_count.
    pub fn set(&mut self, address: &str, document: Vec<u8>) -> bool {
        let is_new = !self.entries.contains_key(address);
        self.entries.insert(
            address.to_string(),
            DidEntry { address: address.to_string(), document },
        );
        is_new
    }

    pub fn delete(&mut self, address: &str) -> Result<(), String> {
        self.entries.remove(address).map(|_| ()).ok_or_else(|| "no such did".to_string())
    }

    pub fn get(&self, address: &str) -> Option<&DidEntry> {
        self.entries.get(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_reports_whether_it_was_new() {
        let mut mgr = DidManager::new();
        assert!(mgr.set("rA", b"doc1".to_vec()));
        assert!(!mgr.set("rA", b"doc2".to_vec()));
        assert_eq!(mgr.get("rA").unwrap().document, b"doc2");
    }
}
