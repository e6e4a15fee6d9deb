//! Price oracle sub-engine, spec.md §4.3.4 ("Oracle... each dispatches to
//! its manager and maps booleans to the appropriate result code family").

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum number of asset-pair price feeds one account may own, enforced
/// as `ORACLE_LIMIT` (spec.md §4.3.6).
pub const MAX_FEEDS_PER_OWNER: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleEntry {
    pub oracle_id: String,
    pub owner: String,
    pub asset_pair: String,
    pub price: i128,
    pub last_update: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OracleManager {
    entries: BTreeMap<String, OracleEntry>,
}

impl OracleManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, entry: OracleEntry) -> Result<(), String> {
        let owner_count = self.entries.values().filter(|e| e.owner == entry.owner && e.oracle_id != entry.oracle_id).count();
        if !self.entries.contains_key(&entry.oracle_id) && owner_count >= MAX_FEEDS_PER_OWNER {
            return Err("oracle feed limit reached".to_string());
        }
        if let Some(existing) = self.entries.get(&entry.oracle_id) {
            if existing.owner != entry.owner {
                return Err("not the oracle owner".to_string());
            }
        }
        self.entries.insert(entry.oracle_id.clone(), entry);
        Ok(())
    }

    pub fn delete(&mut self, oracle_id: &str, owner: &str) -> Result<(), String> {
        let entry = self.entries.get(oracle_id).ok_or_else(|| "no such oracle".to_string())?;
        if entry.owner != owner {
            return Err("not the oracle owner".to_string());
        }
        self.entries.remove(oracle_id);
        Ok(())
    }

    pub fn get(&self, oracle_id: &str) -> Option<&OracleEntry> {
        self.entries.get(oracle_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_owner_can_update_or_delete() {
        let mut mgr = OracleManager::new();
        mgr.set(OracleEntry { oracle_id: "o1".into(), owner: "rA".into(), asset_pair: "XRP/USD".into(), price: 500_000, last_update: 0 }).unwrap();
        let mut update = OracleEntry { oracle_id: "o1".into(), owner: "rB".into(), asset_pair: "XRP/USD".into(), price: 600_000, last_update: 1 };
        assert!(mgr.set(update.clone()).is_err());
        update.owner = "rA".to_string();
        assert!(mgr.set(update).is_ok());
        assert!(mgr.delete("o1", "rB").is_err());
        assert!(mgr.delete("o1", "rA").is_ok());
    }
}
