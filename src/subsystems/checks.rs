//! Check sub-engine, spec.md §4.3.4 ("Check family").

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Check {
    pub id: u64,
    pub creator: String,
    pub destination: String,
    pub send_max: i128,
    pub expiration: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckManager {
    checks: BTreeMap<u64, Check>,
}

impl CheckManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, check: Check) -> Result<(), String> {
        if self.checks.contains_key(&check.id) {
            return Err("check id already exists".to_string());
        }
        self.checks.insert(check.id, check);
        Ok(())
    }

    /// Cashes the check for an amount within `[deliver_min, send_max]`,
    /// bounded by the check's own `send_max`. Returns the amount to deliver.
    pub fn cash(&mut self, id: u64, deliver_min: i128, send_max: i128, now: i64) -> Result<i128, String> {
        let check = self.checks.get(&id).ok_or_else(|| "no such check".to_string())?;
        if let Some(exp) = check.expiration {
            if now >= exp {
                self.checks.remove(&id);
                return Err("expired".to_string());
            }
        }
        let deliverable = send_max.min(check.send_max);
        if deliverable < deliver_min {
            return Err("cannot meet deliver_min".to_string());
        }
        self.checks.remove(&id);
        Ok(deliverable)
    }

    pub fn cancel(&mut self, id: u64) -> Result<Check, String> {
        self.checks.remove(&id).ok_or_else(|| "no such check".to_string())
    }

    pub fn get(&self, id: u64) -> Option<&Check> {
        self.checks.get(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cash_clamps_to_check_send_max() {
        let mut mgr = CheckManager::new();
        mgr.create(Check { id: 1, creator: "rA".into(), destination: "rB".into(), send_max: 500, expiration: None }).unwrap();
        let delivered = mgr.cash(1, 100, 1000, 0).unwrap();
        assert_eq!(delivered, 500);
    }

    #[test]
    fn expired_check_cannot_be_cashed() {
        let mut mgr = CheckManager::new();
        mgr.create(Check { id: 2, creator: "rA".into(), destination: "rB".into(), send_max: 500, expiration: Some(10) }).unwrap();
        assert!(mgr.cash(2, 1, 500, 20).is_err());
        assert!(mgr.get(2).is_none());
    }
}
