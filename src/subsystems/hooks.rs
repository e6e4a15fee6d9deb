//! Hooks sub-engine, spec.md §4.3.4 ("Hooks... dispatches to its manager and
//! maps booleans to the appropriate result code family").
//!
//! The hook VM itself is out of scope (spec.md §1 Non-goals: "serving
//! arbitrary smart-contract code"); this manager only tracks which hook
//! hashes are installed on an account, rejecting malformed installs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MAX_HOOKS_PER_ACCOUNT: usize = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HooksManager {
    installed: BTreeMap<String, Vec<String>>,
}

impl HooksManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, account: &str, hook_hashes: Vec<String>) -> Result<(), String> {
        if hook_hashes.len() > MAX_HOOKS_PER_ACCOUNT {
            return Err("too many hooks".to_string());
        }
        if hook_hashes.iter().any(|h| h.len() != 64 || !h.bytes().all(|b| b.is_ascii_hexdigit())) {
            return Err("malformed hook hash".to_string());
        }
        self.installed.insert(account.to_string(), hook_hashes);
        Ok(())
    }

    pub fn get(&self, account: &str) -> Option<&[String]> {
        self.installed.get(account).map(|v| v.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_hash_is_rejected() {
        let mut mgr = HooksManager::new();
        assert!(mgr.set("rA", vec!["not-hex".to_string()]).is_err());
        assert!(mgr.set("rA", vec!["a".repeat(64)]).is_ok());
    }

    #[test]
    fn too_many_hooks_is_rejected() {
        let mut mgr = HooksManager::new();
        let hashes: Vec<String> = (0..11).map(|_| "b".repeat(64)).collect();
        assert!(mgr.set("rA", hashes).is_err());
    }
}
