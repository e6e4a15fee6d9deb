//! Cross-chain attestation skeleton, spec.md §4.3.4 ("XChain claim credits
//! destination and mints supply on the issuing side"). Deliberately a
//! skeleton: spec.md §1 excludes cross-chain bridging beyond this.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    pub claim_id: String,
    pub amount: i128,
    pub claimed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct XChainManager {
    commits: BTreeMap<String, Commit>,
}

impl XChainManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commit(&mut self, claim_id: String, amount: i128) -> Result<(), String> {
        if self.commits.contains_key(&claim_id) {
            return Err("claim id already committed".to_string());
        }
        self.commits.insert(claim_id.clone(), Commit { claim_id, amount, claimed: false });
        Ok(())
    }

    /// Validates attestation quorum and marks the claim settled. Returns the
    /// amount to mint and credit to the destination.
    pub fn claim(&mut self, claim_id: &str, attestation_count: u32, quorum: u32) -> Result<i128, String> {
        let commit = self.commits.get_mut(claim_id).ok_or_else(|| "no such commit".to_string())?;
        if commit.claimed {
            return Err("already claimed".to_string());
        }
        if attestation_count < quorum {
            return Err("no quorum".to_string());
        }
        commit.claimed = true;
        Ok(commit.amount)
    }

    pub fn get(&self, claim_id: &str) -> Option<&Commit> {
        self.commits.get(claim_id)
    }
}
