//! Multi-purpose token (MPT) sub-engine, spec.md §4.3.4.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issuance {
    pub mpt_id: String,
    pub issuer: String,
    pub max_supply: i128,
    pub current_supply: i128,
    pub authorized_holders: BTreeSet<String>,
    pub balances: BTreeMap<String, i128>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MptManager {
    issuances: BTreeMap<String, Issuance>,
}

impl MptManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issuance_create(&mut self, mpt_id: String, issuer: String, max_supply: i128) -> Result<(), String> {
        if self.issuances.contains_key(&mpt_id) {
            return Err("mpt already exists".to_string());
        }
        self.issuances.insert(
            mpt_id.clone(),
            Issuance {
                mpt_id,
                issuer,
                max_supply,
                current_supply: 0,
                authorized_holders: BTreeSet::new(),
                balances: BTreeMap::new(),
            },
        );
        Ok(())
    }

    pub fn authorize(&mut self, mpt_id: &str, holder: &str) -> Result<(), String> {
        let issuance = self.issuances.get_mut(mpt_id).ok_or_else(|| "no such mpt".to_string())?;
        issuance.authorized_holders.insert(holder.to_string());
        Ok(())
    }

    pub fn issue(&mut self, mpt_id: &str, holder: &str, amount: i128) -> Result<(), String> {
        let issuance = self.issuances.get_mut(mpt_id).ok_or_else(|| "no such mpt".to_string())?;
        if !issuance.authorized_holders.contains(holder) {
            return Err("holder not authorized".to_string());
        }
        if issuance.current_supply + amount > issuance.max_supply {
            return Err("max supply exceeded".to_string());
        }
        issuance.current_supply += amount;
        *issuance.balances.entry(holder.to_string()).or_insert(0) += amount;
        Ok(())
    }

    pub fn burn(&mut self, mpt_id: &str, holder: &str, amount: i128) -> Result<(), String> {
        let issuance = self.issuances.get_mut(mpt_id).ok_or_else(|| "no such mpt".to_string())?;
        let balance = issuance.balances.get(holder).copied().unwrap_or(0);
        if balance < amount {
            return Err("insufficient mpt balance".to_string());
        }
        *issuance.balances.get_mut(holder).unwrap() -= amount;
        issuance.current_supply -= amount;
        Ok(())
    }

    pub fn get(&self, mpt_id: &str) -> Option<&Issuance> {
        self.issuances.get(mpt_id)
    }
}
