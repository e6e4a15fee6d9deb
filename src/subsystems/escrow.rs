//! Escrow sub-engine, spec.md §4.3.4 ("Escrow family").

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Escrow {
    pub id: u64,
    pub creator: String,
    pub destination: String,
    pub amount: i128,
    pub condition: Option<Vec<u8>>,
    pub finish_after: Option<i64>,
    pub cancel_after: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EscrowManager {
    entries: BTreeMap<u64, Escrow>,
}

impl EscrowManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, escrow: Escrow) -> Result<(), String> {
        if self.entries.contains_key(&escrow.id) {
            return Err("escrow id already exists".to_string());
        }
        self.entries.insert(escrow.id, escrow);
        Ok(())
    }

    /// Releases to the destination if `finish_after <= now` and the
    /// fulfillment matches the recorded condition (a simple equality check;
    /// the real crypto-condition format is out of scope here).
    pub fn finish(&mut self, id: u64, fulfillment: Option<&[u8]>, now: i64) -> Result<Escrow, String> {
        let escrow = self.entries.get(&id).ok_or_else(|| "no such escrow".to_string())?;
        if let Some(after) = escrow.finish_after {
            if now < after {
                return Err("not ready".to_string());
            }
        }
        if let Some(condition) = &escrow.condition {
            match fulfillment {
                Some(f) if f == condition.as_slice() => {}
                _ => return Err("bad condition".to_string()),
            }
        }
        Ok(self.entries.remove(&id).unwrap())
    }

    pub fn cancel(&mut self, id: u64, now: i64) -> Result<Escrow, String> {
        let escrow = self.entries.get(&id).ok_or_else(|| "no such escrow".to_string())?;
        if let Some(after) = escrow.cancel_after {
            if now < after {
                return Err("not ready".to_string());
            }
        } else {
            return Err("not cancellable".to_string());
        }
        Ok(self.entries.remove(&id).unwrap())
    }

    pub fn get(&self, id: u64) -> Option<&Escrow> {
        self.entries.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Escrow> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_before_finish_after_is_rejected() {
        let mut mgr = EscrowManager::new();
        mgr.create(Escrow {
            id: 1,
            creator: "rA".into(),
            destination: "rB".into(),
            amount: 1000,
            condition: None,
            finish_after: Some(100),
            cancel_after: None,
        })
        .unwrap();
        assert!(mgr.finish(1, None, 50).is_err());
        assert!(mgr.finish(1, None, 100).is_ok());
    }

    #[test]
    fn cancel_requires_cancel_after_set() {
        let mut mgr = EscrowManager::new();
        mgr.create(Escrow {
            id: 2,
            creator: "rA".into(),
            destination: "rB".into(),
            amount: 1000,
            condition: None,
            finish_after: None,
            cancel_after: None,
        })
        .unwrap();
        assert!(mgr.cancel(2, 1000).is_err());
    }
}
