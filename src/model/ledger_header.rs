//! Ledger header, spec.md §3/§4.4/§6.4.

use serde::{Deserialize, Serialize};

/// Immutable once closed. `hash` and the parent/tx/state hash fields are
/// lower-case hex.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerHeader {
    pub sequence: u64,
    pub parent_hash: String,
    pub tx_hash: String,
    pub state_hash: String,
    pub close_time: i64,
    pub tx_count: u64,
    /// Total native supply at close, micro-units.
    pub total_native: i128,
    pub hash: String,
}

impl LedgerHeader {
    /// The genesis header has an all-zero parent hash and sequence 1.
    pub fn genesis_parent_hash() -> String {
        "0".repeat(64)
    }

    /// Serializes per spec.md §6.4: `i64 BE sequence || UTF-8
    /// parent_hash_hex || UTF-8 tx_hash_hex || UTF-8 state_hash_hex || i64
    /// BE close_time || i64 BE tx_count || f64 BE total_native`. The `hash`
    /// field itself is excluded (it is the output of this digest).
    pub fn serialize_for_hash(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(self.sequence as i64).to_be_bytes());
        buf.extend_from_slice(self.parent_hash.as_bytes());
        buf.extend_from_slice(self.tx_hash.as_bytes());
        buf.extend_from_slice(self.state_hash.as_bytes());
        buf.extend_from_slice(&self.close_time.to_be_bytes());
        buf.extend_from_slice(&(self.tx_count as i64).to_be_bytes());
        let total_native_f64 = (self.total_native as f64) / (crate::model::amount::MICRO_UNITS_PER_UNIT as f64);
        buf.extend_from_slice(&total_native_f64.to_be_bytes());
        buf
    }
}
