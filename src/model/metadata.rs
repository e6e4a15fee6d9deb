//! Per-transaction metadata, spec.md §4.3 step 6.
//!
//! One [`TxMetadata`] is appended to the ledger's metadata list for every
//! `apply()` call, success or failure — "before/after of touched accounts,
//! final delivered amount (for partial payments), result code and name."

use super::amount::Amount;
use super::result_code::ResultCode;
use serde::{Deserialize, Serialize};

/// Before/after balance snapshot for one account touched by a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountDelta {
    pub address: String,
    pub balance_before: i128,
    pub balance_after: i128,
    pub sequence_before: i64,
    pub sequence_after: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxMetadata {
    pub tx_id: String,
    pub result_code: u16,
    pub result_name: String,
    pub touched_accounts: Vec<AccountDelta>,
    pub delivered_amount: Option<Amount>,
    /// Best-effort human-readable diagnostic, spec.md §7 ("User-visible
    /// failures").
    pub diagnostic: String,
}

impl TxMetadata {
    pub fn new(tx_id: impl Into<String>, result: ResultCode, diagnostic: impl Into<String>) -> Self {
        Self {
            tx_id: tx_id.into(),
            result_code: result.code(),
            result_name: result.name().to_string(),
            touched_accounts: Vec::new(),
            delivered_amount: None,
            diagnostic: diagnostic.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result_code == ResultCode::Success.code()
    }
}
