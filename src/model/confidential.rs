//! Confidential output (UTXO note), spec.md §3.

use serde::{Deserialize, Serialize};

/// A confidential-payment output. The amount is never stored in clear —
/// only the Pedersen commitment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidentialOutput {
    pub commitment: Vec<u8>,
    pub stealth_address: Vec<u8>,
    pub ephemeral_pub: Vec<u8>,
    pub range_proof: Vec<u8>,
    pub view_tag: u8,
    pub tx_id: String,
    pub spent: bool,
}

impl ConfidentialOutput {
    pub fn stealth_hex(&self) -> String {
        hex::encode(&self.stealth_address)
    }
}
