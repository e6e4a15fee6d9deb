//! Account, spec.md §3.
//!
//! Field-naming cross-checked against the XRPL `AccountRoot` shape in
//! `examples/other_examples/.../account_root.rs` (`owner_count`, `sequence`,
//! a `repr(u32)` flag bitmask) generalized from the teacher's EUTXO asset
//! model to this account-based ledger.

use super::trust_line::TrustLine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod flags {
    pub const REQUIRE_DEST: u32 = 0x0000_0001;
    pub const DISABLE_MASTER: u32 = 0x0000_0002;
    pub const DEFAULT_RIPPLE: u32 = 0x0000_0004;
    pub const GLOBAL_FREEZE: u32 = 0x0000_0008;
    pub const DEPOSIT_AUTH: u32 = 0x0000_0010;
    pub const ALLOW_CLAWBACK: u32 = 0x0000_0020;
    pub const REQUIRE_AUTH: u32 = 0x0000_0040;
}

/// Account flag bitmask, spec.md §3.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountFlags(pub u32);

impl AccountFlags {
    pub fn has(self, bit: u32) -> bool {
        self.0 & bit != 0
    }

    pub fn set(&mut self, bit: u32, on: bool) {
        if on {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }

    pub fn require_dest(self) -> bool {
        self.has(flags::REQUIRE_DEST)
    }
    pub fn disable_master(self) -> bool {
        self.has(flags::DISABLE_MASTER)
    }
    pub fn default_ripple(self) -> bool {
        self.has(flags::DEFAULT_RIPPLE)
    }
    pub fn global_freeze(self) -> bool {
        self.has(flags::GLOBAL_FREEZE)
    }
    pub fn deposit_auth(self) -> bool {
        self.has(flags::DEPOSIT_AUTH)
    }
    pub fn allow_clawback(self) -> bool {
        self.has(flags::ALLOW_CLAWBACK)
    }
    pub fn require_auth(self) -> bool {
        self.has(flags::REQUIRE_AUTH)
    }
}

/// An account in ledger state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub address: String,
    /// Native balance, micro-units.
    pub balance: i128,
    /// Next expected sequence number. 0 is treated as a wildcard by the
    /// common preamble.
    pub sequence: i64,
    /// Number of objects charged against this account's reserve.
    pub owner_count: u32,
    /// `(currency, issuer) -> TrustLine`.
    pub trust_lines: BTreeMap<(String, String), TrustLine>,
    pub open_offers: Vec<u64>,
    /// Transfer rate in billionths (`amount::RATE_ONE` = no fee), valid
    /// range `[RATE_ONE, 2 * RATE_ONE]`.
    pub transfer_rate: u32,
    pub flags: AccountFlags,
    pub regular_key: Option<String>,
    pub domain: Option<String>,
    pub preauthorized: std::collections::BTreeSet<String>,
    pub tickets: Vec<u32>,
    pub key_type: String,
}

impl Account {
    /// A fresh account as created by first-referenced payment, spec.md §3.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            balance: 0,
            sequence: 1,
            owner_count: 0,
            trust_lines: BTreeMap::new(),
            open_offers: Vec::new(),
            transfer_rate: crate::model::amount::RATE_ONE,
            flags: AccountFlags::default(),
            regular_key: None,
            domain: None,
            preauthorized: std::collections::BTreeSet::new(),
            tickets: Vec::new(),
            key_type: String::new(),
        }
    }

    pub fn trust_line(&self, currency: &str, issuer: &str) -> Option<&TrustLine> {
        self.trust_lines
            .get(&(currency.to_string(), issuer.to_string()))
    }

    pub fn trust_line_mut(&mut self, currency: &str, issuer: &str) -> Option<&mut TrustLine> {
        self.trust_lines
            .get_mut(&(currency.to_string(), issuer.to_string()))
    }

    /// Eligible for `AccountDelete`, spec.md §3/§4.3.4.
    pub fn is_deletable(&self) -> bool {
        self.owner_count == 0 && self.trust_lines.is_empty() && self.sequence >= 256
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_account_has_no_flags_set() {
        let a = Account::new("rAlice");
        assert!(!a.flags.global_freeze());
        assert!(!a.flags.require_dest());
    }

    #[test]
    fn flags_roundtrip() {
        let mut f = AccountFlags::default();
        f.set(flags::GLOBAL_FREEZE, true);
        assert!(f.global_freeze());
        f.set(flags::GLOBAL_FREEZE, false);
        assert!(!f.global_freeze());
    }

    #[test]
    fn deletable_requires_empty_trust_lines_and_high_sequence() {
        let mut a = Account::new("rAlice");
        a.sequence = 300;
        assert!(a.is_deletable());
        a.owner_count = 1;
        assert!(!a.is_deletable());
    }
}
