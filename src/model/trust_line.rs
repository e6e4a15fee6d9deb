//! Trust line, spec.md §3.

use serde::{Deserialize, Serialize};

pub mod flags {
    pub const NO_RIPPLE: u32 = 0x0000_0001;
    pub const FROZEN: u32 = 0x0000_0002;
    pub const AUTHORIZED: u32 = 0x0000_0004;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustLineFlags(pub u32);

impl TrustLineFlags {
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

    pub fn no_ripple(self) -> bool {
        self.has(flags::NO_RIPPLE)
    }
    pub fn frozen(self) -> bool {
        self.has(flags::FROZEN)
    }
    pub fn authorized(self) -> bool {
        self.has(flags::AUTHORIZED)
    }
}

/// A directed IOU credit relation `(holder, currency, issuer)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustLine {
    pub holder: String,
    pub currency: String,
    pub issuer: String,
    /// Holder's balance, micro-units. Positive means the issuer owes the
    /// holder; negative is possible when the issuer itself extends credit.
    pub balance: i128,
    pub limit: i128,
    pub peer_limit: i128,
    pub flags: TrustLineFlags,
    /// Billionths; `amount::RATE_ONE` = 1.0 (no adjustment).
    pub quality_in: u32,
    pub quality_out: u32,
}

impl TrustLine {
    pub fn new(holder: impl Into<String>, currency: impl Into<String>, issuer: impl Into<String>, limit: i128) -> Self {
        Self {
            holder: holder.into(),
            currency: currency.into(),
            issuer: issuer.into(),
            balance: 0,
            limit,
            peer_limit: 0,
            flags: TrustLineFlags::default(),
            quality_in: crate::model::amount::RATE_ONE,
            quality_out: crate::model::amount::RATE_ONE,
        }
    }

    /// Available capacity to send further IOU value before the line's
    /// balance would go negative past what the holder is willing to extend.
    /// In this model the holder only ever sends from a positive balance.
    pub fn available_to_send(&self) -> i128 {
        self.balance.max(0)
    }

    /// Capacity remaining before `limit` is hit on the receiving side.
    pub fn available_to_receive(&self) -> i128 {
        (self.limit - self.balance).max(0)
    }

    /// Destroyable once drained to zero with no remaining limit, spec.md §3
    /// ("implementation-dependent").
    pub fn is_empty_line(&self) -> bool {
        self.balance == 0 && self.limit == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_line_has_no_capacity_to_send() {
        let line = TrustLine::new("rA", "USD", "rI", 1000);
        assert_eq!(line.available_to_send(), 0);
        assert_eq!(line.available_to_receive(), 1000);
    }

    #[test]
    fn empty_line_is_destroyable() {
        let line = TrustLine::new("rA", "USD", "rI", 0);
        assert!(line.is_empty_line());
    }
}
