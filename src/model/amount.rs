//! Monetary amounts.
//!
//! spec.md §9 rules out IEEE-754 doubles for balance arithmetic: "arithmetic
//! is platform/compiler-sensitive near the least significant bits." Every
//! amount here is a signed 128-bit integer in micro-units (6 decimal
//! places). The `f64` that appears on the wire (§6.3/§6.4) is produced only
//! at serialization time, as a lossy human view of the canonical integer.

use serde::{Deserialize, Serialize};

/// Micro-units per whole native unit (6 decimal places).
pub const MICRO_UNITS_PER_UNIT: i128 = 1_000_000;

/// Rate denominator for transfer/quality multipliers, expressed in
/// billionths rather than `f64` for the same determinism reason amounts are
/// integers: two validators must compute byte-identical results.
pub const RATE_ONE: u32 = 1_000_000_000;

/// A value denominated either in the native asset or in an IOU
/// `(currency, issuer)` pair. `currency`/`issuer` are empty for native.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    /// Value in micro-units (6 decimal places), signed.
    pub value: i128,
    pub currency: String,
    pub issuer: String,
}

impl Amount {
    pub fn native(value: i128) -> Self {
        Self {
            value,
            currency: String::new(),
            issuer: String::new(),
        }
    }

    pub fn iou(value: i128, currency: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            value,
            currency: currency.into(),
            issuer: issuer.into(),
        }
    }

    pub fn is_native(&self) -> bool {
        self.currency.is_empty()
    }

    pub fn zero_like(&self) -> Self {
        Self {
            value: 0,
            currency: self.currency.clone(),
            issuer: self.issuer.clone(),
        }
    }

    /// Lossy `f64` view of the canonical integer value, for the wire
    /// serialization formats specified in §6.3/§6.4. Never used internally
    /// for arithmetic or comparisons.
    pub fn as_f64_lossy(&self) -> f64 {
        (self.value as f64) / (MICRO_UNITS_PER_UNIT as f64)
    }

    /// Serializes as the fixed 51-byte wire `Amount` encoding from §6.3:
    /// 8-byte big-endian `f64` value, 3-byte NUL-padded currency, 40-byte
    /// NUL-padded issuer.
    pub fn to_wire_bytes(&self) -> [u8; 51] {
        let mut out = [0u8; 51];
        out[0..8].copy_from_slice(&self.as_f64_lossy().to_be_bytes());
        let cur = self.currency.as_bytes();
        let n = cur.len().min(3);
        out[8..8 + n].copy_from_slice(&cur[..n]);
        let iss = self.issuer.as_bytes();
        let m = iss.len().min(40);
        out[11..11 + m].copy_from_slice(&iss[..m]);
        out
    }
}

/// Applies a rate expressed in billionths (see [`RATE_ONE`]) to a
/// micro-unit value, rounding down. Used for `transfer_rate`,
/// `quality_in`/`quality_out` multipliers.
pub fn apply_rate_round_down(value: i128, rate_billionths: u32) -> i128 {
    (value * rate_billionths as i128) / RATE_ONE as i128
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_amount_has_empty_currency() {
        let a = Amount::native(1_000_000);
        assert!(a.is_native());
    }

    #[test]
    fn wire_bytes_are_fixed_width() {
        let a = Amount::iou(500_000_000, "USD", "rIssuer");
        assert_eq!(a.to_wire_bytes().len(), 51);
    }

    #[test]
    fn rate_rounding_truncates_toward_zero() {
        // 100 micro-units at a rate that doesn't divide evenly.
        let down = apply_rate_round_down(100, 333_333_333);
        assert_eq!(down, 33);
    }
}
