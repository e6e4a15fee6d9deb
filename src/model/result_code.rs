//! Result taxonomy, spec.md §4.3.6/§7.
//!
//! Band `0` is success; `101-140` is deterministic failure. These are
//! returned directly by `apply()` — never exceptions, never panics (§7
//! "Propagation policy").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum ResultCode {
    Success = 0,
    Unfunded = 101,
    NoLine = 102,
    InsufFee = 103,
    BadSeq = 104,
    BadSig = 105,
    KeyImageSpent = 106,
    StakeLocked = 107,
    Duplicate = 108,
    NoPermission = 109,
    EscrowBadCondition = 110,
    EscrowNotReady = 111,
    PaychanExpired = 112,
    CheckExpired = 113,
    NoRipple = 114,
    Frozen = 115,
    NoEntry = 116,
    AmendmentBlocked = 117,
    NftokenExists = 118,
    AmmBalance = 119,
    ClawbackDisabled = 120,
    HooksRejected = 121,
    XchainNoQuorum = 122,
    MptMaxSupply = 123,
    CredentialExists = 124,
    OracleLimit = 125,
    DidExists = 126,
    InvariantFailed = 127,
    PartialPayment = 128,
    RequireAuth = 129,
    DstTagNeeded = 130,
    GlobalFreeze = 131,
    OwnerReserve = 132,
    SeqTooLow = 133,
}

impl ResultCode {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn is_success(self) -> bool {
        matches!(self, ResultCode::Success)
    }

    /// The "named code" of §7's error handling design (e.g. `tecUNFUNDED`),
    /// used as the diagnostic string surfaced in transaction metadata.
    pub fn name(self) -> &'static str {
        match self {
            ResultCode::Success => "tesSUCCESS",
            ResultCode::Unfunded => "tecUNFUNDED",
            ResultCode::NoLine => "tecNO_LINE",
            ResultCode::InsufFee => "tecINSUF_FEE",
            ResultCode::BadSeq => "tecBAD_SEQ",
            ResultCode::BadSig => "tecBAD_SIG",
            ResultCode::KeyImageSpent => "tecKEY_IMAGE_SPENT",
            ResultCode::StakeLocked => "tecSTAKE_LOCKED",
            ResultCode::Duplicate => "tecDUPLICATE",
            ResultCode::NoPermission => "tecNO_PERMISSION",
            ResultCode::EscrowBadCondition => "tecESCROW_BAD_CONDITION",
            ResultCode::EscrowNotReady => "tecESCROW_NOT_READY",
            ResultCode::PaychanExpired => "tecPAYCHAN_EXPIRED",
            ResultCode::CheckExpired => "tecCHECK_EXPIRED",
            ResultCode::NoRipple => "tecNO_RIPPLE",
            ResultCode::Frozen => "tecFROZEN",
            ResultCode::NoEntry => "tecNO_ENTRY",
            ResultCode::AmendmentBlocked => "tecAMENDMENT_BLOCKED",
            ResultCode::NftokenExists => "tecNFTOKEN_EXISTS",
            ResultCode::AmmBalance => "tecAMM_BALANCE",
            ResultCode::ClawbackDisabled => "tecCLAWBACK_DISABLED",
            ResultCode::HooksRejected => "tecHOOKS_REJECTED",
            ResultCode::XchainNoQuorum => "tecXCHAIN_NO_QUORUM",
            ResultCode::MptMaxSupply => "tecMPT_MAX_SUPPLY",
            ResultCode::CredentialExists => "tecCREDENTIAL_EXISTS",
            ResultCode::OracleLimit => "tecORACLE_LIMIT",
            ResultCode::DidExists => "tecDID_EXISTS",
            ResultCode::InvariantFailed => "tecINVARIANT_FAILED",
            ResultCode::PartialPayment => "tecPARTIAL_PAYMENT",
            ResultCode::RequireAuth => "tecREQUIRE_AUTH",
            ResultCode::DstTagNeeded => "tecDST_TAG_NEEDED",
            ResultCode::GlobalFreeze => "tecGLOBAL_FREEZE",
            ResultCode::OwnerReserve => "tecOWNER_RESERVE",
            ResultCode::SeqTooLow => "tecSEQ_TOO_LOW",
        }
    }
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_zero() {
        assert_eq!(ResultCode::Success.code(), 0);
        assert!(ResultCode::Success.is_success());
    }

    #[test]
    fn failures_are_in_band() {
        assert_eq!(ResultCode::Unfunded.code(), 101);
        assert!(!ResultCode::Unfunded.is_success());
        assert_eq!(ResultCode::SeqTooLow.code(), 133);
    }

    #[test]
    fn named_codes_match_spec_example() {
        assert_eq!(ResultCode::Unfunded.name(), "tecUNFUNDED");
    }
}
