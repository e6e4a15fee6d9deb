//! Transaction objects, spec.md §4.3/§6.3/§9.
//!
//! spec.md §9 calls for re-architecting the source's dynamic `flags`
//! dictionary into a tagged variant: one [`TransactionBody`] per `tx_type`,
//! each carrying its own fields, with a `Transaction { header, body,
//! signature }` struct replacing attribute-bag access. `TxHeader` carries the
//! fields common to every transaction and defined at fixed offsets in the
//! signing preimage (§6.3); `TransactionBody` carries the fields specific to
//! one handler family.

use super::amount::Amount;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Numeric `tx_type` tags. spec.md only pins `Payment = 0`; the rest are
/// assigned sequentially here since §4.3.4 leaves per-family numbering
/// unspecified ("non-exhaustive, one per family").
pub mod tx_type {
    pub const PAYMENT: u32 = 0;
    pub const OFFER_CREATE: u32 = 1;
    pub const OFFER_CANCEL: u32 = 2;
    pub const TRUST_SET: u32 = 3;
    pub const ESCROW_CREATE: u32 = 4;
    pub const ESCROW_FINISH: u32 = 5;
    pub const ESCROW_CANCEL: u32 = 6;
    pub const PAYCHAN_CREATE: u32 = 7;
    pub const PAYCHAN_FUND: u32 = 8;
    pub const PAYCHAN_CLAIM: u32 = 9;
    pub const PAYCHAN_CLOSE: u32 = 10;
    pub const CHECK_CREATE: u32 = 11;
    pub const CHECK_CASH: u32 = 12;
    pub const CHECK_CANCEL: u32 = 13;
    pub const STAKE: u32 = 14;
    pub const UNSTAKE: u32 = 15;
    pub const CLAWBACK: u32 = 16;
    pub const AMM_CREATE: u32 = 17;
    pub const AMM_DEPOSIT: u32 = 18;
    pub const AMM_WITHDRAW: u32 = 19;
    pub const AMM_VOTE: u32 = 20;
    pub const AMM_BID: u32 = 21;
    pub const AMM_DELETE: u32 = 22;
    pub const NFT_MINT: u32 = 23;
    pub const NFT_BURN: u32 = 24;
    pub const NFT_OFFER_CREATE: u32 = 25;
    pub const NFT_OFFER_ACCEPT: u32 = 26;
    pub const NFT_OFFER_CANCEL: u32 = 27;
    pub const ORACLE_SET: u32 = 28;
    pub const ORACLE_DELETE: u32 = 29;
    pub const DID_SET: u32 = 30;
    pub const DID_DELETE: u32 = 31;
    pub const MPT_ISSUANCE_CREATE: u32 = 32;
    pub const MPT_AUTHORIZE: u32 = 33;
    pub const MPT_ISSUE: u32 = 34;
    pub const MPT_BURN: u32 = 35;
    pub const CREDENTIAL_CREATE: u32 = 36;
    pub const CREDENTIAL_ACCEPT: u32 = 37;
    pub const CREDENTIAL_DELETE: u32 = 38;
    pub const XCHAIN_COMMIT: u32 = 39;
    pub const XCHAIN_CLAIM: u32 = 40;
    pub const HOOKS_SET: u32 = 41;
    pub const ACCOUNT_DELETE: u32 = 42;
}

/// Fields common to every transaction and fixed at specific offsets in the
/// signing preimage, spec.md §6.3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxHeader {
    pub tx_type: u32,
    pub account: String,
    /// Empty string when the transaction type has no destination.
    pub destination: String,
    pub amount: Amount,
    pub fee: Amount,
    pub sequence: i64,
    pub timestamp: i64,
    pub limit_amount: Option<Amount>,
    pub taker_pays: Option<Amount>,
    pub taker_gets: Option<Amount>,
    #[serde(default)]
    pub offer_sequence: i64,
    #[serde(default)]
    pub destination_tag: i64,
    #[serde(default)]
    pub source_tag: i64,
    #[serde(default)]
    pub memo: String,
    pub commitment: Option<Vec<u8>>,
    pub stealth_address: Option<Vec<u8>>,
    pub range_proof: Option<Vec<u8>>,
    pub key_image: Option<Vec<u8>>,
    /// Excluded from its own preimage (§6.3 step 11) but carried so the
    /// confidential `tx_id` (`hash256(preimage || ring_signature)`) can be
    /// computed and so `ring_verify` has something to check.
    pub ring_signature: Option<Vec<u8>>,
    /// DKSAP ephemeral public key and view tag, carried alongside the other
    /// privacy fields so the recipient can scan for the output and the
    /// ledger can record a complete `ConfidentialOutput`. Neither is part of
    /// the §6.3 preimage or the confidential `tx_id` — like
    /// `ring_signature`'s own exclusion, these are auxiliary to the signed
    /// commitment rather than inputs to it.
    #[serde(default)]
    pub ephemeral_pub: Option<Vec<u8>>,
    #[serde(default)]
    pub view_tag: Option<u8>,
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
}

impl TxHeader {
    /// Builds the signing preimage exactly as spec.md §6.3 defines it.
    pub fn serialize_for_signing(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.tx_type.to_be_bytes());
        buf.extend_from_slice(self.account.as_bytes());
        buf.extend_from_slice(self.destination.as_bytes());
        buf.extend_from_slice(&self.amount.to_wire_bytes());
        buf.extend_from_slice(&self.fee.to_wire_bytes());
        buf.extend_from_slice(&self.sequence.to_be_bytes());
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        if let Some(a) = &self.limit_amount {
            buf.extend_from_slice(&a.to_wire_bytes());
        }
        if let Some(a) = &self.taker_pays {
            buf.extend_from_slice(&a.to_wire_bytes());
        }
        if let Some(a) = &self.taker_gets {
            buf.extend_from_slice(&a.to_wire_bytes());
        }
        if self.offer_sequence != 0 {
            buf.extend_from_slice(&self.offer_sequence.to_be_bytes());
        }
        if self.destination_tag != 0 {
            buf.extend_from_slice(&self.destination_tag.to_be_bytes());
        }
        if self.source_tag != 0 {
            buf.extend_from_slice(&self.source_tag.to_be_bytes());
        }
        buf.extend_from_slice(self.memo.as_bytes());
        if let Some(c) = &self.commitment {
            buf.extend_from_slice(c);
        }
        if let Some(s) = &self.stealth_address {
            buf.extend_from_slice(s);
        }
        if let Some(r) = &self.range_proof {
            buf.extend_from_slice(r);
        }
        if let Some(k) = &self.key_image {
            buf.extend_from_slice(k);
        }
        if !self.flags.is_empty() {
            // `BTreeMap` iterates in key order, so this is already the
            // "canonical JSON (sorted keys)" the spec calls for.
            let json = serde_json::to_string(&self.flags).expect("flags map serializes");
            buf.extend_from_slice(json.as_bytes());
        }
        buf
    }

    pub fn is_confidential(&self) -> bool {
        self.key_image.is_some()
    }
}

macro_rules! body_variants {
    ($($variant:ident($ty:ident)),+ $(,)?) => {
        #[derive(Debug, Clone, Serialize, Deserialize)]
        pub enum TransactionBody {
            $($variant($ty),)+
            /// Unknown types succeed without mutation, spec.md §4.3 step 3.
            Unknown,
        }
    };
}

body_variants!(
    Payment(PaymentBody),
    OfferCreate(OfferCreateBody),
    OfferCancel(OfferCancelBody),
    TrustSet(TrustSetBody),
    EscrowCreate(EscrowCreateBody),
    EscrowFinish(EscrowFinishBody),
    EscrowCancel(EscrowCancelBody),
    PayChanCreate(PayChanCreateBody),
    PayChanFund(PayChanFundBody),
    PayChanClaim(PayChanClaimBody),
    PayChanClose(PayChanCloseBody),
    CheckCreate(CheckCreateBody),
    CheckCash(CheckCashBody),
    CheckCancel(CheckCancelBody),
    Stake(StakeBody),
    Unstake(UnstakeBody),
    Clawback(ClawbackBody),
    AmmCreate(AmmCreateBody),
    AmmDeposit(AmmDepositBody),
    AmmWithdraw(AmmWithdrawBody),
    AmmVote(AmmVoteBody),
    AmmBid(AmmBidBody),
    AmmDelete(AmmDeleteBody),
    NftMint(NftMintBody),
    NftBurn(NftBurnBody),
    NftOfferCreate(NftOfferCreateBody),
    NftOfferAccept(NftOfferAcceptBody),
    NftOfferCancel(NftOfferCancelBody),
    OracleSet(OracleSetBody),
    OracleDelete(OracleDeleteBody),
    DidSet(DidSetBody),
    DidDelete(DidDeleteBody),
    MptIssuanceCreate(MptIssuanceCreateBody),
    MptAuthorize(MptAuthorizeBody),
    MptIssue(MptIssueBody),
    MptBurn(MptBurnBody),
    CredentialCreate(CredentialCreateBody),
    CredentialAccept(CredentialAcceptBody),
    CredentialDelete(CredentialDeleteBody),
    XChainCommit(XChainCommitBody),
    XChainClaim(XChainClaimBody),
    HooksSet(HooksSetBody),
    AccountDelete(AccountDeleteBody),
);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentBody {
    /// `tfPartialPayment`, `tfNoRippleDirect` etc. are read from
    /// `header.flags` by name; this body carries nothing beyond the header.
    pub delivered_amount: Option<Amount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferCreateBody {
    pub offer_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferCancelBody {
    pub offer_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustSetBody {
    pub currency: String,
    pub issuer: String,
    pub limit: i128,
    #[serde(default)]
    pub quality_in: Option<u32>,
    #[serde(default)]
    pub quality_out: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowCreateBody {
    pub escrow_id: u64,
    pub destination: String,
    pub amount: i128,
    pub condition: Option<Vec<u8>>,
    pub finish_after: Option<i64>,
    pub cancel_after: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowFinishBody {
    pub escrow_id: u64,
    pub fulfillment: Option<Vec<u8>>,
    pub now: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowCancelBody {
    pub escrow_id: u64,
    pub now: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayChanCreateBody {
    pub channel_id: u64,
    pub destination: String,
    pub amount: i128,
    pub settle_delay: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayChanFundBody {
    pub channel_id: u64,
    pub amount: i128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayChanClaimBody {
    pub channel_id: u64,
    pub balance: i128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayChanCloseBody {
    pub channel_id: u64,
    pub now: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckCreateBody {
    pub check_id: u64,
    pub destination: String,
    pub send_max: i128,
    pub expiration: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckCashBody {
    pub check_id: u64,
    pub deliver_min: i128,
    pub send_max: i128,
    pub now: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckCancelBody {
    pub check_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakeBody {
    pub amount: i128,
    pub tier: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnstakeBody {
    pub stake_tx_id: String,
    pub now: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClawbackBody {
    pub holder: String,
    pub currency: String,
    pub amount: i128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmmCreateBody {
    pub asset_a: Amount,
    pub asset_b: Amount,
    pub trading_fee_bps: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmmDepositBody {
    pub pool_id: String,
    pub asset_a: Amount,
    pub asset_b: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmmWithdrawBody {
    pub pool_id: String,
    pub lp_tokens: i128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmmVoteBody {
    pub pool_id: String,
    pub trading_fee_bps: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmmBidBody {
    pub pool_id: String,
    pub bid_amount: i128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmmDeleteBody {
    pub pool_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NftMintBody {
    pub nft_id: String,
    pub uri: String,
    pub transfer_fee_bps: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NftBurnBody {
    pub nft_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NftOfferCreateBody {
    pub offer_id: u64,
    pub nft_id: String,
    pub amount: i128,
    pub is_sell_offer: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NftOfferAcceptBody {
    pub offer_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NftOfferCancelBody {
    pub offer_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleSetBody {
    pub oracle_id: String,
    pub asset_pair: String,
    pub price: i128,
    pub last_update: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleDeleteBody {
    pub oracle_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DidSetBody {
    pub did_document: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DidDeleteBody;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MptIssuanceCreateBody {
    pub mpt_id: String,
    pub max_supply: i128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MptAuthorizeBody {
    pub mpt_id: String,
    pub holder: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MptIssueBody {
    pub mpt_id: String,
    pub holder: String,
    pub amount: i128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MptBurnBody {
    pub mpt_id: String,
    pub amount: i128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialCreateBody {
    pub credential_id: String,
    pub subject: String,
    pub credential_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialAcceptBody {
    pub credential_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialDeleteBody {
    pub credential_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XChainCommitBody {
    pub claim_id: String,
    pub amount: i128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XChainClaimBody {
    pub claim_id: String,
    pub destination: String,
    pub amount: i128,
    pub attestation_count: u32,
    pub quorum: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HooksSetBody {
    pub hook_hashes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountDeleteBody {
    pub destination: String,
}

/// A complete transaction: header (signed fields), body (tagged variant),
/// signature, and the `tx_id` computed per spec.md §6.3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub tx_id: String,
    pub header: TxHeader,
    pub body: TransactionBody,
    pub signature: Option<Vec<u8>>,
}

impl Transaction {
    /// Computes the canonical `tx_id`: `hash256(preimage)` for transparent
    /// transactions, `hash256(preimage || ring_signature)` for confidential
    /// ones (spec.md §6.3).
    pub fn compute_tx_id(crypto: &dyn crate::crypto::CryptoProvider, header: &TxHeader) -> String {
        let mut preimage = header.serialize_for_signing();
        if header.is_confidential() {
            if let Some(ring) = &header.ring_signature {
                preimage.extend_from_slice(ring);
            }
        }
        hex::encode(crypto.hash256(&preimage))
    }

    pub fn signing_digest(&self, crypto: &dyn crate::crypto::CryptoProvider) -> [u8; 32] {
        crypto.hash256(&self.header.serialize_for_signing())
    }
}
