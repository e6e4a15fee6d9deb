//! Sub-engines invoked by the state machine, spec.md §4.3.2-§4.3.4.
//!
//! Each manager returns `Result<T, String>` (or a boolean/`Option` where
//! spec.md describes a best-effort operation), mirroring the teacher's
//! `LedgerState::apply_certificate` manager-boundary shape. None of these
//! hold owning references to [`crate::model::Account`] — the ledger is the
//! sole owner (spec.md §3, §9's "cyclic manager references -> arena/indices").

pub mod amm;
pub mod channels;
pub mod checks;
pub mod credential;
pub mod did;
pub mod escrow;
pub mod hooks;
pub mod mpt;
pub mod nft;
pub mod oracle;
pub mod orderbook;
pub mod pathfinder;
pub mod staking;
pub mod trustgraph;
pub mod xchain;

use serde::{Deserialize, Serialize};

/// All sub-engine state owned by the ledger, bundled for convenience.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Subsystems {
    pub orderbook: orderbook::OrderBook,
    pub staking: staking::StakingPool,
    pub escrow: escrow::EscrowManager,
    pub channels: channels::ChannelManager,
    pub checks: checks::CheckManager,
    pub amm: amm::AmmManager,
    pub nft: nft::NftManager,
    pub oracle: oracle::OracleManager,
    pub did: did::DidManager,
    pub mpt: mpt::MptManager,
    pub credential: credential::CredentialManager,
    pub xchain: xchain::XChainManager,
    pub hooks: hooks::HooksManager,
}

impl Subsystems {
    pub fn new() -> Self {
        Self::default()
    }
}
