//! # valnode-core
//!
//! The deterministic core of a validator node for a decentralized
//! value-transfer network: a transaction-application state machine (account
//! balances, IOU trust-line rippling, confidential UTXO-style outputs), a
//! hash-chained ledger close procedure, and a signed, equivocation-detecting
//! BFT consensus engine (BFT-RPCA) that drives agreement between validators
//! on the transaction set for each ledger.
//!
//! ## What's in scope
//!
//! The state machine, the sub-engines it dispatches to (order book,
//! rippling pathfinder, staking pool, escrow/channel/check managers,
//! NFT/AMM/oracle/DID/MPT/credential/xchain/hooks managers), the ledger
//! closer, and the consensus engine. The cryptographic primitives
//! (signing, hashing, Pedersen commitments, ring signatures, stealth
//! addresses, range proofs) are consumed through the [`crypto::CryptoProvider`]
//! trait at a contract level; [`crypto::ReferenceCrypto`] is one concrete,
//! swappable implementation.
//!
//! ## What's out of scope
//!
//! The P2P transport, the REST admin API, the wallet key-storage utility,
//! and any specific on-disk database engine — these are external
//! collaborators consumed through [`persistence::PersistenceStore`] and the
//! read-only query surface on [`ledger::Ledger`].
//!
//! ## Modules
//! - [`error`]: boundary error type ([`error::CoreError`]), distinct from the
//!   deterministic [`model::ResultCode`] taxonomy `apply()` returns.
//! - [`config`]: CLI parsing and TOML node configuration.
//! - [`crypto`]: cryptographic primitives contract and reference impl.
//! - [`merkle`]: authenticated map used for `tx_hash`/`state_hash`.
//! - [`model`]: accounts, trust lines, transactions, ledger headers.
//! - [`subsystems`]: the order book, rippling pathfinder, and the other
//!   managers the state machine dispatches to.
//! - [`ledger`]: the open ledger state the state machine and closer mutate.
//! - [`state_machine`]: `apply(ledger, tx) -> ResultCode`.
//! - [`closer`]: `close_ledger(ledger, close_time) -> LedgerHeader`.
//! - [`consensus`]: the BFT-RPCA proposal-exchange engine.
//! - [`persistence`]: the append-store contract used for restart recovery.
//! - [`node`]: the `ValidatorNode` facade wiring the above together.
//! - [`tracing_util`]: structured trace events fanned out to `tracing`.

pub mod closer;
pub mod config;
pub mod consensus;
pub mod crypto;
pub mod error;
pub mod ledger;
pub mod merkle;
pub mod model;
pub mod node;
pub mod persistence;
pub mod state_machine;
pub mod subsystems;
pub mod tracing_util;
