//! Typed error surface for boundary failures.
//!
//! These are *not* used for deterministic transaction validation failures or
//! protocol-level consensus faults — those are [`crate::model::ResultCode`]
//! values and Byzantine-set membership respectively, per the propagation
//! policy in spec.md §7. `CoreError` exists for the failures that happen
//! before a transaction or proposal ever reaches the deterministic core:
//! decode failures, config problems, and persistence I/O.

use thiserror::Error;

/// Errors surfaced at the boundary of the core, never by `apply()` itself.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to load configuration file: {0}")]
    ConfigLoad(String),

    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),

    #[error("malformed proposal: {0}")]
    MalformedProposal(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("invariant checker failed to run: {0}")]
    InvariantCheckerFault(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
