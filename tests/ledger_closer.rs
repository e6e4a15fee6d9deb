//! Black-box coverage of the close cycle: submit transactions through the
//! public `apply()` entry point, close, and check the resulting header
//! chain and state summary from outside the crate.

use std::collections::BTreeMap;
use std::sync::Arc;
use valnode_core::closer::close_ledger;
use valnode_core::config::ReserveConfig;
use valnode_core::crypto::ReferenceCrypto;
use valnode_core::ledger::Ledger;
use valnode_core::model::amount::Amount;
use valnode_core::model::result_code::ResultCode;
use valnode_core::model::transaction::{tx_type, PaymentBody, Transaction, TransactionBody, TxHeader};
use valnode_core::model::LedgerHeader;
use valnode_core::state_machine::apply;
use valnode_core::tracing_util::Tracer;

fn fresh_ledger() -> Ledger {
    Ledger::new(
        "rGenesis",
        1_000_000_000_000,
        ReserveConfig::default(),
        Arc::new(ReferenceCrypto::new()),
        Tracer::default(),
    )
}

fn payment(account: &str, destination: &str, value: i128, sequence: i64, tx_id: &str) -> Transaction {
    let header = TxHeader {
        tx_type: tx_type::PAYMENT,
        account: account.to_string(),
        destination: destination.to_string(),
        amount: Amount::native(value),
        fee: Amount::native(10),
        sequence,
        timestamp: 0,
        limit_amount: None,
        taker_pays: None,
        taker_gets: None,
        offer_sequence: 0,
        destination_tag: 0,
        source_tag: 0,
        memo: String::new(),
        commitment: None,
        stealth_address: None,
        range_proof: None,
        key_image: None,
        ring_signature: None,
        ephemeral_pub: None,
        view_tag: None,
        flags: BTreeMap::new(),
    };
    Transaction { tx_id: tx_id.to_string(), header, body: TransactionBody::Payment(PaymentBody::default()), signature: None }
}

#[test]
fn closing_two_sequences_builds_a_hash_chain() {
    let mut ledger = fresh_ledger();
    assert_eq!(apply(&mut ledger, payment("rGenesis", "rAlice", 1_000_000, 1, "p1")), ResultCode::Success);
    let header_one = close_ledger(&mut ledger, 1_000);
    assert_eq!(header_one.sequence, 1);
    assert_eq!(header_one.parent_hash, LedgerHeader::genesis_parent_hash());
    assert_eq!(header_one.tx_count, 1);

    assert_eq!(apply(&mut ledger, payment("rAlice", "rBob", 500_000, 1, "p2")), ResultCode::Success);
    let header_two = close_ledger(&mut ledger, 2_000);
    assert_eq!(header_two.sequence, 2);
    assert_eq!(header_two.parent_hash, header_one.hash);

    let summary = ledger.get_state_summary();
    assert_eq!(summary.last_closed_sequence, Some(2));
    assert_eq!(summary.pending_tx_count, 0);
}

#[test]
fn closing_with_no_pending_transactions_still_advances_the_chain() {
    let mut ledger = fresh_ledger();
    let header = close_ledger(&mut ledger, 500);
    assert_eq!(header.tx_count, 0);
    assert_eq!(ledger.current_sequence, 2);
    // An empty close still yields a well-formed, non-empty hash.
    assert_eq!(header.hash.len(), 64);
}

#[test]
fn rejected_transactions_never_reach_a_closed_ledger() {
    let mut ledger = fresh_ledger();
    // Bad sequence: rejected before ever entering pending_txns.
    assert_eq!(apply(&mut ledger, payment("rGenesis", "rAlice", 1_000_000, 99, "bad")), ResultCode::BadSeq);
    let header = close_ledger(&mut ledger, 1_000);
    assert_eq!(header.tx_count, 0);
}
