//! Black-box coverage of `apply()` through the public crate surface: no
//! access to ledger internals beyond what `Ledger`'s query methods expose.

use std::collections::BTreeMap;
use std::sync::Arc;
use valnode_core::config::ReserveConfig;
use valnode_core::crypto::{CryptoProvider, ReferenceCrypto};
use valnode_core::ledger::Ledger;
use valnode_core::model::amount::Amount;
use valnode_core::model::result_code::ResultCode;
use valnode_core::model::transaction::{
    tx_type, EscrowCreateBody, EscrowFinishBody, OfferCreateBody, PaymentBody, Transaction, TransactionBody, TrustSetBody, TxHeader,
};
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

fn base_header(tx_type: u32, account: &str, destination: &str, amount: Amount, sequence: i64) -> TxHeader {
    TxHeader {
        tx_type,
        account: account.to_string(),
        destination: destination.to_string(),
        amount,
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
    }
}

fn tx(tx_id: &str, header: TxHeader, body: TransactionBody) -> Transaction {
    Transaction { tx_id: tx_id.to_string(), header, body, signature: None }
}

#[test]
fn native_payment_creates_destination_and_moves_value() {
    let mut ledger = fresh_ledger();
    let header = base_header(tx_type::PAYMENT, "rGenesis", "rAlice", Amount::native(5_000_000), 1);
    let result = apply(&mut ledger, tx("t1", header, TransactionBody::Payment(PaymentBody::default())));
    assert_eq!(result, ResultCode::Success);
    assert_eq!(ledger.get_balance("rAlice"), Some(5_000_000));
    assert!(ledger.get_account("rAlice").is_some());
}

#[test]
fn duplicate_tx_id_is_rejected_on_second_submission() {
    let mut ledger = fresh_ledger();
    let header = base_header(tx_type::PAYMENT, "rGenesis", "rAlice", Amount::native(1_000_000), 1);
    let t = tx("dup-1", header.clone(), TransactionBody::Payment(PaymentBody::default()));
    assert_eq!(apply(&mut ledger, t.clone()), ResultCode::Success);
    // Same tx_id resubmitted (e.g. rebroadcast) must not double-apply.
    let again = tx("dup-1", header, TransactionBody::Payment(PaymentBody::default()));
    assert_eq!(apply(&mut ledger, again), ResultCode::Duplicate);
    assert_eq!(ledger.get_balance("rAlice"), Some(1_000_000));
}

#[test]
fn wrong_sequence_is_rejected_without_mutating_balances() {
    let mut ledger = fresh_ledger();
    let balance_before = ledger.get_balance("rGenesis").unwrap();
    let header = base_header(tx_type::PAYMENT, "rGenesis", "rAlice", Amount::native(1_000_000), 7);
    let result = apply(&mut ledger, tx("badseq", header, TransactionBody::Payment(PaymentBody::default())));
    assert_eq!(result, ResultCode::BadSeq);
    assert_eq!(ledger.get_balance("rGenesis"), Some(balance_before));
    assert!(ledger.get_account("rAlice").is_none());
}

#[test]
fn trust_set_then_issuer_payment_credits_iou_balance() {
    let mut ledger = fresh_ledger();
    // Fund rAlice so she exists and can afford the reserve after TrustSet.
    let fund = base_header(tx_type::PAYMENT, "rGenesis", "rAlice", Amount::native(50_000_000), 1);
    assert_eq!(apply(&mut ledger, tx("fund-alice", fund, TransactionBody::Payment(PaymentBody::default()))), ResultCode::Success);

    // rIssuer must already exist to act as a transaction source.
    ledger.accounts.insert("rIssuer".to_string(), valnode_core::model::Account::new("rIssuer"));
    ledger.accounts.get_mut("rIssuer").unwrap().balance = 1_000_000;

    let trust_header = base_header(tx_type::TRUST_SET, "rAlice", "", Amount::native(0), 1);
    let trust_body = TrustSetBody { currency: "USD".to_string(), issuer: "rIssuer".to_string(), limit: 1_000_000_000, quality_in: None, quality_out: None };
    assert_eq!(apply(&mut ledger, tx("trust-1", trust_header, TransactionBody::TrustSet(trust_body))), ResultCode::Success);
    assert!(ledger.get_trust_line("rAlice", "USD", "rIssuer").is_some());

    let issue_header = base_header(tx_type::PAYMENT, "rIssuer", "rAlice", Amount::iou(400_000_000, "USD", "rIssuer"), 1);
    assert_eq!(apply(&mut ledger, tx("issue-1", issue_header, TransactionBody::Payment(PaymentBody::default()))), ResultCode::Success);
    assert_eq!(ledger.get_trust_line("rAlice", "USD", "rIssuer").unwrap().balance, 400_000_000);
}

#[test]
fn escrow_create_then_finish_releases_funds_to_destination() {
    let mut ledger = fresh_ledger();
    let create_header = base_header(tx_type::ESCROW_CREATE, "rGenesis", "rBob", Amount::native(0), 1);
    let create_body = EscrowCreateBody { escrow_id: 1, destination: "rBob".to_string(), amount: 2_000_000, condition: None, finish_after: None, cancel_after: None };
    assert_eq!(apply(&mut ledger, tx("esc-create", create_header, TransactionBody::EscrowCreate(create_body))), ResultCode::Success);
    assert_eq!(ledger.get_account("rGenesis").unwrap().owner_count, 1);

    let finish_header = base_header(tx_type::ESCROW_FINISH, "rGenesis", "", Amount::native(0), 2);
    let finish_body = EscrowFinishBody { escrow_id: 1, fulfillment: None, now: 0 };
    assert_eq!(apply(&mut ledger, tx("esc-finish", finish_header, TransactionBody::EscrowFinish(finish_body))), ResultCode::Success);
    assert_eq!(ledger.get_balance("rBob"), Some(2_000_000));
    assert_eq!(ledger.get_account("rGenesis").unwrap().owner_count, 0);
}

#[test]
fn reciprocal_offers_fill_through_the_real_offer_create_path() {
    let mut ledger = fresh_ledger();

    let fund_alice = base_header(tx_type::PAYMENT, "rGenesis", "rAlice", Amount::native(1_000_000_000), 1);
    assert_eq!(apply(&mut ledger, tx("fund-alice", fund_alice, TransactionBody::Payment(PaymentBody::default()))), ResultCode::Success);
    let fund_bob = base_header(tx_type::PAYMENT, "rGenesis", "rBob", Amount::native(1_000_000_000), 2);
    assert_eq!(apply(&mut ledger, tx("fund-bob", fund_bob, TransactionBody::Payment(PaymentBody::default()))), ResultCode::Success);

    ledger.accounts.insert("rIssuer".to_string(), valnode_core::model::Account::new("rIssuer"));
    ledger.accounts.get_mut("rIssuer").unwrap().balance = 1_000_000;

    let trust_header = base_header(tx_type::TRUST_SET, "rBob", "", Amount::native(0), 1);
    let trust_body = TrustSetBody { currency: "USD".to_string(), issuer: "rIssuer".to_string(), limit: 1_000_000_000, quality_in: None, quality_out: None };
    assert_eq!(apply(&mut ledger, tx("trust-bob", trust_header, TransactionBody::TrustSet(trust_body))), ResultCode::Success);

    let issue_header = base_header(tx_type::PAYMENT, "rIssuer", "rBob", Amount::iou(300_000_000, "USD", "rIssuer"), 1);
    assert_eq!(apply(&mut ledger, tx("issue-bob", issue_header, TransactionBody::Payment(PaymentBody::default()))), ResultCode::Success);

    let alice_native_before = ledger.get_balance("rAlice").unwrap();
    let bob_native_before = ledger.get_balance("rBob").unwrap();

    // rAlice offers 100 XRP (native) for 200 USD: TakerGets is what she
    // gives away, TakerPays is what she wants back.
    let mut alice_offer_header = base_header(tx_type::OFFER_CREATE, "rAlice", "", Amount::native(0), 1);
    alice_offer_header.taker_gets = Some(Amount::native(100_000_000));
    alice_offer_header.taker_pays = Some(Amount::iou(200_000_000, "USD", "rIssuer"));
    let alice_offer_body = OfferCreateBody { offer_id: 0 };
    assert_eq!(
        apply(&mut ledger, tx("offer-alice", alice_offer_header, TransactionBody::OfferCreate(alice_offer_body))),
        ResultCode::Success
    );
    assert_eq!(ledger.get_account("rAlice").unwrap().owner_count, 1, "unmatched offer should rest and reserve an owner slot");

    // rBob offers 200 USD for 100 XRP: same two assets, opposite legs.
    // Naming taker_gets/taker_pays in the other order must still land this
    // offer in the same book as rAlice's and cross it.
    let mut bob_offer_header = base_header(tx_type::OFFER_CREATE, "rBob", "", Amount::native(0), 2);
    bob_offer_header.taker_gets = Some(Amount::iou(200_000_000, "USD", "rIssuer"));
    bob_offer_header.taker_pays = Some(Amount::native(100_000_000));
    let bob_offer_body = OfferCreateBody { offer_id: 0 };
    assert_eq!(
        apply(&mut ledger, tx("offer-bob", bob_offer_header, TransactionBody::OfferCreate(bob_offer_body))),
        ResultCode::Success
    );

    // The fill moves XRP from rAlice to rBob and USD from rBob to rAlice.
    assert_eq!(ledger.get_balance("rAlice").unwrap(), alice_native_before - 10 - 100_000_000);
    assert_eq!(ledger.get_balance("rBob").unwrap(), bob_native_before - 10 + 100_000_000);
    assert_eq!(ledger.get_trust_line("rAlice", "USD", "rIssuer").unwrap().balance, 200_000_000);
    assert_eq!(ledger.get_trust_line("rBob", "USD", "rIssuer").unwrap().balance, 100_000_000);

    // Both offers fully crossed, so neither account is left holding an
    // open offer or its reserve.
    assert_eq!(ledger.get_account("rAlice").unwrap().owner_count, 0);
    assert!(ledger.get_account("rAlice").unwrap().open_offers.is_empty());
    assert!(ledger.get_account("rBob").unwrap().open_offers.is_empty());
}

#[test]
fn compute_tx_id_is_stable_for_a_given_header() {
    let crypto = ReferenceCrypto::new();
    let header = base_header(tx_type::PAYMENT, "rGenesis", "rAlice", Amount::native(1_000_000), 1);
    let a = Transaction::compute_tx_id(&crypto, &header);
    let b = Transaction::compute_tx_id(&crypto, &header);
    assert_eq!(a, b);
}
