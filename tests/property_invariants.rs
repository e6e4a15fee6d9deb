//! Property-based coverage of the invariants `apply()` is required to hold
//! across arbitrary sequences of native payments: total supply never
//! drifts from fee burn, no account goes negative, and duplicate tx_ids
//! never apply twice.

use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use valnode_core::config::ReserveConfig;
use valnode_core::crypto::ReferenceCrypto;
use valnode_core::ledger::Ledger;
use valnode_core::model::amount::Amount;
use valnode_core::model::result_code::ResultCode;
use valnode_core::model::transaction::{tx_type, PaymentBody, Transaction, TransactionBody, TxHeader};
use valnode_core::state_machine::apply;
use valnode_core::tracing_util::Tracer;

const GENESIS_SUPPLY: i128 = 1_000_000_000_000;
const FEE: i128 = 10;

#[derive(Debug, Clone)]
struct Step {
    destination_index: u8,
    value: i128,
}

fn step_strategy() -> impl Strategy<Value = Step> {
    (0u8..4, 0i128..2_000_000).prop_map(|(destination_index, value)| Step { destination_index, value })
}

fn fresh_ledger() -> Ledger {
    Ledger::new(
        "rGenesis",
        GENESIS_SUPPLY,
        ReserveConfig::default(),
        Arc::new(ReferenceCrypto::new()),
        Tracer::default(),
    )
}

fn payment(sequence: i64, destination: &str, value: i128, tx_id: &str) -> Transaction {
    let header = TxHeader {
        tx_type: tx_type::PAYMENT,
        account: "rGenesis".to_string(),
        destination: destination.to_string(),
        amount: Amount::native(value),
        fee: Amount::native(FEE),
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

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // Every payment that succeeds burns exactly its fee from total supply;
    // every payment that fails (e.g. insufficient reserve/balance) leaves
    // supply and the genesis sequence number untouched.
    #[test]
    fn sequential_genesis_payments_never_break_supply_accounting(steps in proptest::collection::vec(step_strategy(), 0..30)) {
        let mut ledger = fresh_ledger();
        let mut sequence = 1i64;
        let mut expected_supply = GENESIS_SUPPLY;

        for (i, step) in steps.iter().enumerate() {
            let destination = format!("rDest{}", step.destination_index);
            let tx_id = format!("tx-{i}");
            let supply_before = ledger.total_supply;
            let genesis_seq_before = ledger.get_account("rGenesis").unwrap().sequence;

            let result = apply(&mut ledger, payment(sequence, &destination, step.value, &tx_id));

            match result {
                ResultCode::Success => {
                    expected_supply -= FEE;
                    sequence += 1;
                    prop_assert_eq!(ledger.get_account("rGenesis").unwrap().sequence, genesis_seq_before + 1);
                }
                _ => {
                    prop_assert_eq!(ledger.total_supply, supply_before);
                    prop_assert_eq!(ledger.get_account("rGenesis").unwrap().sequence, genesis_seq_before);
                }
            }
            prop_assert_eq!(ledger.total_supply, expected_supply);
            prop_assert!(ledger.get_balance("rGenesis").unwrap() >= 0);
        }
    }

    // Resubmitting an already-applied tx_id is always rejected and never
    // mutates state a second time, regardless of which transaction it was.
    #[test]
    fn resubmitting_any_applied_tx_id_is_always_a_no_op(value in 0i128..2_000_000) {
        let mut ledger = fresh_ledger();
        let original = payment(1, "rDest", value, "replay-me");
        let first = apply(&mut ledger, original.clone());
        prop_assume!(first == ResultCode::Success);

        let supply_after_first = ledger.total_supply;
        let balance_after_first = ledger.get_balance("rDest");

        let replay_result = apply(&mut ledger, original);
        prop_assert_eq!(replay_result, ResultCode::Duplicate);
        prop_assert_eq!(ledger.total_supply, supply_after_first);
        prop_assert_eq!(ledger.get_balance("rDest"), balance_after_first);
    }
}
