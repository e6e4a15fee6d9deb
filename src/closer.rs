//! Ledger close procedure, spec.md §4.4/§6.4.
//!
//! Grounded on the teacher's `BlockHeader`/`select_chain` discipline in
//! `src/ledger.rs`: headers are immutable once produced, and any ordering
//! that feeds into a hash is sorted first rather than left at arrival
//! order. `close_ledger` takes `close_time` as an explicit parameter
//! (DESIGN.md Open Question 1) rather than reading the wall clock, so the
//! function stays pure and reproducible across validators.

use crate::ledger::Ledger;
use crate::merkle::AuthenticatedMap;
use crate::model::LedgerHeader;
use crate::tracing_util::TraceEvent;

/// Closes the current open ledger: matures stakes, canonically orders
/// `pending_txns`, computes `tx_hash`/`state_hash`, builds and appends the
/// new header, and resets the ledger for the next sequence.
///
/// Returns the newly closed header.
pub fn close_ledger(ledger: &mut Ledger, close_time: i64) -> LedgerHeader {
    mature_stakes(ledger, close_time);

    // Canonical ordering, spec.md §4.4 step 4: (tx_type, account, sequence,
    // tx_id). This is what makes `tx_hash` cross-validator identical
    // regardless of submission/arrival order.
    ledger.pending_txns.sort_by(|a, b| {
        (a.header.tx_type, &a.header.account, a.header.sequence, &a.tx_id).cmp(&(
            b.header.tx_type,
            &b.header.account,
            b.header.sequence,
            &b.tx_id,
        ))
    });

    let mut tx_map = AuthenticatedMap::new();
    for tx in &ledger.pending_txns {
        tx_map.insert(tx.tx_id.as_bytes().to_vec(), tx.tx_id.as_bytes().to_vec());
    }
    let tx_hash = hex::encode(tx_map.root_with(ledger.crypto.as_ref()));

    let mut state_map = AuthenticatedMap::new();
    // Accounts in sorted address order (BTreeMap already iterates sorted).
    for (address, account) in &ledger.accounts {
        let mut value = Vec::with_capacity(16 + 8);
        value.extend_from_slice(&account.balance.to_be_bytes());
        value.extend_from_slice(&account.sequence.to_be_bytes());
        state_map.insert(address.as_bytes().to_vec(), value);
    }
    for (stealth_hex, output) in &ledger.confidential_outputs {
        let key = format!("ct:{}", stealth_hex);
        let value = hex::encode(&output.commitment).into_bytes();
        state_map.insert(key.into_bytes(), value);
    }
    let state_hash = hex::encode(state_map.root_with(ledger.crypto.as_ref()));

    let parent_hash = ledger
        .headers
        .last()
        .map(|h| h.hash.clone())
        .unwrap_or_else(LedgerHeader::genesis_parent_hash);

    let mut header = LedgerHeader {
        sequence: ledger.current_sequence,
        parent_hash,
        tx_hash,
        state_hash,
        close_time,
        tx_count: ledger.pending_txns.len() as u64,
        total_native: ledger.total_supply,
        hash: String::new(),
    };
    header.hash = hex::encode(ledger.crypto.hash256(&header.serialize_for_hash()));

    ledger.tracer.trace(TraceEvent::LedgerClosed {
        sequence: header.sequence,
        hash: header.hash.clone(),
    });

    ledger.headers.push(header.clone());
    ledger.pending_txns.clear();
    ledger.current_sequence += 1;
    header
}

/// Matures every stake whose term has completed as of `close_time`,
/// crediting `principal + interest` to the staker and minting the interest
/// into supply, spec.md §4.4 step 3.
fn mature_stakes(ledger: &mut Ledger, close_time: i64) {
    let matured = ledger.subsystems.staking.mature_at(close_time);
    for record in matured {
        let interest = record.full_interest();
        let payout = record.amount + interest;
        if let Some(account) = ledger.accounts.get_mut(&record.address) {
            account.balance += payout;
        }
        ledger.total_supply += interest;
        ledger.total_minted += interest;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReserveConfig;
    use crate::crypto::ReferenceCrypto;
    use crate::model::amount::Amount;
    use crate::model::transaction::{tx_type, PaymentBody, Transaction, TransactionBody, TxHeader};
    use crate::state_machine;
    use crate::tracing_util::Tracer;
    use std::sync::Arc;

    fn fresh_ledger() -> Ledger {
        Ledger::new(
            "rGenesis",
            100_000_000_000_000,
            ReserveConfig::default(),
            Arc::new(ReferenceCrypto::new()),
            Tracer::default(),
        )
    }

    fn native_payment(crypto: &ReferenceCrypto, account: &str, seq: i64, dest: &str, amount: i128) -> Transaction {
        let header = TxHeader {
            tx_type: tx_type::PAYMENT,
            account: account.to_string(),
            destination: dest.to_string(),
            amount: Amount::native(amount),
            fee: Amount::native(10),
            sequence: seq,
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
            flags: Default::default(),
        };
        let tx_id = Transaction::compute_tx_id(crypto, &header);
        Transaction {
            tx_id,
            header,
            body: TransactionBody::Payment(PaymentBody::default()),
            signature: None,
        }
    }

    #[test]
    fn genesis_close_chains_to_zero_parent() {
        let mut ledger = fresh_ledger();
        let header = close_ledger(&mut ledger, 1_000);
        assert_eq!(header.sequence, 1);
        assert_eq!(header.parent_hash, LedgerHeader::genesis_parent_hash());
        assert_eq!(ledger.current_sequence, 2);
        assert!(ledger.pending_txns.is_empty());
    }

    #[test]
    fn second_close_parent_hash_matches_first_hash() {
        let mut ledger = fresh_ledger();
        let h1 = close_ledger(&mut ledger, 1_000);
        let h2 = close_ledger(&mut ledger, 2_000);
        assert_eq!(h2.parent_hash, h1.hash);
        assert_eq!(h2.sequence, h1.sequence + 1);
    }

    #[test]
    fn tx_hash_is_independent_of_submission_order() {
        let crypto = ReferenceCrypto::new();
        let mut ledger_a = fresh_ledger();
        ledger_a.accounts.get_mut("rGenesis").unwrap().sequence = 1;
        let t1 = native_payment(&crypto, "rGenesis", 1, "rBob", 100);
        // second tx from a distinct source so sequencing rules don't matter here
        let mut second_account = crate::model::Account::new("rAlice");
        second_account.balance = 1_000_000;
        ledger_a.accounts.insert("rAlice".to_string(), second_account.clone());
        let t2 = native_payment(&crypto, "rAlice", 1, "rBob", 50);

        state_machine::apply(&mut ledger_a, t1.clone());
        state_machine::apply(&mut ledger_a, t2.clone());
        let header_a = close_ledger(&mut ledger_a, 5_000);

        let mut ledger_b = fresh_ledger();
        ledger_b.accounts.insert("rAlice".to_string(), second_account);
        // submit in the opposite order
        state_machine::apply(&mut ledger_b, t2);
        state_machine::apply(&mut ledger_b, t1);
        let header_b = close_ledger(&mut ledger_b, 5_000);

        assert_eq!(header_a.tx_hash, header_b.tx_hash);
        assert_eq!(header_a.state_hash, header_b.state_hash);
    }

    #[test]
    fn matured_stake_mints_interest_into_balance_and_supply() {
        let mut ledger = fresh_ledger();
        ledger
            .subsystems
            .staking
            .stake(crate::subsystems::staking::StakeRecord {
                tx_id: "stx1".to_string(),
                address: "rGenesis".to_string(),
                amount: 1_000_000,
                tier: 0,
                start_time: 0,
                circulating_supply_at_start: ledger.total_supply,
            })
            .unwrap();
        let balance_before = ledger.get_balance("rGenesis").unwrap();
        let supply_before = ledger.total_supply;

        let maturity = crate::subsystems::staking::TIER_DURATIONS_SECS[0];
        close_ledger(&mut ledger, maturity);

        let balance_after = ledger.get_balance("rGenesis").unwrap();
        assert!(balance_after > balance_before);
        assert!(ledger.total_supply > supply_before);
        assert_eq!(ledger.total_minted, ledger.total_supply - supply_before);
    }
}
