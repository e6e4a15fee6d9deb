//! BFT-RPCA consensus engine, spec.md §4.5.
//!
//! Grounded on the teacher's `Consensus` struct shape (`config`/`tracer`
//! fields, an async round loop built on `tokio::time::sleep`,
//! `src/consensus.rs::run_slot_leadership`) generalized from Ouroboros
//! slot-leadership to RPCA proposal exchange: instead of one leader per
//! slot, every UNL member submits a signed candidate transaction set and
//! the engine escalates the agreement threshold round by round.
//!
//! The round-tally logic ([`ConsensusEngine::tally_round`]) is a plain,
//! synchronous function — it contains every bit of the quorum arithmetic
//! spec.md §4.5 specifies and is unit-tested directly. [`ConsensusEngine::
//! run_rounds`] is the thin async wrapper that sleeps out each round's
//! timeout budget between tallies, matching the teacher's round-loop idiom
//! (spec.md §5: the state machine never suspends, but consensus rounds may
//! await proposal arrival/timeouts).

use crate::config::ConsensusConfig;
use crate::crypto::{CryptoProvider, PrivateKey, PublicKey, Signature};
use crate::error::{CoreError, CoreResult};
use crate::tracing_util::{TraceEvent, Tracer};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::time::Duration;

fn decode_hex32(label: &str, hex_str: &str) -> CoreResult<[u8; 32]> {
    let bytes = hex::decode(hex_str).map_err(|e| CoreError::InvalidConfig(format!("{label}: {e}")))?;
    if bytes.len() != 32 {
        return Err(CoreError::InvalidConfig(format!("{label}: expected 32 bytes, got {}", bytes.len())));
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// A validator's signed candidate transaction set for one `(ledger_seq,
/// round_number)`, spec.md §4.5.
#[derive(Debug, Clone)]
pub struct Proposal {
    pub validator_id: String,
    pub ledger_seq: u64,
    pub round_number: u32,
    pub tx_ids: Vec<String>,
    pub signature: Option<Vec<u8>>,
}

impl Proposal {
    /// `hash256("{vid}:{seq}:{round}:{sorted_comma_joined_tx_ids}")`,
    /// spec.md §4.5. What both the signature and equivocation check are
    /// computed over.
    pub fn digest(&self, crypto: &dyn CryptoProvider) -> [u8; 32] {
        let mut sorted = self.tx_ids.clone();
        sorted.sort();
        let preimage = format!(
            "{}:{}:{}:{}",
            self.validator_id,
            self.ledger_seq,
            self.round_number,
            sorted.join(",")
        );
        crypto.hash256(preimage.as_bytes())
    }
}

/// The outcome of a successful `run_rounds()` call, spec.md §4.5/§6.1.
#[derive(Debug, Clone)]
pub struct ConsensusResult {
    pub agreed: BTreeSet<String>,
    pub round: u32,
    pub threshold: f64,
    pub total: usize,
    pub byzantine_count: usize,
}

/// Per-round bookkeeping recorded for diagnostics, spec.md §4.5 step 3.
#[derive(Debug, Clone)]
pub struct RoundStats {
    pub round: u32,
    pub threshold: f64,
    pub effective_total: usize,
    pub agreed_count: usize,
}

/// The result of tallying one round, before the engine decides whether to
/// stop or escalate.
#[derive(Debug, Clone)]
struct RoundOutcome {
    threshold: f64,
    agreed: BTreeSet<String>,
    effective_total: usize,
}

/// Signed, equivocation-detecting BFT-RPCA engine for one ledger sequence.
/// One `ConsensusEngine` is consumed per ledger close; the caller
/// constructs a fresh one (or calls [`Self::reset_for_sequence`]) for the
/// next sequence.
pub struct ConsensusEngine {
    pub my_id: String,
    my_privkey: Option<PrivateKey>,
    unl: Vec<String>,
    unl_pubkeys: BTreeMap<String, PublicKey>,
    crypto: Arc<dyn CryptoProvider>,
    initial_threshold: f64,
    final_threshold: f64,
    max_rounds: u32,
    round_timeout: Duration,
    tracer: Tracer,

    ledger_seq: u64,
    /// Latest proposal received per validator id (including self).
    proposals: BTreeMap<String, Proposal>,
    byzantine_validators: BTreeSet<String>,
    negative_unl: BTreeSet<String>,
    round_stats: Vec<RoundStats>,
    my_tx_ids: Vec<String>,
}

impl ConsensusEngine {
    pub fn new(config: &ConsensusConfig, crypto: Arc<dyn CryptoProvider>, tracer: Tracer) -> CoreResult<Self> {
        let my_privkey = match &config.my_privkey_hex {
            Some(hex_str) => Some(PrivateKey(decode_hex32("my_privkey_hex", hex_str)?)),
            None => None,
        };
        let mut unl_pubkeys = BTreeMap::new();
        for (vid, hex_str) in &config.unl_pubkeys_hex {
            unl_pubkeys.insert(vid.clone(), PublicKey(decode_hex32(&format!("unl_pubkeys_hex[{vid}]"), hex_str)?));
        }
        Ok(Self {
            my_id: config.my_id.clone(),
            my_privkey,
            unl: config.unl.clone(),
            unl_pubkeys,
            crypto,
            initial_threshold: config.initial_threshold,
            final_threshold: config.final_threshold,
            max_rounds: config.max_rounds,
            round_timeout: Duration::from_millis(config.round_timeout_ms),
            tracer,
            ledger_seq: 0,
            proposals: BTreeMap::new(),
            byzantine_validators: BTreeSet::new(),
            negative_unl: BTreeSet::new(),
            round_stats: Vec::new(),
            my_tx_ids: Vec::new(),
        })
    }

    /// `n = |unl| + 1`, `f = floor((n - 1) / 3)`, spec.md §4.5.
    pub fn max_byzantine_faults(&self) -> usize {
        let n = self.unl.len() + 1;
        (n.saturating_sub(1)) / 3
    }

    pub fn byzantine_validators(&self) -> &BTreeSet<String> {
        &self.byzantine_validators
    }

    pub fn negative_unl(&self) -> &BTreeSet<String> {
        &self.negative_unl
    }

    pub fn round_stats(&self) -> &[RoundStats] {
        &self.round_stats
    }

    /// Discards all per-sequence state (proposals, round stats, candidate
    /// tx set) but keeps the UNL/threshold configuration and the Byzantine/
    /// Negative-UNL sets, which persist across ledger sequences.
    pub fn reset_for_sequence(&mut self, ledger_seq: u64) {
        self.ledger_seq = ledger_seq;
        self.proposals.clear();
        self.round_stats.clear();
        self.my_tx_ids.clear();
    }

    fn sign_proposal(&self, proposal: &mut Proposal) {
        if let Some(priv_key) = &self.my_privkey {
            let digest = proposal.digest(self.crypto.as_ref());
            proposal.signature = Some(self.crypto.sign(priv_key, &digest).0);
        }
    }

    /// Sets this validator's own candidate transaction set and emits a
    /// self-signed round-0 [`Proposal`], spec.md §4.5.
    pub fn submit_transactions(&mut self, tx_ids: Vec<String>) -> Proposal {
        self.my_tx_ids = tx_ids.clone();
        let mut proposal = Proposal {
            validator_id: self.my_id.clone(),
            ledger_seq: self.ledger_seq,
            round_number: 0,
            tx_ids,
            signature: None,
        };
        self.sign_proposal(&mut proposal);
        self.proposals.insert(self.my_id.clone(), proposal.clone());
        proposal
    }

    /// Registers `proposal`, verifying its signature (if the sender is a
    /// registered UNL member) and checking for equivocation against any
    /// prior proposal from the same validator at the same
    /// `(ledger_seq, round_number)`. Returns whether it was accepted.
    pub fn add_proposal(&mut self, proposal: Proposal) -> bool {
        if proposal.validator_id != self.my_id {
            if let Some(pubkey) = self.unl_pubkeys.get(&proposal.validator_id).cloned() {
                let digest = proposal.digest(self.crypto.as_ref());
                let valid = match &proposal.signature {
                    Some(sig) => self.crypto.verify(&pubkey, &digest, &Signature(sig.clone())),
                    None => false,
                };
                if !valid {
                    self.quarantine_byzantine(&proposal.validator_id);
                    return false;
                }
            }
        }

        if let Some(prior) = self.proposals.get(&proposal.validator_id) {
            if prior.ledger_seq == proposal.ledger_seq
                && prior.round_number == proposal.round_number
                && prior.digest(self.crypto.as_ref()) != proposal.digest(self.crypto.as_ref())
            {
                self.quarantine_byzantine(&proposal.validator_id);
                self.proposals.remove(&proposal.validator_id);
                return false;
            }
        }

        self.proposals.insert(proposal.validator_id.clone(), proposal);
        true
    }

    fn quarantine_byzantine(&mut self, validator_id: &str) {
        if self.byzantine_validators.insert(validator_id.to_string()) {
            self.tracer.trace(TraceEvent::ByzantineQuarantine {
                validator_id: validator_id.to_string(),
            });
        }
    }

    fn threshold_for_round(&self, round: u32) -> f64 {
        if self.max_rounds <= 1 {
            return self.final_threshold;
        }
        let step = (self.final_threshold - self.initial_threshold) / ((self.max_rounds - 1) as f64);
        (self.initial_threshold + step * (round as f64)).min(self.final_threshold)
    }

    /// Tallies round `round` against whatever proposals are currently
    /// registered for `(self.ledger_seq, round)`, updating the Negative
    /// UNL and recording stats. Pure with respect to `proposals` —
    /// everything it needs is already in `self`.
    fn tally_round(&mut self, round: u32) -> RoundOutcome {
        let threshold = self.threshold_for_round(round);

        let current_round_proposals: Vec<&Proposal> = self
            .proposals
            .values()
            .filter(|p| {
                p.ledger_seq == self.ledger_seq
                    && p.round_number == round
                    && !self.byzantine_validators.contains(&p.validator_id)
                    && !self.negative_unl.contains(&p.validator_id)
            })
            .collect();

        let observed = current_round_proposals.len();
        // The floor excludes both quarantined Byzantine validators and the
        // current Negative UNL from the expected denominator: a node that
        // has already been ejected from the trusted set should not keep
        // inflating the quorum a diminished honest UNL can never clear.
        let quorum_floor = (self.unl.len() + 1)
            .saturating_sub(self.negative_unl.len())
            .saturating_sub(self.byzantine_validators.len());
        let effective_total = observed.max(quorum_floor);

        let mut vote_counts: BTreeMap<&str, usize> = BTreeMap::new();
        for p in &current_round_proposals {
            for tx_id in &p.tx_ids {
                *vote_counts.entry(tx_id.as_str()).or_insert(0) += 1;
            }
        }
        let needed = (threshold * effective_total as f64).ceil() as usize;
        let agreed: BTreeSet<String> = vote_counts
            .into_iter()
            .filter(|(_, count)| *count >= needed)
            .map(|(tx_id, _)| tx_id.to_string())
            .collect();

        // Negative-UNL maintenance, spec.md §4.5 step 4: UNL members that
        // didn't submit a proposal this round are penalised; those that
        // resumed participation are removed.
        let participated: BTreeSet<&str> = current_round_proposals.iter().map(|p| p.validator_id.as_str()).collect();
        for validator_id in self.unl.clone() {
            if self.byzantine_validators.contains(&validator_id) {
                continue;
            }
            let present = participated.contains(validator_id.as_str());
            if !present && self.negative_unl.insert(validator_id.clone()) {
                self.tracer.trace(TraceEvent::NegativeUnlChanged { validator_id: validator_id.clone(), added: true });
            } else if present && self.negative_unl.remove(&validator_id) {
                self.tracer.trace(TraceEvent::NegativeUnlChanged { validator_id, added: false });
            }
        }

        self.round_stats.push(RoundStats {
            round,
            threshold,
            effective_total,
            agreed_count: agreed.len(),
        });
        self.tracer.trace(TraceEvent::ConsensusRoundResult {
            ledger_seq: self.ledger_seq,
            round,
            agreed_count: agreed.len(),
        });

        RoundOutcome { threshold, agreed, effective_total }
    }

    fn produce_next_proposal(&mut self, next_round: u32) -> Proposal {
        let tx_ids = self.my_tx_ids.clone();
        let mut proposal = Proposal {
            validator_id: self.my_id.clone(),
            ledger_seq: self.ledger_seq,
            round_number: next_round,
            tx_ids,
            signature: None,
        };
        self.sign_proposal(&mut proposal);
        self.proposals.insert(self.my_id.clone(), proposal.clone());
        proposal
    }

    /// Runs up to `max_rounds` tallies, escalating the threshold each
    /// round, sleeping out `round_timeout_ms` between them to let
    /// [`Self::add_proposal`] calls from other tasks land (spec.md §5:
    /// consensus rounds are the only thing in this core allowed to
    /// suspend). Returns the agreed transaction set, or `None` if no round
    /// — including one last check at `final_threshold` — produced a
    /// non-empty agreement.
    pub async fn run_rounds(&mut self) -> Option<ConsensusResult> {
        let mut last_round = 0;
        for round in 0..self.max_rounds {
            self.tracer.trace(TraceEvent::ConsensusRoundStarted { ledger_seq: self.ledger_seq, round });
            if round > 0 {
                tokio::time::sleep(self.round_timeout).await;
            }
            let outcome = self.tally_round(round);
            last_round = round;
            if outcome.threshold >= self.final_threshold && !outcome.agreed.is_empty() {
                return Some(ConsensusResult {
                    agreed: outcome.agreed,
                    round,
                    threshold: outcome.threshold,
                    total: outcome.effective_total,
                    byzantine_count: self.byzantine_validators.len(),
                });
            }
            self.my_tx_ids = outcome.agreed.into_iter().collect();
            if round + 1 < self.max_rounds {
                self.produce_next_proposal(round + 1);
            }
        }

        // Loop exhausted without reaching final_threshold with a non-empty
        // set; try once more pinned at final_threshold over the last
        // round's proposals before declaring no result, spec.md §4.5.
        let saved_threshold = self.final_threshold;
        let outcome = {
            let threshold = saved_threshold;
            let current_round_proposals: Vec<&Proposal> = self
                .proposals
                .values()
                .filter(|p| {
                    p.ledger_seq == self.ledger_seq
                        && p.round_number == last_round
                        && !self.byzantine_validators.contains(&p.validator_id)
                        && !self.negative_unl.contains(&p.validator_id)
                })
                .collect();
            let observed = current_round_proposals.len();
            let quorum_floor = (self.unl.len() + 1)
                .saturating_sub(self.negative_unl.len())
                .saturating_sub(self.byzantine_validators.len());
            let effective_total = observed.max(quorum_floor);
            let mut vote_counts: BTreeMap<&str, usize> = BTreeMap::new();
            for p in &current_round_proposals {
                for tx_id in &p.tx_ids {
                    *vote_counts.entry(tx_id.as_str()).or_insert(0) += 1;
                }
            }
            let needed = (threshold * effective_total as f64).ceil() as usize;
            let agreed: BTreeSet<String> = vote_counts
                .into_iter()
                .filter(|(_, count)| *count >= needed)
                .map(|(tx_id, _)| tx_id.to_string())
                .collect();
            (threshold, agreed, effective_total)
        };

        if !outcome.1.is_empty() {
            Some(ConsensusResult {
                agreed: outcome.1,
                round: last_round,
                threshold: outcome.0,
                total: outcome.2,
                byzantine_count: self.byzantine_validators.len(),
            })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::ReferenceCrypto;

    fn config(my_id: &str, unl: &[&str]) -> ConsensusConfig {
        ConsensusConfig {
            my_id: my_id.to_string(),
            my_privkey_hex: None,
            unl: unl.iter().map(|s| s.to_string()).collect(),
            unl_pubkeys_hex: vec![],
            initial_threshold: 0.50,
            final_threshold: 0.80,
            max_rounds: 10,
            round_timeout_ms: 0,
        }
    }

    #[test]
    fn threshold_step_interpolates_between_bounds() {
        let crypto: Arc<dyn CryptoProvider> = Arc::new(ReferenceCrypto::new());
        let engine = ConsensusEngine::new(&config("v1", &["v2", "v3", "v4"]), crypto, Tracer::default()).unwrap();
        assert_eq!(engine.threshold_for_round(0), 0.50);
        assert!((engine.threshold_for_round(9) - 0.80).abs() < 1e-9);
    }

    #[test]
    fn max_byzantine_faults_matches_formula() {
        let crypto: Arc<dyn CryptoProvider> = Arc::new(ReferenceCrypto::new());
        let engine = ConsensusEngine::new(&config("v1", &["v2", "v3", "v4"]), crypto, Tracer::default()).unwrap();
        // n = 5, f = floor(4/3) = 1
        assert_eq!(engine.max_byzantine_faults(), 1);
    }

    #[tokio::test]
    async fn unanimous_round_zero_reaches_final_threshold_immediately() {
        let crypto: Arc<dyn CryptoProvider> = Arc::new(ReferenceCrypto::new());
        let mut cfg = config("v1", &["v2", "v3", "v4"]);
        cfg.final_threshold = 0.0; // reach agreement trivially with one proposal
        cfg.initial_threshold = 0.0;
        let mut engine = ConsensusEngine::new(&cfg, crypto, Tracer::default()).unwrap();
        engine.reset_for_sequence(1);
        engine.submit_transactions(vec!["tx1".to_string(), "tx2".to_string()]);
        let result = engine.run_rounds().await.unwrap();
        assert_eq!(result.round, 0);
        assert!(result.agreed.contains("tx1"));
    }

    #[test]
    fn equivocating_validator_is_quarantined_and_both_proposals_dropped() {
        let crypto: Arc<dyn CryptoProvider> = Arc::new(ReferenceCrypto::new());
        let mut engine = ConsensusEngine::new(&config("v1", &["v2", "v3", "v4"]), crypto, Tracer::default()).unwrap();
        engine.reset_for_sequence(5);
        let p1 = Proposal {
            validator_id: "v2".to_string(),
            ledger_seq: 5,
            round_number: 0,
            tx_ids: vec!["a".to_string()],
            signature: None,
        };
        let p2 = Proposal {
            validator_id: "v2".to_string(),
            ledger_seq: 5,
            round_number: 0,
            tx_ids: vec!["b".to_string()],
            signature: None,
        };
        assert!(engine.add_proposal(p1));
        assert!(!engine.add_proposal(p2));
        assert!(engine.byzantine_validators().contains("v2"));
        assert!(!engine.proposals.contains_key("v2"));
    }

    #[test]
    fn proposal_from_registered_validator_with_bad_signature_is_quarantined() {
        let crypto_impl = ReferenceCrypto::new();
        let (_sk, pk) = crypto_impl.keypair();
        let crypto: Arc<dyn CryptoProvider> = Arc::new(crypto_impl);
        let mut cfg = config("v1", &["v2"]);
        cfg.unl_pubkeys_hex = vec![("v2".to_string(), hex::encode(pk.0))];
        let mut engine = ConsensusEngine::new(&cfg, crypto, Tracer::default()).unwrap();
        engine.reset_for_sequence(1);
        let bad = Proposal {
            validator_id: "v2".to_string(),
            ledger_seq: 1,
            round_number: 0,
            tx_ids: vec!["a".to_string()],
            signature: None,
        };
        assert!(!engine.add_proposal(bad));
        assert!(engine.byzantine_validators().contains("v2"));
    }

    #[tokio::test]
    async fn four_validators_one_equivocator_reaches_agreement_excluding_it() {
        let crypto: Arc<dyn CryptoProvider> = Arc::new(ReferenceCrypto::new());
        let mut cfg = config("v1", &["v2", "v3", "v4"]);
        cfg.round_timeout_ms = 0;
        let mut engine = ConsensusEngine::new(&cfg, crypto, Tracer::default()).unwrap();
        engine.reset_for_sequence(100);
        engine.submit_transactions(vec!["tx1".to_string(), "tx2".to_string()]);

        // v2 equivocates at round 0.
        engine.add_proposal(Proposal {
            validator_id: "v2".to_string(),
            ledger_seq: 100,
            round_number: 0,
            tx_ids: vec!["tx1".to_string()],
            signature: None,
        });
        engine.add_proposal(Proposal {
            validator_id: "v2".to_string(),
            ledger_seq: 100,
            round_number: 0,
            tx_ids: vec!["tx9".to_string()],
            signature: None,
        });
        assert!(engine.byzantine_validators().contains("v2"));

        // v3, v4 propose the same set as us, every round, until agreement.
        for round in 0..cfg.max_rounds {
            engine.add_proposal(Proposal {
                validator_id: "v3".to_string(),
                ledger_seq: 100,
                round_number: round,
                tx_ids: vec!["tx1".to_string(), "tx2".to_string()],
                signature: None,
            });
            engine.add_proposal(Proposal {
                validator_id: "v4".to_string(),
                ledger_seq: 100,
                round_number: round,
                tx_ids: vec!["tx1".to_string(), "tx2".to_string()],
                signature: None,
            });
            if round + 1 >= cfg.max_rounds {
                break;
            }
        }

        let result = engine.run_rounds().await.unwrap();
        assert_eq!(result.byzantine_count, 1);
        assert!(result.agreed.contains("tx1"));
        assert!(result.agreed.contains("tx2"));
    }
}
