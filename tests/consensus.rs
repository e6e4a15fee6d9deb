//! Black-box coverage of `ConsensusEngine` through its public surface only:
//! construct engines with real keypairs, exchange signed proposals, and
//! check round outcomes the way a second validator process would.

use std::sync::Arc;
use valnode_core::config::ConsensusConfig;
use valnode_core::consensus::{ConsensusEngine, Proposal};
use valnode_core::crypto::{CryptoProvider, ReferenceCrypto};
use valnode_core::tracing_util::Tracer;

fn config(my_id: &str, unl: &[&str], unl_pubkeys_hex: Vec<(String, String)>) -> ConsensusConfig {
    ConsensusConfig {
        my_id: my_id.to_string(),
        my_privkey_hex: None,
        unl: unl.iter().map(|s| s.to_string()).collect(),
        unl_pubkeys_hex,
        initial_threshold: 0.50,
        final_threshold: 0.80,
        max_rounds: 5,
        round_timeout_ms: 0,
    }
}

#[tokio::test]
async fn two_validators_with_genuine_signatures_reach_agreement() {
    let crypto_impl = ReferenceCrypto::new();
    let (v2_sk, v2_pk) = crypto_impl.keypair();
    let crypto: Arc<dyn CryptoProvider> = Arc::new(crypto_impl);

    let mut cfg = config("v1", &["v2"], vec![("v2".to_string(), hex::encode(v2_pk.0))]);
    // Pin both thresholds at zero so a single round of unanimous proposals
    // settles immediately, the same trick the engine's own unit tests use
    // to keep a reached-agreement test independent of round escalation.
    cfg.initial_threshold = 0.0;
    cfg.final_threshold = 0.0;
    let mut engine = ConsensusEngine::new(&cfg, crypto.clone(), Tracer::default()).unwrap();
    engine.reset_for_sequence(1);
    engine.submit_transactions(vec!["tx1".to_string(), "tx2".to_string()]);

    // v2 signs its own proposal over the same candidate set, the way a
    // peer validator process would before broadcasting it.
    let mut v2_proposal = Proposal {
        validator_id: "v2".to_string(),
        ledger_seq: 1,
        round_number: 0,
        tx_ids: vec!["tx1".to_string(), "tx2".to_string()],
        signature: None,
    };
    let digest = v2_proposal.digest(crypto.as_ref());
    v2_proposal.signature = Some(crypto.sign(&v2_sk, &digest).0);

    assert!(engine.add_proposal(v2_proposal));
    assert!(engine.byzantine_validators().is_empty());

    let result = engine.run_rounds().await.unwrap();
    assert_eq!(result.round, 0);
    assert!(result.agreed.contains("tx1"));
    assert!(result.agreed.contains("tx2"));
    assert_eq!(result.byzantine_count, 0);
}

#[tokio::test]
async fn forged_signature_from_a_registered_validator_is_quarantined() {
    let crypto_impl = ReferenceCrypto::new();
    let (_v2_sk, v2_pk) = crypto_impl.keypair();
    let (forger_sk, _forger_pk) = crypto_impl.keypair();
    let crypto: Arc<dyn CryptoProvider> = Arc::new(crypto_impl);

    let cfg = config("v1", &["v2"], vec![("v2".to_string(), hex::encode(v2_pk.0))]);
    let mut engine = ConsensusEngine::new(&cfg, crypto.clone(), Tracer::default()).unwrap();
    engine.reset_for_sequence(1);
    engine.submit_transactions(vec!["tx1".to_string()]);

    // Someone without v2's private key signs a proposal claiming to be v2.
    let mut forged = Proposal {
        validator_id: "v2".to_string(),
        ledger_seq: 1,
        round_number: 0,
        tx_ids: vec!["tx1".to_string()],
        signature: None,
    };
    let digest = forged.digest(crypto.as_ref());
    forged.signature = Some(crypto.sign(&forger_sk, &digest).0);

    assert!(!engine.add_proposal(forged));
    assert!(engine.byzantine_validators().contains("v2"));

    // v2 is excluded from the quorum floor once quarantined, so v1's own
    // proposal alone clears every round's threshold.
    let result = engine.run_rounds().await.unwrap();
    assert!(result.agreed.contains("tx1"));
    assert_eq!(result.byzantine_count, 1);
}
