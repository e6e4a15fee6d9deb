//! The `ValidatorNode` facade, spec.md §2/§5.
//!
//! Grounded on the teacher's `AppState` (`src/app_state.rs`): a type-safe
//! container holding `Arc<RwLock<_>>`/`Arc<Mutex<_>>` handles to every
//! subsystem plus a `broadcast::Sender<()>` for coordinated shutdown. Here
//! the subsystems are narrowed to this core's scope — [`crate::ledger::
//! Ledger`], [`crate::consensus::ConsensusEngine`], and a
//! [`crate::persistence::PersistenceStore`] — with the P2P/REST/wallet
//! pieces the teacher wires in left out (spec.md §1 out-of-scope).
//!
//! Signal handling (`register_signals`) is grounded on the teacher's
//! `Handlers::register_signals` (`src/handlers.rs`): a `tokio::select!`
//! over `ctrl_c`/`SIGTERM` that triggers the same shutdown broadcast.

use crate::closer;
use crate::config::NodeConfig;
use crate::consensus::{ConsensusEngine, ConsensusResult};
use crate::crypto::CryptoProvider;
use crate::error::CoreResult;
use crate::ledger::{Ledger, StateSummary};
use crate::model::{LedgerHeader, ResultCode, Transaction};
use crate::persistence::{FileStore, LedgerRecovery, PersistenceStore};
use crate::state_machine;
use crate::tracing_util::{TraceEvent, Tracer};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};

/// The outcome of one consensus-round-then-close cycle, spec.md §2.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub consensus: Option<ConsensusResult>,
    pub header: LedgerHeader,
}

/// Central facade wiring the ledger, consensus engine, and persistence
/// store together behind shared, lockable handles; one per validator
/// process.
#[derive(Clone)]
pub struct ValidatorNode {
    pub ledger: Arc<RwLock<Ledger>>,
    pub consensus: Arc<Mutex<ConsensusEngine>>,
    pub persistence: Arc<dyn PersistenceStore>,
    pub tracer: Tracer,
    shutdown: Arc<broadcast::Sender<()>>,
}

impl ValidatorNode {
    /// Builds a fresh validator node from genesis: no prior chain is
    /// loaded. Use [`Self::new_recovering`] to replay persisted headers on
    /// restart.
    pub async fn new(config: NodeConfig, crypto: Arc<dyn CryptoProvider>, tracer: Tracer) -> CoreResult<Self> {
        let ledger = Ledger::new(
            config.genesis.genesis_account.clone(),
            config.genesis.initial_total_supply,
            config.reserve.clone(),
            crypto.clone(),
            tracer.clone(),
        );
        let consensus = ConsensusEngine::new(&config.consensus, crypto, tracer.clone())?;
        let persistence = FileStore::open(&config.persistence.data_dir).await?;
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            ledger: Arc::new(RwLock::new(ledger)),
            consensus: Arc::new(Mutex::new(consensus)),
            persistence: Arc::new(persistence),
            tracer,
            shutdown: Arc::new(shutdown_tx),
        })
    }

    /// As [`Self::new`], but also replays any headers already persisted
    /// under `config.persistence.data_dir` so `ledger.headers` reflects
    /// the chain tip from before a restart. spec.md §6.2: persistence is
    /// used "only for recovery after restart."
    pub async fn new_recovering(config: NodeConfig, crypto: Arc<dyn CryptoProvider>, tracer: Tracer) -> CoreResult<Self> {
        let node = Self::new(config, crypto, tracer).await?;
        let recovery = LedgerRecovery::new(node.persistence.as_ref());
        let headers = recovery.load_all_headers().await?;
        if !headers.is_empty() {
            let mut ledger = node.ledger.write().await;
            let tip = headers.last().unwrap();
            ledger.current_sequence = tip.sequence + 1;
            ledger.headers = headers;
        }
        Ok(node)
    }

    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }

    pub fn initiate_shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Awaits SIGINT/SIGTERM and triggers [`Self::initiate_shutdown`].
    pub async fn register_signals(&self) {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    self.initiate_shutdown();
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => self.initiate_shutdown(),
                _ = sigterm.recv() => self.initiate_shutdown(),
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            self.initiate_shutdown();
        }
    }

    /// Applies a single validated transaction to the open ledger,
    /// spec.md §6.1 `apply(tx) -> result_code`.
    pub async fn submit_transaction(&self, tx: Transaction) -> ResultCode {
        let mut ledger = self.ledger.write().await;
        state_machine::apply(&mut ledger, tx)
    }

    pub async fn get_state_summary(&self) -> StateSummary {
        self.ledger.read().await.get_state_summary()
    }

    /// Runs one full cycle: submits the currently pending transaction ids
    /// as this validator's consensus candidate, runs the BFT-RPCA rounds
    /// to (possibly) agreement, then closes the ledger regardless of
    /// outcome — closing always canonicalizes whatever is in
    /// `pending_txns`; the consensus result is recorded for diagnostics
    /// and is what a full network deployment would use to reconcile
    /// divergent validators before applying transactions in the first
    /// place (that reconciliation loop lives in the out-of-scope P2P
    /// transport, spec.md §1).
    pub async fn run_cycle(&self, close_time: i64) -> CycleOutcome {
        let (ledger_seq, tx_ids) = {
            let ledger = self.ledger.read().await;
            (ledger.current_sequence, ledger.pending_txns.iter().map(|t| t.tx_id.clone()).collect::<Vec<_>>())
        };

        let consensus_result = {
            let mut consensus = self.consensus.lock().await;
            consensus.reset_for_sequence(ledger_seq);
            consensus.submit_transactions(tx_ids);
            consensus.run_rounds().await
        };

        let header = {
            let mut ledger = self.ledger.write().await;
            closer::close_ledger(&mut ledger, close_time)
        };

        let recovery = LedgerRecovery::new(self.persistence.as_ref());
        if let Err(e) = recovery.save_header(&header).await {
            self.tracer.trace(TraceEvent::Error(format!("failed to persist header {}: {}", header.sequence, e)));
        }

        CycleOutcome { consensus: consensus_result, header }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConsensusConfig, GenesisConfig, NodeConfig, PersistenceConfig, ReserveConfig};
    use crate::crypto::ReferenceCrypto;
    use crate::model::amount::Amount;
    use crate::model::transaction::{tx_type, PaymentBody, TransactionBody, TxHeader};

    fn test_config(data_dir: &str) -> NodeConfig {
        NodeConfig {
            genesis: GenesisConfig {
                genesis_account: "rGenesis".to_string(),
                initial_total_supply: 100_000_000_000_000,
            },
            reserve: ReserveConfig::default(),
            consensus: ConsensusConfig {
                my_id: "v1".to_string(),
                my_privkey_hex: None,
                unl: vec!["v2".to_string(), "v3".to_string()],
                unl_pubkeys_hex: vec![],
                initial_threshold: 0.0,
                final_threshold: 0.0,
                max_rounds: 1,
                round_timeout_ms: 0,
            },
            persistence: PersistenceConfig { data_dir: data_dir.to_string() },
        }
    }

    #[tokio::test]
    async fn submit_then_cycle_closes_a_ledger_with_the_tx_counted() {
        let tmp = std::env::temp_dir().join(format!("valnode-core-node-test-{}", hex::encode(rand::random::<[u8; 8]>())));
        let crypto: Arc<dyn CryptoProvider> = Arc::new(ReferenceCrypto::new());
        let node = ValidatorNode::new(test_config(tmp.to_str().unwrap()), crypto.clone(), Tracer::default())
            .await
            .unwrap();

        let header = TxHeader {
            tx_type: tx_type::PAYMENT,
            account: "rGenesis".to_string(),
            destination: "rBob".to_string(),
            amount: Amount::native(1_000_000),
            fee: Amount::native(10),
            sequence: 1,
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
        let tx_id = Transaction::compute_tx_id(crypto.as_ref(), &header);
        let tx = Transaction { tx_id, header, body: TransactionBody::Payment(PaymentBody::default()), signature: None };

        let result = node.submit_transaction(tx).await;
        assert!(result.is_success());

        let outcome = node.run_cycle(1_000).await;
        assert_eq!(outcome.header.tx_count, 1);
        assert_eq!(outcome.header.sequence, 1);

        let summary = node.get_state_summary().await;
        assert_eq!(summary.last_closed_sequence, Some(1));

        let _ = tokio::fs::remove_dir_all(&tmp).await;
    }

    #[tokio::test]
    async fn recovering_node_reloads_prior_headers() {
        let tmp = std::env::temp_dir().join(format!("valnode-core-node-test-{}", hex::encode(rand::random::<[u8; 8]>())));
        let crypto: Arc<dyn CryptoProvider> = Arc::new(ReferenceCrypto::new());
        let node = ValidatorNode::new(test_config(tmp.to_str().unwrap()), crypto.clone(), Tracer::default())
            .await
            .unwrap();
        node.run_cycle(1_000).await;
        node.run_cycle(2_000).await;

        let recovered = ValidatorNode::new_recovering(test_config(tmp.to_str().unwrap()), crypto, Tracer::default())
            .await
            .unwrap();
        let summary = recovered.get_state_summary().await;
        assert_eq!(summary.last_closed_sequence, Some(2));
        assert_eq!(recovered.ledger.read().await.headers.len(), 2);
        assert_eq!(recovered.ledger.read().await.current_sequence, 3);

        let _ = tokio::fs::remove_dir_all(&tmp).await;
    }
}
