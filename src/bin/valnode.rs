//! Demo validator entrypoint.
//!
//! Grounded on the teacher's `main.rs`: parse `Cli`, load `Config`,
//! construct the node, spawn a graceful-shutdown task, then run the main
//! loop under a Tokio runtime. The P2P networking, REST (axum), and gRPC
//! (tonic) server spawns are dropped (spec.md §1 out-of-scope); what
//! remains is the consensus-round/ledger-close cycle and the shutdown
//! signal handling the teacher also wires up via `Handlers::register_signals`.

use clap::Parser;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use valnode_core::config::{Cli, NodeConfig};
use valnode_core::crypto::{CryptoProvider, ReferenceCrypto};
use valnode_core::node::ValidatorNode;
use valnode_core::tracing_util::Tracer;

fn default_config() -> NodeConfig {
    let toml_text = r#"
[genesis]
genesis_account = "rGenesis"
initial_total_supply = 100_000_000_000_000

[reserve]
base_reserve = 10_000_000
owner_reserve_inc = 2_000_000

[consensus]
my_id = "v1"
unl = ["v2", "v3", "v4"]
unl_pubkeys_hex = []
initial_threshold = 0.50
final_threshold = 0.80
max_rounds = 10
round_timeout_ms = 1000

[persistence]
data_dir = "./data/valnode"
"#;
    toml::from_str(toml_text).expect("built-in default config parses")
}

fn wall_clock_seconds() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if cli.version {
        println!("valnode-core v{}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let tracer = Tracer::default();
    tracer.register_tracing_bridge();
    tracing_subscriber::fmt::init();

    let config = match &cli.config {
        Some(path) => NodeConfig::load_from_file(path).unwrap_or_else(|e| panic!("config error: {e}")),
        None => default_config(),
    };

    let crypto: Arc<dyn CryptoProvider> = Arc::new(ReferenceCrypto::new());
    let node = ValidatorNode::new_recovering(config, crypto, tracer.clone())
        .await
        .unwrap_or_else(|e| panic!("failed to start validator node: {e}"));

    let shutdown_task = {
        let node = node.clone();
        tokio::spawn(async move {
            node.register_signals().await;
        })
    };

    let mut shutdown_rx = node.subscribe_shutdown();
    let mut cycles_run = 0u32;
    loop {
        if cycles_run >= cli.cycles {
            break;
        }
        tokio::select! {
            _ = shutdown_rx.recv() => {
                println!("[valnode] shutdown signal received, stopping cycle loop");
                break;
            }
            outcome = node.run_cycle(wall_clock_seconds()) => {
                cycles_run += 1;
                match outcome.consensus {
                    Some(result) => println!(
                        "[valnode] ledger {} closed, hash={} consensus round={} agreed={} byzantine={}",
                        outcome.header.sequence,
                        outcome.header.hash,
                        result.round,
                        result.agreed.len(),
                        result.byzantine_count,
                    ),
                    None => println!(
                        "[valnode] ledger {} closed, hash={} (no consensus agreement reached)",
                        outcome.header.sequence, outcome.header.hash,
                    ),
                }
            }
        }
    }

    node.initiate_shutdown();
    let _ = shutdown_task.await;
}
