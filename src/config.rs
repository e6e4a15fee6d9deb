//! Node configuration and CLI entrypoint.
//!
//! Mirrors the teacher's `configuration.rs`: a `clap`-derived `Cli`, a
//! `serde`-derived `NodeConfig` aggregate loaded from a text file, and a
//! `validate()` pass. Per spec.md §6.5 the text format is TOML.

use crate::error::{CoreError, CoreResult};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Command-line arguments for the validator demo binary.
#[derive(Parser, Debug)]
#[command(name = "valnode")]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Print version and exit.
    #[arg(long)]
    pub version: bool,
    /// Number of consensus+close cycles to run before exiting.
    #[arg(long, default_value_t = 3)]
    pub cycles: u32,
}

/// Genesis parameters: where the initial supply starts out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisConfig {
    pub genesis_account: String,
    pub initial_total_supply: i128,
}

/// Reserve parameters, spec.md §4.3.5.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveConfig {
    pub base_reserve: i128,
    pub owner_reserve_inc: i128,
}

impl Default for ReserveConfig {
    fn default() -> Self {
        // 10.0 / 2.0 native units at 6-decimal micro-unit precision.
        Self {
            base_reserve: 10_000_000,
            owner_reserve_inc: 2_000_000,
        }
    }
}

/// Consensus (BFT-RPCA) parameters, spec.md §4.5/§6.5.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusConfig {
    pub my_id: String,
    pub my_privkey_hex: Option<String>,
    pub unl: Vec<String>,
    pub unl_pubkeys_hex: Vec<(String, String)>,
    #[serde(default = "default_initial_threshold")]
    pub initial_threshold: f64,
    #[serde(default = "default_final_threshold")]
    pub final_threshold: f64,
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
    #[serde(default = "default_round_timeout_ms")]
    pub round_timeout_ms: u64,
}

fn default_initial_threshold() -> f64 {
    0.50
}
fn default_final_threshold() -> f64 {
    0.80
}
fn default_max_rounds() -> u32 {
    10
}
fn default_round_timeout_ms() -> u64 {
    4_000
}

/// Persistence parameters for the append-store contract, spec.md §6.2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    pub data_dir: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data/valnode".to_string(),
        }
    }
}

/// Full node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub genesis: GenesisConfig,
    #[serde(default)]
    pub reserve: ReserveConfig,
    pub consensus: ConsensusConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl NodeConfig {
    /// Loads and validates configuration from a TOML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let text = fs::read_to_string(path.as_ref())
            .map_err(|e| CoreError::ConfigLoad(format!("{}: {}", path.as_ref().display(), e)))?;
        let config: NodeConfig =
            toml::from_str(&text).map_err(|e| CoreError::ConfigLoad(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration, mirroring the teacher's
    /// `configuration::validation::validate`.
    pub fn validate(&self) -> CoreResult<()> {
        if self.genesis.initial_total_supply < 0 {
            return Err(CoreError::InvalidConfig(
                "initial_total_supply must be non-negative".to_string(),
            ));
        }
        if self.reserve.base_reserve < 0 || self.reserve.owner_reserve_inc < 0 {
            return Err(CoreError::InvalidConfig(
                "reserve parameters must be non-negative".to_string(),
            ));
        }
        if self.consensus.unl.is_empty() {
            return Err(CoreError::InvalidConfig(
                "UNL must contain at least one validator".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.consensus.initial_threshold)
            || !(0.0..=1.0).contains(&self.consensus.final_threshold)
        {
            return Err(CoreError::InvalidConfig(
                "consensus thresholds must be within [0, 1]".to_string(),
            ));
        }
        if self.consensus.initial_threshold > self.consensus.final_threshold {
            return Err(CoreError::InvalidConfig(
                "initial_threshold must not exceed final_threshold".to_string(),
            ));
        }
        if self.consensus.max_rounds == 0 {
            return Err(CoreError::InvalidConfig(
                "max_rounds must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NodeConfig {
        NodeConfig {
            genesis: GenesisConfig {
                genesis_account: "genesis".to_string(),
                initial_total_supply: 100_000_000_000_000_000,
            },
            reserve: ReserveConfig::default(),
            consensus: ConsensusConfig {
                my_id: "v1".to_string(),
                my_privkey_hex: None,
                unl: vec!["v2".to_string(), "v3".to_string(), "v4".to_string()],
                unl_pubkeys_hex: vec![],
                initial_threshold: 0.5,
                final_threshold: 0.8,
                max_rounds: 10,
                round_timeout_ms: 4000,
            },
            persistence: PersistenceConfig::default(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn empty_unl_rejected() {
        let mut cfg = sample();
        cfg.consensus.unl.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn inverted_thresholds_rejected() {
        let mut cfg = sample();
        cfg.consensus.initial_threshold = 0.9;
        cfg.consensus.final_threshold = 0.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn round_trips_through_toml() {
        let cfg = sample();
        let text = toml::to_string(&cfg).unwrap();
        let parsed: NodeConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.genesis.genesis_account, cfg.genesis.genesis_account);
    }
}
