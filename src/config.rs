//! Environment-based Configuration for the Bridge
//!
//! Loaded from a `.env` file (if present) and the process environment.
//! Keys and signing live with the submitter collaborator; this only carries
//! endpoints, contract addresses and wait cadences.
//!
//! # Environment Variables
//!
//! ## Network
//! - `BRIDGE_NETWORK` - "sepolia" or "mainnet" (default: "sepolia")
//! - `BRIDGE_L1_RPC`, `BRIDGE_L2_RPC` - RPC endpoints
//! - `BRIDGE_L1_CHAIN_ID`, `BRIDGE_L2_CHAIN_ID` - chain ids
//!
//! ## L1 Contracts (required on mainnet)
//! - `BRIDGE_PORTAL_ADDRESS` - OptimismPortal proxy
//! - `BRIDGE_DISPUTE_GAME_FACTORY` - DisputeGameFactory proxy
//! - `BRIDGE_L1_STANDARD_BRIDGE` - L1StandardBridge proxy
//!
//! ## Account
//! - `BRIDGE_ACCOUNT` - default recipient and proof submitter
//!
//! ## Waits
//! - `BRIDGE_RECEIPT_POLL_SECS` - receipt poll interval (default: 4)
//! - `BRIDGE_PROVE_POLL_SECS` - dispute game poll interval (default: 60)
//! - `BRIDGE_FINALIZE_POLL_SECS` - challenge window poll interval (default: 300)
//! - `BRIDGE_L2_CONFIRM_TIMEOUT_SECS` - bound on the L2 deposit wait (default: 600, 0 = unbounded)
//! - `BRIDGE_GAME_SEARCH_DEPTH` - newest dispute games inspected (default: 50)
//!
//! ## Optional Settings
//! - `BRIDGE_LOG_LEVEL` - Logging level (debug, info, warn, error)

use std::env;
use std::str::FromStr;
use std::time::Duration;

use alloy_primitives::{address, Address};
use thiserror::Error;
use tracing::info;

use crate::poll::PollConfig;
use crate::state_reader::DEFAULT_GAME_SEARCH_DEPTH;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Network environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    /// Ethereum mainnet as L1
    Mainnet,
    /// Ethereum Sepolia as L1, Giwa Sepolia as L2
    Sepolia,
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" => Ok(Network::Mainnet),
            "sepolia" | "testnet" => Ok(Network::Sepolia),
            _ => Err(ConfigError::InvalidValue(
                "BRIDGE_NETWORK".to_string(),
                format!("unknown network: {}", s),
            )),
        }
    }
}

/// Giwa Sepolia deployment
pub mod giwa_sepolia {
    use super::*;

    pub const L1_CHAIN_ID: u64 = 11_155_111;
    pub const L2_CHAIN_ID: u64 = 91_342;
    pub const L1_RPC: &str = "https://sepolia.drpc.org";
    pub const L2_RPC: &str = "https://sepolia-rpc.giwa.io";
    pub const PORTAL: Address = address!("956962C34687A954e611A83619ABaA37Ce6bC78A");
    pub const DISPUTE_GAME_FACTORY: Address = address!("37347caB2afaa49B776372279143D71ad1f354F6");
    pub const L1_STANDARD_BRIDGE: Address = address!("77b2ffc0F57598cAe1DB76cb398059cF5d10A7E7");
}

impl Network {
    fn default_l1_chain_id(&self) -> Option<u64> {
        match self {
            Network::Mainnet => Some(1),
            Network::Sepolia => Some(giwa_sepolia::L1_CHAIN_ID),
        }
    }

    fn default_l2_chain_id(&self) -> Option<u64> {
        match self {
            Network::Mainnet => None,
            Network::Sepolia => Some(giwa_sepolia::L2_CHAIN_ID),
        }
    }

    fn default_l1_rpc(&self) -> Option<&'static str> {
        match self {
            Network::Mainnet => None,
            Network::Sepolia => Some(giwa_sepolia::L1_RPC),
        }
    }

    fn default_l2_rpc(&self) -> Option<&'static str> {
        match self {
            Network::Mainnet => None,
            Network::Sepolia => Some(giwa_sepolia::L2_RPC),
        }
    }
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub network: Network,

    pub l1_rpc: String,
    pub l2_rpc: String,
    pub l1_chain_id: u64,
    pub l2_chain_id: u64,

    /// OptimismPortal proxy on L1
    pub portal: Address,
    pub dispute_game_factory: Address,
    pub l1_standard_bridge: Address,

    /// Default recipient and proof submitter
    pub account: Option<Address>,

    pub receipt_poll_interval: Duration,
    pub prove_poll_interval: Duration,
    pub finalize_poll_interval: Duration,
    /// `None` waits for the L2 deposit until cancelled
    pub l2_confirm_timeout: Option<Duration>,
    pub game_search_depth: u64,

    pub log_level: String,
}

impl BridgeConfig {
    /// Load configuration from `.env` and environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let network: Network = var("BRIDGE_NETWORK")
            .unwrap_or_else(|| "sepolia".to_string())
            .parse()?;

        let l1_rpc = required_or_default(
            &var,
            "BRIDGE_L1_RPC",
            network.default_l1_rpc().map(str::to_string),
        )?;
        let l2_rpc = required_or_default(
            &var,
            "BRIDGE_L2_RPC",
            network.default_l2_rpc().map(str::to_string),
        )?;
        let l1_chain_id =
            parse_or_default(&var, "BRIDGE_L1_CHAIN_ID", network.default_l1_chain_id())?;
        let l2_chain_id =
            parse_or_default(&var, "BRIDGE_L2_CHAIN_ID", network.default_l2_chain_id())?;

        let sepolia = network == Network::Sepolia;
        let portal = parse_or_default(
            &var,
            "BRIDGE_PORTAL_ADDRESS",
            sepolia.then_some(giwa_sepolia::PORTAL),
        )?;
        let dispute_game_factory = parse_or_default(
            &var,
            "BRIDGE_DISPUTE_GAME_FACTORY",
            sepolia.then_some(giwa_sepolia::DISPUTE_GAME_FACTORY),
        )?;
        let l1_standard_bridge = parse_or_default(
            &var,
            "BRIDGE_L1_STANDARD_BRIDGE",
            sepolia.then_some(giwa_sepolia::L1_STANDARD_BRIDGE),
        )?;

        let account = match var("BRIDGE_ACCOUNT") {
            Some(raw) => Some(parse_value::<Address>("BRIDGE_ACCOUNT", &raw)?),
            None => None,
        };

        let receipt_poll_interval =
            Duration::from_secs(parse_or_default(&var, "BRIDGE_RECEIPT_POLL_SECS", Some(4))?);
        let prove_poll_interval =
            Duration::from_secs(parse_or_default(&var, "BRIDGE_PROVE_POLL_SECS", Some(60))?);
        let finalize_poll_interval =
            Duration::from_secs(parse_or_default(&var, "BRIDGE_FINALIZE_POLL_SECS", Some(300))?);
        let l2_confirm_secs =
            parse_or_default(&var, "BRIDGE_L2_CONFIRM_TIMEOUT_SECS", Some(600u64))?;
        let l2_confirm_timeout = match l2_confirm_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let game_search_depth = parse_or_default(
            &var,
            "BRIDGE_GAME_SEARCH_DEPTH",
            Some(DEFAULT_GAME_SEARCH_DEPTH),
        )?;

        for (name, interval) in [
            ("BRIDGE_RECEIPT_POLL_SECS", receipt_poll_interval),
            ("BRIDGE_PROVE_POLL_SECS", prove_poll_interval),
            ("BRIDGE_FINALIZE_POLL_SECS", finalize_poll_interval),
        ] {
            if interval.is_zero() {
                return Err(ConfigError::InvalidValue(
                    name.to_string(),
                    "interval must be at least 1 second".to_string(),
                ));
            }
        }

        let log_level = var("BRIDGE_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            network,
            l1_rpc,
            l2_rpc,
            l1_chain_id,
            l2_chain_id,
            portal,
            dispute_game_factory,
            l1_standard_bridge,
            account,
            receipt_poll_interval,
            prove_poll_interval,
            finalize_poll_interval,
            l2_confirm_timeout,
            game_search_depth,
            log_level,
        })
    }

    /// Configured account, required by flows that have no explicit one
    pub fn require_account(&self) -> Result<Address, ConfigError> {
        self.account
            .ok_or_else(|| ConfigError::MissingEnvVar("BRIDGE_ACCOUNT".to_string()))
    }

    /// Receipt waits on either chain
    pub fn receipt_poll(&self) -> PollConfig {
        PollConfig::fast(self.receipt_poll_interval)
    }

    /// Wait for the derived L2 deposit, bounded by the confirm timeout
    pub fn l2_confirm_poll(&self) -> PollConfig {
        let config = PollConfig::fast(self.receipt_poll_interval);
        match self.l2_confirm_timeout {
            Some(timeout) => config.with_max_wait(timeout),
            None => config,
        }
    }

    /// Wait for a dispute game covering the withdrawal
    pub fn prove_poll(&self) -> PollConfig {
        PollConfig::slow(self.prove_poll_interval)
    }

    /// Wait for the challenge window
    pub fn finalize_poll(&self) -> PollConfig {
        PollConfig::slow(self.finalize_poll_interval)
    }

    /// Log configuration summary
    pub fn print_summary(&self) {
        info!(target: "opbridge::config", "=== Bridge Configuration ===");
        info!(target: "opbridge::config", "Network: {:?}", self.network);
        info!(target: "opbridge::config", "L1: chain {} via {}", self.l1_chain_id, self.l1_rpc);
        info!(target: "opbridge::config", "L2: chain {} via {}", self.l2_chain_id, self.l2_rpc);
        info!(target: "opbridge::config", "Portal: {}", self.portal);
        info!(target: "opbridge::config", "DisputeGameFactory: {}", self.dispute_game_factory);
        info!(target: "opbridge::config", "L1StandardBridge: {}", self.l1_standard_bridge);
        info!(
            target: "opbridge::config",
            "Account: {}",
            self.account.map(|a| a.to_string()).unwrap_or_else(|| "(unset)".to_string())
        );
        info!(
            target: "opbridge::config",
            "Polling: receipts {:?}, prove {:?}, finalize {:?}",
            self.receipt_poll_interval, self.prove_poll_interval, self.finalize_poll_interval
        );
        info!(target: "opbridge::config", "Log Level: {}", self.log_level);
        info!(target: "opbridge::config", "============================");
    }
}

fn required_or_default<F>(
    var: &F,
    name: &str,
    default: Option<String>,
) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    var(name)
        .or(default)
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn parse_or_default<F, T>(var: &F, name: &str, default: Option<T>) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => parse_value(name, &raw),
        None => default.ok_or_else(|| ConfigError::MissingEnvVar(name.to_string())),
    }
}

fn parse_value<T>(name: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}
