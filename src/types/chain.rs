//! Chain-Side Types
//!
//! Receipts and logs as handed to us by the transport collaborator, plus the
//! dispute-game views the withdrawal flow proves against.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// Which side of the bridge a call targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Chain {
    /// Settlement chain
    L1,
    /// Rollup chain
    L2,
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::L1 => write!(f, "L1"),
            Self::L2 => write!(f, "L2"),
        }
    }
}

/// A log entry inside a receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    /// Emitting contract
    pub address: Address,
    /// Indexed topics, topic 0 is the event selector
    pub topics: Vec<B256>,
    /// Non-indexed data
    pub data: Bytes,
    /// Index of the log within its block
    pub log_index: u64,
}

/// A mined transaction receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub transaction_hash: B256,
    pub block_hash: B256,
    pub block_number: u64,
    /// `true` when execution succeeded
    pub status: bool,
    pub logs: Vec<Log>,
}

impl Receipt {
    /// Check if execution reverted
    pub fn reverted(&self) -> bool {
        !self.status
    }
}

/// Result of a receipt lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptStatus {
    Found(Receipt),
    Pending,
}

impl ReceiptStatus {
    pub fn into_receipt(self) -> Option<Receipt> {
        match self {
            Self::Found(receipt) => Some(receipt),
            Self::Pending => None,
        }
    }
}

/// Status of a fault dispute game (`GameStatus` in the dispute contracts)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    InProgress,
    ChallengerWins,
    DefenderWins,
}

impl GameStatus {
    /// Decode the on-chain `uint8`
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::InProgress),
            1 => Some(Self::ChallengerWins),
            2 => Some(Self::DefenderWins),
            _ => None,
        }
    }
}

/// The dispute game a withdrawal is proven against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRef {
    /// Index in the dispute game factory
    pub index: U256,
    /// Game proxy contract
    pub proxy: Address,
    /// L2 block the root claim commits to
    pub l2_block_number: u64,
    /// Output root claimed by the game
    pub root_claim: B256,
    /// Creation timestamp (L1 seconds)
    pub timestamp: u64,
}

/// Proof record kept by the portal for a (withdrawal, submitter) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenWithdrawal {
    pub withdrawal_hash: B256,
    pub submitter: Address,
    pub game_proxy: Address,
    /// L1 timestamp of the proof
    pub timestamp: u64,
}
