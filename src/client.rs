//! Chain Collaborator Interfaces
//!
//! The bridge core never talks to a node directly. Signing, broadcasting,
//! receipt lookup and contract reads come in through these traits so that
//! transports, key management and test doubles can be swapped freely.
//!
//! Implementations must be safe for concurrent use: several flows share one
//! instance behind an `Arc`.

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::BridgeError;
use crate::types::{Chain, GameRef, Receipt, WithdrawalTransaction};

/// Collaborator errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// Network or node failure, the same call may succeed later
    #[error("transport error: {0}")]
    Transport(String),

    /// Signer or node refused the transaction before broadcast
    #[error("rejected: {0}")]
    Rejected(String),

    /// Execution reverted (during estimation or simulation)
    #[error("execution reverted: {reason}")]
    Reverted { reason: String },

    /// Queried object does not exist (yet)
    #[error("not found: {0}")]
    NotFound(String),
}

impl ClientError {
    /// Classify into the bridge error taxonomy
    pub fn into_bridge(self, chain: Chain) -> BridgeError {
        match self {
            Self::Transport(msg) => BridgeError::Transient(format!("{chain}: {msg}")),
            Self::Rejected(reason) => BridgeError::SubmissionRejected { chain, reason },
            Self::Reverted { reason } => BridgeError::Reverted {
                chain,
                hash: None,
                reason,
            },
            Self::NotFound(what) => BridgeError::NotYetAvailable(format!("{chain}: {what}")),
        }
    }
}

/// Output root proof fields (`Types.OutputRootProof`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRootProof {
    pub version: B256,
    pub state_root: B256,
    pub message_passer_storage_root: B256,
    pub latest_blockhash: B256,
}

/// Transactions the bridge asks the collaborator to sign and broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxRequest {
    /// `OptimismPortal.depositTransaction` on L1, `mint` is sent as msg.value
    Deposit {
        to: Address,
        mint: U256,
        value: U256,
        gas_limit: u64,
        is_creation: bool,
        data: Bytes,
    },
    /// `L2ToL1MessagePasser.initiateWithdrawal` on L2
    InitiateWithdrawal {
        target: Address,
        value: U256,
        gas_limit: U256,
        data: Bytes,
    },
    /// `OptimismPortal.proveWithdrawalTransaction` on L1
    ProveWithdrawal {
        withdrawal: WithdrawalTransaction,
        game: GameRef,
        output_root_proof: OutputRootProof,
        withdrawal_proof: Vec<Bytes>,
    },
    /// `OptimismPortal.finalizeWithdrawalTransaction` on L1
    FinalizeWithdrawal { withdrawal: WithdrawalTransaction },
}

impl TxRequest {
    /// Chain the request must be sent to
    pub fn chain(&self) -> Chain {
        match self {
            Self::InitiateWithdrawal { .. } => Chain::L2,
            _ => Chain::L1,
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Deposit { .. } => "deposit",
            Self::InitiateWithdrawal { .. } => "initiate_withdrawal",
            Self::ProveWithdrawal { .. } => "prove_withdrawal",
            Self::FinalizeWithdrawal { .. } => "finalize_withdrawal",
        }
    }
}

/// Raw `GameSearchResult` entry returned by `DisputeGameFactory.findLatestGames`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawGame {
    pub index: U256,
    /// Packed `GameId`: type (4 bytes) | timestamp (8 bytes) | proxy (20 bytes)
    pub metadata: B256,
    pub timestamp: U256,
    pub root_claim: B256,
    /// First word is the L2 block number
    pub extra_data: Bytes,
}

/// L2 block fields needed for an output root proof
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub number: u64,
    pub hash: B256,
    pub state_root: B256,
    pub timestamp: u64,
}

/// `eth_getProof` result for a single storage slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageProof {
    /// Storage root of the proven account
    pub storage_hash: B256,
    /// Merkle-Patricia nodes for the slot
    pub proof: Vec<Bytes>,
}

/// Opaque signer and broadcaster
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TxSubmitter: Send + Sync {
    /// Sign and broadcast, returning the transaction hash
    async fn sign_and_send(&self, chain: Chain, request: TxRequest) -> Result<B256, ClientError>;
}

/// Receipt lookup
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReceiptSource: Send + Sync {
    /// `Ok(None)` while the transaction is not mined
    async fn get_receipt(&self, chain: Chain, hash: B256) -> Result<Option<Receipt>, ClientError>;
}

/// Typed contract and node state reads
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContractReader: Send + Sync {
    /// Native balance at the latest block
    async fn balance(&self, chain: Chain, address: Address) -> Result<U256, ClientError>;

    /// Timestamp of the latest block
    async fn latest_timestamp(&self, chain: Chain) -> Result<u64, ClientError>;

    /// Block header by number
    async fn block(&self, chain: Chain, number: u64) -> Result<BlockHeader, ClientError>;

    /// Storage proof for `slot` of `address` at block `number`
    async fn storage_proof(
        &self,
        chain: Chain,
        address: Address,
        slot: B256,
        number: u64,
    ) -> Result<StorageProof, ClientError>;

    /// `OptimismPortal.respectedGameType()`
    async fn respected_game_type(&self) -> Result<u32, ClientError>;

    /// `DisputeGameFactory.gameCount()`
    async fn game_count(&self) -> Result<U256, ClientError>;

    /// `DisputeGameFactory.findLatestGames(type, start, n)`, newest first
    async fn find_latest_games(
        &self,
        game_type: u32,
        start: U256,
        n: U256,
    ) -> Result<Vec<RawGame>, ClientError>;

    /// `FaultDisputeGame.status()`
    async fn game_status(&self, game: Address) -> Result<u8, ClientError>;

    /// `FaultDisputeGame.resolvedAt()`, zero while unresolved
    async fn game_resolved_at(&self, game: Address) -> Result<u64, ClientError>;

    /// `OptimismPortal.proofMaturityDelaySeconds()`
    async fn proof_maturity_delay(&self) -> Result<u64, ClientError>;

    /// `OptimismPortal.disputeGameFinalityDelaySeconds()`
    async fn dispute_game_finality_delay(&self) -> Result<u64, ClientError>;

    /// `OptimismPortal.provenWithdrawals(hash, submitter)` as (game proxy, timestamp);
    /// a zero timestamp means not proven
    async fn proven_withdrawal(
        &self,
        withdrawal_hash: B256,
        submitter: Address,
    ) -> Result<(Address, u64), ClientError>;

    /// `OptimismPortal.finalizedWithdrawals(hash)`
    async fn finalized_withdrawal(&self, withdrawal_hash: B256) -> Result<bool, ClientError>;
}
