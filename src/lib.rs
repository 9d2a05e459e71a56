//! opbridge - ETH Bridge Lifecycle for OP Stack Rollups
//!
//! Moves ETH between an L1 settlement chain and an OP Stack L2 and tracks
//! every transfer through its phases until it lands on the other side.
//!
//! ## Flows
//!
//! 1. **Deposit (L1 → L2)** - submit to the portal, derive the L2 deposit
//!    hash from the L1 receipt, wait for it on L2
//! 2. **Withdrawal (L2 → L1)** - initiate on L2, wait for a dispute game,
//!    prove, wait out the challenge window, finalize
//!
//! ## Collaborators
//!
//! Signing, RPC transport and key management are not part of this crate.
//! They are plugged in through the traits in [`client`].

pub mod client;
pub mod config;
pub mod context;
pub mod contracts;
pub mod deposit;
pub mod derivation;
pub mod error;
pub mod events;
pub mod logging;
pub mod poll;
pub mod state_reader;
pub mod tracker;
pub mod types;
pub mod withdrawal;

// Re-exports: errors
pub use error::{BridgeError, ErrorKind, Result};

// Re-exports: collaborators
pub use client::{
    BlockHeader, ClientError, ContractReader, OutputRootProof, RawGame, ReceiptSource,
    StorageProof, TxRequest, TxSubmitter,
};

// Re-exports: flows
pub use context::{BridgeContext, FlowTiming};
pub use deposit::{DepositFlow, DepositParams};
pub use withdrawal::{WithdrawalFlow, WithdrawalParams};

// Re-exports: building blocks
pub use config::{BridgeConfig, ConfigError, Network};
pub use derivation::{derive_l2_hash, derive_withdrawal_id, WithdrawalSelection};
pub use events::{EventPublisher, PhaseEvent};
pub use poll::{poll, PollConfig};
pub use state_reader::ChainStateReader;
pub use tracker::{BridgeTracker, TrackerError, TrackerStats};

// Re-exports: types
pub use types::{
    format_ether, parse_ether, BridgeOutcome, BridgeTransaction, Chain, DepositPhase, Direction,
    GameRef, GameStatus, Log, Phase, ProvenWithdrawal, Receipt, ReceiptStatus, WithdrawalPhase,
    WithdrawalTransaction,
};
