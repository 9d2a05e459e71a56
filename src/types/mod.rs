//! Shared Types Module
//!
//! Data types shared across the bridge flows.

pub mod chain;
pub mod transaction;
pub mod units;

// Re-exports for convenience
pub use chain::{Chain, GameRef, GameStatus, Log, ProvenWithdrawal, Receipt, ReceiptStatus};
pub use transaction::{
    BridgeOutcome, BridgeTransaction, DepositPhase, Direction, ErrorRecord, Phase,
    WithdrawalPhase, WithdrawalTransaction,
};
pub use units::{format_ether, parse_ether, wei_to_display, ETHER_DECIMALS, WEI_PER_ETHER};
