//! Hash Derivation
//!
//! Pure functions that turn receipts into the identifiers the next phase
//! waits on. Same receipt in, same hash out: nothing here touches the
//! network or the clock.
//!
//! - `deposit`: L1 `TransactionDeposited` log → L2 deposit transaction hash
//! - `withdrawal`: L2 `MessagePassed` log → withdrawal hash, storage slot and
//!   output root helpers for proving

pub mod deposit;
pub mod withdrawal;

pub use deposit::{
    derive_l2_hash, derive_l2_hashes, deposits_in_receipt, user_deposit_source_hash,
    DepositLogError, DepositedTransaction, DEPOSIT_EVENT_ABI_HASH, DEPOSIT_TX_TYPE,
};
pub use withdrawal::{
    derive_withdrawal_id, hash_withdrawal, output_root, withdrawal_storage_slot,
    withdrawals_in_receipt, DerivedWithdrawal, WithdrawalSelection,
};
