//! Deposit Flow (L1 → L2)
//!
//! ```text
//! created ──submit──▶ submitted_l1 ──receipt──▶ confirmed_l1
//!     ──derive──▶ derived_l2_hash ──L2 receipt──▶ confirmed_l2
//! ```
//!
//! Failures before the derived hash end in `failed_l1`, a reverted L2
//! deposit in `failed_l2`. Waiting for L2 is bounded; a timeout leaves the
//! transaction in `derived_l2_hash` so the caller can resume.

mod flow;

pub use flow::{DepositFlow, DepositParams, DEFAULT_DEPOSIT_GAS_LIMIT};
