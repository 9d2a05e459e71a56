//! Withdrawal Flow (L2 → L1)
//!
//! ```text
//! created ──initiate──▶ initiated_l2 ──receipt──▶ confirmed_l2
//!     ──game covers block──▶ provable ──prove──▶ proven_l1
//!     ──challenge window──▶ finalizable ──finalize──▶ finalized_l1
//! ```
//!
//! The provable and finalizable waits can last hours to days. They are
//! unbounded by default and end only on success, a fatal chain state or
//! cancellation. Prove and finalize are idempotent against chain state: a
//! proof already on record is not resubmitted and an already finalized
//! withdrawal counts as success.

mod flow;

pub use flow::{WithdrawalFlow, WithdrawalParams, DEFAULT_WITHDRAWAL_GAS_LIMIT};
