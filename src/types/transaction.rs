//! Bridge Transaction Types
//!
//! Phase enums and the record that follows one deposit or withdrawal:
//!
//! ```text
//! deposit:    created → submitted_l1 → confirmed_l1 → derived_l2_hash → confirmed_l2
//! withdrawal: created → initiated_l2 → confirmed_l2 → provable → proven_l1 → finalizable → finalized_l1
//! ```
//!
//! Phases only move forward along their sequence or into the failure phase
//! owned by the current step. The one way back is `reset_for_retry` after a
//! first submission was refused.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

use super::chain::GameRef;
use crate::error::{BridgeError, ErrorKind, Result};

/// Direction of value transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    DepositL1ToL2,
    WithdrawalL2ToL1,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DepositL1ToL2 => write!(f, "deposit"),
            Self::WithdrawalL2ToL1 => write!(f, "withdrawal"),
        }
    }
}

/// Deposit phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositPhase {
    Created,
    SubmittedL1,
    ConfirmedL1,
    DerivedL2Hash,
    ConfirmedL2,
    FailedL1,
    FailedL2,
}

impl DepositPhase {
    /// Next phase on the success path
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Created => Some(Self::SubmittedL1),
            Self::SubmittedL1 => Some(Self::ConfirmedL1),
            Self::ConfirmedL1 => Some(Self::DerivedL2Hash),
            Self::DerivedL2Hash => Some(Self::ConfirmedL2),
            Self::ConfirmedL2 | Self::FailedL1 | Self::FailedL2 => None,
        }
    }

    /// Failure phase reachable from this phase
    pub fn failure(self) -> Option<Self> {
        match self {
            Self::Created | Self::SubmittedL1 | Self::ConfirmedL1 => Some(Self::FailedL1),
            Self::DerivedL2Hash => Some(Self::FailedL2),
            Self::ConfirmedL2 | Self::FailedL1 | Self::FailedL2 => None,
        }
    }

    pub fn is_failed(self) -> bool {
        matches!(self, Self::FailedL1 | Self::FailedL2)
    }
}

impl std::fmt::Display for DepositPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::SubmittedL1 => write!(f, "submitted_l1"),
            Self::ConfirmedL1 => write!(f, "confirmed_l1"),
            Self::DerivedL2Hash => write!(f, "derived_l2_hash"),
            Self::ConfirmedL2 => write!(f, "confirmed_l2"),
            Self::FailedL1 => write!(f, "failed_l1"),
            Self::FailedL2 => write!(f, "failed_l2"),
        }
    }
}

/// Withdrawal phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalPhase {
    Created,
    InitiatedL2,
    ConfirmedL2,
    Provable,
    ProvenL1,
    Finalizable,
    FinalizedL1,
    FailedL2,
    FailedProve,
    FailedFinalize,
}

impl WithdrawalPhase {
    /// Next phase on the success path
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Created => Some(Self::InitiatedL2),
            Self::InitiatedL2 => Some(Self::ConfirmedL2),
            Self::ConfirmedL2 => Some(Self::Provable),
            Self::Provable => Some(Self::ProvenL1),
            Self::ProvenL1 => Some(Self::Finalizable),
            Self::Finalizable => Some(Self::FinalizedL1),
            _ => None,
        }
    }

    /// Failure phase reachable from this phase
    pub fn failure(self) -> Option<Self> {
        match self {
            Self::Created | Self::InitiatedL2 => Some(Self::FailedL2),
            Self::ConfirmedL2 | Self::Provable => Some(Self::FailedProve),
            Self::ProvenL1 | Self::Finalizable => Some(Self::FailedFinalize),
            _ => None,
        }
    }

    pub fn is_failed(self) -> bool {
        matches!(
            self,
            Self::FailedL2 | Self::FailedProve | Self::FailedFinalize
        )
    }
}

impl std::fmt::Display for WithdrawalPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::InitiatedL2 => write!(f, "initiated_l2"),
            Self::ConfirmedL2 => write!(f, "confirmed_l2"),
            Self::Provable => write!(f, "provable"),
            Self::ProvenL1 => write!(f, "proven_l1"),
            Self::Finalizable => write!(f, "finalizable"),
            Self::FinalizedL1 => write!(f, "finalized_l1"),
            Self::FailedL2 => write!(f, "failed_l2"),
            Self::FailedProve => write!(f, "failed_prove"),
            Self::FailedFinalize => write!(f, "failed_finalize"),
        }
    }
}

/// Current phase of a bridge transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "direction", content = "phase", rename_all = "snake_case")]
pub enum Phase {
    Deposit(DepositPhase),
    Withdrawal(WithdrawalPhase),
}

impl Phase {
    fn next(self) -> Option<Phase> {
        match self {
            Self::Deposit(p) => p.next().map(Self::Deposit),
            Self::Withdrawal(p) => p.next().map(Self::Withdrawal),
        }
    }

    fn failure(self) -> Option<Phase> {
        match self {
            Self::Deposit(p) => p.failure().map(Self::Deposit),
            Self::Withdrawal(p) => p.failure().map(Self::Withdrawal),
        }
    }

    /// Check if the phase is a failure phase
    pub fn is_failed(self) -> bool {
        match self {
            Self::Deposit(p) => p.is_failed(),
            Self::Withdrawal(p) => p.is_failed(),
        }
    }

    /// Check if the phase is the success terminal
    pub fn is_complete(self) -> bool {
        matches!(
            self,
            Self::Deposit(DepositPhase::ConfirmedL2)
                | Self::Withdrawal(WithdrawalPhase::FinalizedL1)
        )
    }

    /// Terminal phases never move again
    pub fn is_terminal(self) -> bool {
        self.is_failed() || self.is_complete()
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deposit(p) => write!(f, "{}", p),
            Self::Withdrawal(p) => write!(f, "{}", p),
        }
    }
}

/// Withdrawal message as recorded by the L2 message passer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalTransaction {
    pub nonce: U256,
    pub sender: Address,
    pub target: Address,
    pub value: U256,
    pub gas_limit: U256,
    pub data: Bytes,
}

/// Last fatal error recorded on a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
    /// Phase the transaction was in when the error happened
    pub phase: Phase,
}

/// One deposit or withdrawal attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeTransaction {
    /// Local id, used as correlation id in logs and events
    pub id: String,
    pub direction: Direction,
    /// Originating transaction (L1 deposit or L2 initiation)
    pub source_hash: Option<B256>,
    /// Derived L2 hash (deposits) or withdrawal hash (withdrawals)
    pub derived_hash: Option<B256>,
    /// Amount in wei
    pub amount: U256,
    /// Address credited on the destination chain
    pub recipient: Address,
    pub phase: Phase,

    // Withdrawal-only data
    /// Decoded message-passer withdrawal
    pub withdrawal: Option<WithdrawalTransaction>,
    /// L2 block that included the initiation
    pub l2_block_number: Option<u64>,
    /// Dispute game used for the proof
    pub output_ref: Option<GameRef>,
    /// L1 prove transaction
    pub prove_hash: Option<B256>,
    /// L1 finalize transaction
    pub finalize_hash: Option<B256>,

    /// Set when the last wait was cancelled; the phase is untouched
    pub cancelled: bool,
    pub error: Option<ErrorRecord>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl BridgeTransaction {
    /// Create a new deposit record
    pub fn new_deposit(amount: U256, recipient: Address) -> Self {
        Self::new(
            format!("dep_{}", uuid::Uuid::new_v4().simple()),
            Direction::DepositL1ToL2,
            Phase::Deposit(DepositPhase::Created),
            amount,
            recipient,
        )
    }

    /// Create a new withdrawal record
    pub fn new_withdrawal(amount: U256, recipient: Address) -> Self {
        Self::new(
            format!("wd_{}", uuid::Uuid::new_v4().simple()),
            Direction::WithdrawalL2ToL1,
            Phase::Withdrawal(WithdrawalPhase::Created),
            amount,
            recipient,
        )
    }

    fn new(
        id: String,
        direction: Direction,
        phase: Phase,
        amount: U256,
        recipient: Address,
    ) -> Self {
        let now = now_secs();
        Self {
            id,
            direction,
            source_hash: None,
            derived_hash: None,
            amount,
            recipient,
            phase,
            withdrawal: None,
            l2_block_number: None,
            output_ref: None,
            prove_hash: None,
            finalize_hash: None,
            cancelled: false,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Deposit phase, if this is a deposit
    pub fn deposit_phase(&self) -> Option<DepositPhase> {
        match self.phase {
            Phase::Deposit(p) => Some(p),
            Phase::Withdrawal(_) => None,
        }
    }

    /// Withdrawal phase, if this is a withdrawal
    pub fn withdrawal_phase(&self) -> Option<WithdrawalPhase> {
        match self.phase {
            Phase::Withdrawal(p) => Some(p),
            Phase::Deposit(_) => None,
        }
    }

    /// Move to the next phase of the sequence, returning the previous phase
    pub fn advance(&mut self, to: Phase) -> Result<Phase> {
        if self.phase.next() != Some(to) {
            return Err(self.invalid(to));
        }
        let from = self.phase;
        self.phase = to;
        self.cancelled = false;
        self.touch();
        Ok(from)
    }

    /// Move to the failure phase of the current step, returning the previous phase
    pub fn fail(&mut self, error: &BridgeError) -> Result<Phase> {
        let to = self.phase.failure().ok_or_else(|| self.invalid_failure())?;
        let from = self.phase;
        self.error = Some(ErrorRecord {
            kind: error.kind(),
            message: error.to_string(),
            phase: from,
        });
        self.phase = to;
        self.cancelled = false;
        self.touch();
        Ok(from)
    }

    /// Record that the current wait was cancelled
    pub fn mark_cancelled(&mut self) {
        self.cancelled = true;
        self.touch();
    }

    /// Record the originating transaction hash (set once)
    pub fn set_source_hash(&mut self, hash: B256) -> Result<()> {
        set_once(&mut self.source_hash, hash, "source_hash")?;
        self.touch();
        Ok(())
    }

    /// Record the derived hash (set once)
    pub fn set_derived_hash(&mut self, hash: B256) -> Result<()> {
        set_once(&mut self.derived_hash, hash, "derived_hash")?;
        self.touch();
        Ok(())
    }

    /// Withdrawal hash used by the portal
    pub fn withdrawal_id(&self) -> Option<B256> {
        match self.direction {
            Direction::WithdrawalL2ToL1 => self.derived_hash,
            Direction::DepositL1ToL2 => None,
        }
    }

    /// Go back to `Created` after the very first submission was refused.
    ///
    /// Only allowed from a failure phase when nothing reached a chain yet.
    pub fn reset_for_retry(&mut self) -> Result<()> {
        if !self.phase.is_failed() || self.source_hash.is_some() {
            let created = match self.direction {
                Direction::DepositL1ToL2 => Phase::Deposit(DepositPhase::Created),
                Direction::WithdrawalL2ToL1 => Phase::Withdrawal(WithdrawalPhase::Created),
            };
            return Err(self.invalid(created));
        }
        self.phase = match self.direction {
            Direction::DepositL1ToL2 => Phase::Deposit(DepositPhase::Created),
            Direction::WithdrawalL2ToL1 => Phase::Withdrawal(WithdrawalPhase::Created),
        };
        self.error = None;
        self.cancelled = false;
        self.touch();
        Ok(())
    }

    /// Hash that identifies the final on-chain effect
    pub fn final_hash(&self) -> Option<B256> {
        match self.direction {
            Direction::DepositL1ToL2 => self.derived_hash,
            Direction::WithdrawalL2ToL1 => self.finalize_hash,
        }
    }

    /// Terminal result for outward reporting
    pub fn outcome(&self) -> BridgeOutcome {
        BridgeOutcome {
            transaction_id: self.id.clone(),
            success: self.phase.is_complete(),
            final_hash: self.final_hash(),
            error_kind: self.error.as_ref().map(|e| e.kind),
        }
    }

    fn invalid(&self, to: Phase) -> BridgeError {
        BridgeError::InvalidTransition {
            from: self.phase.to_string(),
            to: to.to_string(),
        }
    }

    fn invalid_failure(&self) -> BridgeError {
        BridgeError::InvalidTransition {
            from: self.phase.to_string(),
            to: "failed".to_string(),
        }
    }

    /// Update timestamp
    fn touch(&mut self) {
        self.updated_at = now_secs();
    }
}

/// Terminal result of a flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeOutcome {
    pub transaction_id: String,
    pub success: bool,
    pub final_hash: Option<B256>,
    pub error_kind: Option<ErrorKind>,
}

fn set_once(slot: &mut Option<B256>, value: B256, field: &str) -> Result<()> {
    match slot {
        Some(existing) if *existing != value => Err(BridgeError::InvalidTransition {
            from: format!("{field}={existing}"),
            to: format!("{field}={value}"),
        }),
        _ => {
            *slot = Some(value);
            Ok(())
        }
    }
}

fn now_secs() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}
