//! Error Types for the Bridge Core
//!
//! One root error covers every failure a deposit or withdrawal can hit.
//! Polling absorbs `Transient` and `NotYetAvailable`; `Timeout` and
//! `Cancelled` leave the transaction phase untouched; everything else moves
//! the flow into its failure phase.

use std::time::Duration;

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Chain;

/// Root error type for bridge operations
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Pre-broadcast validation failure (signer, node or mempool refused it)
    #[error("submission rejected on {chain}: {reason}")]
    SubmissionRejected { chain: Chain, reason: String },

    /// On-chain execution failure
    #[error("transaction reverted on {chain}: {reason}")]
    Reverted {
        chain: Chain,
        hash: Option<B256>,
        reason: String,
    },

    /// Receipt does not carry the bridge event we expect
    #[error("malformed receipt {hash}: {reason}")]
    MalformedReceipt { hash: B256, reason: String },

    /// More than one withdrawal in a receipt and the caller asked for strict selection
    #[error("receipt {hash} contains {count} withdrawals, select one by index")]
    MultipleWithdrawals { hash: B256, count: usize },

    /// RPC or network hiccup, retry the same query
    #[error("transient error: {0}")]
    Transient(String),

    /// Expected pending state, ask again later
    #[error("not yet available: {0}")]
    NotYetAvailable(String),

    /// Caller-configured wait budget exhausted
    #[error("timed out after {waited:?} waiting for {what}")]
    Timeout { what: String, waited: Duration },

    /// The dispute game backing the withdrawal resolved against it
    #[error("withdrawal {withdrawal_hash} was challenged successfully (game {game})")]
    ChallengeDetected { withdrawal_hash: B256, game: Address },

    /// Wait interrupted by the caller
    #[error("wait for {0} cancelled")]
    Cancelled(String),

    /// A flow tried to move a transaction off its phase sequence
    #[error("invalid phase transition {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Logging errors
    #[error("logging error: {0}")]
    Logging(#[from] crate::logging::LoggingError),
}

/// Flat error classification reported in outcomes and events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SubmissionRejected,
    Reverted,
    MalformedReceipt,
    MultipleWithdrawals,
    Transient,
    NotYetAvailable,
    Timeout,
    ChallengeDetected,
    Cancelled,
    InvalidTransition,
    Config,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::SubmissionRejected => "submission_rejected",
            Self::Reverted => "reverted",
            Self::MalformedReceipt => "malformed_receipt",
            Self::MultipleWithdrawals => "multiple_withdrawals",
            Self::Transient => "transient",
            Self::NotYetAvailable => "not_yet_available",
            Self::Timeout => "timeout",
            Self::ChallengeDetected => "challenge_detected",
            Self::Cancelled => "cancelled",
            Self::InvalidTransition => "invalid_transition",
            Self::Config => "config",
        };
        f.write_str(s)
    }
}

impl BridgeError {
    /// Create a transient error
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    /// Create a not-yet-available error
    pub fn not_yet_available(msg: impl Into<String>) -> Self {
        Self::NotYetAvailable(msg.into())
    }

    /// Create a malformed receipt error
    pub fn malformed(hash: B256, reason: impl Into<String>) -> Self {
        Self::MalformedReceipt {
            hash,
            reason: reason.into(),
        }
    }

    /// Create a submission rejected error
    pub fn rejected(chain: Chain, reason: impl Into<String>) -> Self {
        Self::SubmissionRejected {
            chain,
            reason: reason.into(),
        }
    }

    /// Create a reverted error for a mined transaction
    pub fn reverted(chain: Chain, hash: B256) -> Self {
        Self::Reverted {
            chain,
            hash: Some(hash),
            reason: format!("receipt status 0 for {hash}"),
        }
    }

    /// Classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SubmissionRejected { .. } => ErrorKind::SubmissionRejected,
            Self::Reverted { .. } => ErrorKind::Reverted,
            Self::MalformedReceipt { .. } => ErrorKind::MalformedReceipt,
            Self::MultipleWithdrawals { .. } => ErrorKind::MultipleWithdrawals,
            Self::Transient(_) => ErrorKind::Transient,
            Self::NotYetAvailable(_) => ErrorKind::NotYetAvailable,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::ChallengeDetected { .. } => ErrorKind::ChallengeDetected,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::Config(_) | Self::Logging(_) => ErrorKind::Config,
        }
    }

    /// Check if the same query may simply be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::NotYetAvailable(_))
    }

    /// Check if the caller can resume the same phase later
    pub fn is_resumable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Cancelled(_))
    }

    /// Check if this error ends the transaction in a failure phase
    pub fn is_fatal(&self) -> bool {
        !self.is_retryable() && !self.is_resumable()
    }

    /// Get error code for outward reporting
    pub fn error_code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::SubmissionRejected => "SUBMISSION_REJECTED",
            ErrorKind::Reverted => "REVERTED",
            ErrorKind::MalformedReceipt => "MALFORMED_RECEIPT",
            ErrorKind::MultipleWithdrawals => "MULTIPLE_WITHDRAWALS",
            ErrorKind::Transient => "TRANSIENT",
            ErrorKind::NotYetAvailable => "NOT_YET_AVAILABLE",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::ChallengeDetected => "CHALLENGE_DETECTED",
            ErrorKind::Cancelled => "CANCELLED",
            ErrorKind::InvalidTransition => "INVALID_TRANSITION",
            ErrorKind::Config => "CONFIG_ERROR",
        }
    }
}

/// Result type alias using BridgeError
pub type Result<T> = std::result::Result<T, BridgeError>;
